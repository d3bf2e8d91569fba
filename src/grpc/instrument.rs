//! Per-call instrumentation for the RPC surface.
//!
//! Every call gets a request id (from `x-request-id` metadata or freshly
//! generated), a server span continuing the caller's trace, one
//! "Call completed." log line and one metric observation.

use opentelemetry::trace::{SpanKind, Status as SpanStatus, TraceContextExt};
use opentelemetry::{Context, KeyValue};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::{Code, Response, Status};
use tracing::Instrument;

use crate::grpc::proto::SERVICE_NAME;
use crate::grpc::server::GrpcState;
use crate::grpc::status::code_name;
use crate::http::request::RequestId;
use crate::observability::trace::trace_id;
use crate::observability::RpcObservation;

const REQUEST_ID_KEY: &str = "x-request-id";

/// Per-call values handed to the method implementation.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request_id: RequestId,
    pub trace: Context,
}

/// Run `handler` as RPC `method`, recording the outcome.
pub async fn observe<T, F, Fut>(
    state: &GrpcState,
    method: &'static str,
    metadata: &MetadataMap,
    remote: Option<SocketAddr>,
    handler: F,
) -> Result<Response<T>, Status>
where
    F: FnOnce(CallContext) -> Fut,
    Fut: Future<Output = Result<Response<T>, Status>>,
{
    let started = Instant::now();
    let incoming = metadata.get(REQUEST_ID_KEY).and_then(|value| value.to_str().ok());
    let request_id = state.request_ids.from_incoming(incoming);

    let tracer = state.telemetry.tracing();
    let parent = tracer.extract(&metadata.clone().into_headers());
    let cx = tracer.start(format!("{SERVICE_NAME}/{method}"), SpanKind::Server, &parent);
    cx.span().set_attributes([
        KeyValue::new("rpc.system", "grpc"),
        KeyValue::new("rpc.service", SERVICE_NAME),
        KeyValue::new("rpc.method", method),
        KeyValue::new("http.request_id", request_id.to_string()),
    ]);

    let trace_id = trace_id(&cx);
    let span = tracing::info_span!("call", request_id = %request_id, trace_id = %trace_id);

    let call = CallContext {
        request_id: request_id.clone(),
        trace: cx.clone(),
    };
    let result = handler(call).instrument(span.clone()).await;
    let duration = started.elapsed();

    let code = match &result {
        Ok(_) => Code::Ok,
        Err(status) => status.code(),
    };
    let code_label = code_name(code);

    let otel_span = cx.span();
    otel_span.set_attribute(KeyValue::new("rpc.grpc.status_code", code as i64));
    if let Err(status) = &result {
        otel_span.set_status(SpanStatus::error(status.message().to_string()));
    }
    otel_span.end();

    state.telemetry.metrics().record_rpc(&RpcObservation {
        service: SERVICE_NAME,
        method,
        code: code_label,
        duration,
    });

    let (server_address, server_port) = remote
        .map(|addr| (addr.ip().to_string(), addr.port()))
        .unwrap_or_default();
    let error = result.as_ref().err().map(|status| status.message().to_string());

    let _entered = span.enter();
    tracing::info!(
        rpc_grpc_status_code = code_label,
        rpc_method = method,
        rpc_service = SERVICE_NAME,
        rpc_system = "grpc",
        server_address = %server_address,
        server_port,
        duration_ms = duration.as_secs_f64() * 1000.0,
        error = error.as_deref(),
        "Call completed."
    );

    result.map(|mut response| {
        if let Ok(value) = MetadataValue::try_from(request_id.as_str()) {
            response.metadata_mut().insert(REQUEST_ID_KEY, value);
        }
        response
    })
}
