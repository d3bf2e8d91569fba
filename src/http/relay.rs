//! `/request`: relay a JSON-described request and return the upstream answer.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt};
use opentelemetry::KeyValue;

use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::http::response::EchoError;
use crate::http::server::AppState;
use crate::relay::RelayRequest;

pub async fn relay(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<Response, EchoError> {
    let instruction: RelayRequest =
        serde_json::from_slice(&body).map_err(|e| EchoError::Body(e.to_string()))?;

    let tracer = state.telemetry.tracing();
    let cx = tracer.start(
        format!("relay {}", instruction.method),
        SpanKind::Client,
        &ctx.trace,
    );
    cx.span().set_attributes([
        KeyValue::new("http.request.method", instruction.method.clone()),
        KeyValue::new("url.full", instruction.url.clone()),
    ]);

    let mut propagation = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(ctx.request_id.as_str()) {
        propagation.insert(X_REQUEST_ID, value);
    }
    tracer.inject(&cx, &mut propagation);

    tracing::debug!(method = %instruction.method, url = %instruction.url, "Relaying request.");
    let result = state.relay.relay(&instruction, propagation).await;

    let span = cx.span();
    match result {
        Ok(upstream) => {
            span.set_attribute(KeyValue::new(
                "http.response.status_code",
                i64::from(upstream.status.as_u16()),
            ));
            span.end();
            Ok((
                upstream.status,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                upstream.body,
            )
                .into_response())
        }
        Err(e) => {
            span.record_error(&e);
            span.set_status(Status::error(e.to_string()));
            span.end();
            Err(e.into())
        }
    }
}
