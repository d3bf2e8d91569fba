//! `echoserver.Echoserver` implementation and its tower service.

use opentelemetry::trace::{SpanKind, TraceContextExt};
use opentelemetry::KeyValue;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::codegen::http::HeaderValue;
use tonic::codegen::{http, Body, BoxFuture, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Request, Response, Status};

use crate::grpc::instrument::observe;
use crate::grpc::proto::{
    EchoRequest, EchoResponse, RequestRequest, RequestResponse, StatusRequest, StatusResponse,
    SERVICE_NAME,
};
use crate::grpc::relay::{invoke, outbound_metadata};
use crate::grpc::server::GrpcState;
use crate::grpc::status::{code_from_name, outcome};
use crate::http::X_REQUEST_ID;

/// Handlers for the three RPCs.
pub struct Echoserver {
    state: GrpcState,
}

impl Echoserver {
    pub fn new(state: GrpcState) -> Self {
        Self { state }
    }

    pub async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoResponse>, Status> {
        let metadata = request.metadata().clone();
        let remote = request.remote_addr();
        let message = request.into_inner().message;

        observe(&self.state, "Echo", &metadata, remote, |call| async move {
            call.trace
                .span()
                .set_attribute(KeyValue::new("message", message.clone()));
            Ok(Response::new(EchoResponse { message }))
        })
        .await
    }

    pub async fn status(
        &self,
        request: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let metadata = request.metadata().clone();
        let remote = request.remote_addr();
        let name = request.into_inner().status;
        let statuses = Arc::clone(&self.state.random_codes);

        observe(&self.state, "Status", &metadata, remote, |call| async move {
            call.trace
                .span()
                .set_attribute(KeyValue::new("status", name.clone()));

            let code = match name.as_str() {
                "" | "random" => statuses.draw(),
                named => code_from_name(named)
                    .ok_or_else(|| Status::internal("Unknown status parameter"))?,
            };
            outcome(code).map(|()| Response::new(StatusResponse {}))
        })
        .await
    }

    pub async fn request(
        &self,
        request: Request<RequestRequest>,
    ) -> Result<Response<RequestResponse>, Status> {
        let metadata = request.metadata().clone();
        let remote = request.remote_addr();
        let relay = request.into_inner();
        let state = &self.state;

        observe(state, "Request", &metadata, remote, |call| async move {
            let tracer = state.telemetry.tracing();
            let cx = tracer.start(format!("relay {}", relay.method), SpanKind::Client, &call.trace);
            cx.span().set_attributes([
                KeyValue::new("rpc.system", "grpc"),
                KeyValue::new("uri", relay.uri.clone()),
                KeyValue::new("method", relay.method.clone()),
            ]);

            let mut propagation = http::HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(call.request_id.as_str()) {
                propagation.insert(X_REQUEST_ID, value);
            }
            tracer.inject(&cx, &mut propagation);

            let result = match outbound_metadata(&relay.headers, propagation) {
                Ok(outbound) => invoke(&state.relay, &relay.uri, &relay.method, &relay.message, outbound).await,
                Err(status) => Err(status),
            };

            let span = cx.span();
            if let Err(status) = &result {
                span.set_status(opentelemetry::trace::Status::error(status.message().to_string()));
            }
            span.end();

            result.map(|message| Response::new(RequestResponse { message }))
        })
        .await
    }
}

/// Tower service routing `echoserver.Echoserver` calls to [`Echoserver`].
#[derive(Clone)]
pub struct EchoserverServer {
    inner: Arc<Echoserver>,
}

impl EchoserverServer {
    pub fn new(inner: Echoserver) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl NamedService for EchoserverServer {
    const NAME: &'static str = SERVICE_NAME;
}

struct EchoSvc(Arc<Echoserver>);

impl UnaryService<EchoRequest> for EchoSvc {
    type Response = EchoResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<EchoRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.echo(request).await })
    }
}

struct StatusSvc(Arc<Echoserver>);

impl UnaryService<StatusRequest> for StatusSvc {
    type Response = StatusResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<StatusRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.status(request).await })
    }
}

struct RequestSvc(Arc<Echoserver>);

impl UnaryService<RequestRequest> for RequestSvc {
    type Response = RequestResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<RequestRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.request(request).await })
    }
}

impl<B> Service<http::Request<B>> for EchoserverServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        match request.uri().path() {
            "/echoserver.Echoserver/Echo" => Box::pin(async move {
                let mut grpc = Grpc::new(tonic::codec::ProstCodec::default());
                Ok(grpc.unary(EchoSvc(inner), request).await)
            }),
            "/echoserver.Echoserver/Status" => Box::pin(async move {
                let mut grpc = Grpc::new(tonic::codec::ProstCodec::default());
                Ok(grpc.unary(StatusSvc(inner), request).await)
            }),
            "/echoserver.Echoserver/Request" => Box::pin(async move {
                let mut grpc = Grpc::new(tonic::codec::ProstCodec::default());
                Ok(grpc.unary(RequestSvc(inner), request).await)
            }),
            path => {
                let status = Status::unimplemented(format!("unknown method {path}"));
                Box::pin(async move { Ok(status.into_http()) })
            }
        }
    }
}
