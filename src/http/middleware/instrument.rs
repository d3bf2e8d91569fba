//! Request instrumentation.
//!
//! # Responsibilities
//! - Continue the caller's trace and open the request's server span
//! - Expose request id and trace context to handlers
//! - Record the request metrics and one completion log line per request
//!
//! # Design Decisions
//! - Completion is recorded by a guard: a request whose future is dropped
//!   because the client went away is still counted, with status 499
//! - Log severity follows the status code: `>= 500` is an error

use axum::body::HttpBody;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{CONTENT_LENGTH, HOST, USER_AGENT};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt};
use opentelemetry::{Context, KeyValue};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{Instrument, Level};

use crate::http::request::{RequestContext, RequestId};
use crate::http::response::Fault;
use crate::http::server::AppState;
use crate::observability::trace::trace_id;
use crate::observability::{HttpObservation, Telemetry};

/// Status recorded for requests abandoned by the client.
pub const STATUS_CLIENT_CLOSED: u16 = 499;

pub async fn instrument(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .cloned()
        .unwrap_or_else(|| state.request_ids.next_id());

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let route = state.routes.route_label(&path);
    let scheme = request.uri().scheme_str().unwrap_or("http").to_string();
    let host = header_str(request.headers(), HOST)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default();
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_else(|| path.clone());
    let url = format!("{scheme}://{host}{target}");
    let protocol = format!("{:?}", request.version());
    let user_agent = header_str(request.headers(), USER_AGENT)
        .map(|agent| agent.replace(['\r', '\n'], ""))
        .unwrap_or_default();
    let client_address = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();
    let request_body_size = header_str(request.headers(), CONTENT_LENGTH)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);

    let tracer = state.telemetry.tracing();
    let parent = tracer.extract(request.headers());
    let cx = tracer.start(format!("{method} {route}"), SpanKind::Server, &parent);
    cx.span().set_attributes([
        KeyValue::new("http.request.method", method.clone()),
        KeyValue::new("http.route", route),
        KeyValue::new("url.full", url.clone()),
        KeyValue::new("url.path", path.clone()),
        KeyValue::new("url.scheme", scheme.clone()),
        KeyValue::new("server.address", host),
        KeyValue::new("user_agent.original", user_agent.clone()),
        KeyValue::new("client.address", client_address.clone()),
        KeyValue::new("network.protocol.version", protocol.clone()),
        KeyValue::new("http.request_id", request_id.to_string()),
    ]);

    let trace_id = trace_id(&cx);
    let span = tracing::info_span!("request", request_id = %request_id, trace_id = %trace_id);

    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
        trace: cx.clone(),
    });

    let mut in_flight = InFlight {
        telemetry: state.telemetry.clone(),
        cx,
        span: span.clone(),
        request_id,
        trace_id,
        method,
        route,
        scheme,
        path,
        url,
        protocol,
        user_agent,
        client_address,
        request_body_size,
        started,
        finished: false,
    };

    let response = next.run(request).instrument(span).await;

    let response_body_size = response.body().size_hint().exact().unwrap_or(0);
    in_flight.finish(
        response.status().as_u16(),
        response_body_size,
        response.extensions().get::<Fault>(),
        false,
    );
    response
}

fn header_str(headers: &HeaderMap, name: axum::http::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Everything needed to record a request once it completes or is dropped.
struct InFlight {
    telemetry: Telemetry,
    cx: Context,
    span: tracing::Span,
    request_id: RequestId,
    trace_id: String,
    method: String,
    route: &'static str,
    scheme: String,
    path: String,
    url: String,
    protocol: String,
    user_agent: String,
    client_address: String,
    request_body_size: u64,
    started: Instant,
    finished: bool,
}

macro_rules! completion_event {
    ($level:expr, $record:expr, $status:expr, $size:expr, $duration:expr, $message:expr) => {
        tracing::event!(
            $level,
            http_response_status_code = $status,
            http_request_method = %$record.method,
            http_route = $record.route,
            url_scheme = %$record.scheme,
            url_path = %$record.path,
            url_full = %$record.url,
            network_protocol_version = %$record.protocol,
            user_agent_original = %$record.user_agent,
            client_address = %$record.client_address,
            http_request_body_size = $record.request_body_size,
            http_response_body_size = $size,
            http_request_duration_ms = $duration.as_secs_f64() * 1000.0,
            request_id = %$record.request_id,
            trace_id = %$record.trace_id,
            "{}",
            $message
        )
    };
}

impl InFlight {
    fn finish(&mut self, status: u16, response_body_size: u64, fault: Option<&Fault>, cancelled: bool) {
        self.finished = true;
        let duration = self.started.elapsed();

        let span = self.cx.span();
        span.set_attribute(KeyValue::new("http.response.status_code", i64::from(status)));
        span.set_attribute(KeyValue::new(
            "http.response.body.size",
            response_body_size as i64,
        ));
        if let Some(fault) = fault {
            span.add_event(
                "panic",
                vec![
                    KeyValue::new("exception.message", fault.message.clone()),
                    KeyValue::new("exception.stacktrace", fault.stack.clone().unwrap_or_default()),
                ],
            );
            span.set_status(Status::error(fault.message.clone()));
        } else if cancelled {
            span.set_status(Status::error("request cancelled"));
        } else if status >= 500 {
            span.set_status(Status::error(""));
        }
        span.end();

        self.telemetry.metrics().record_http(&HttpObservation {
            status,
            method: &self.method,
            route: self.route,
            scheme: &self.scheme,
            duration,
            request_body_size: self.request_body_size,
            response_body_size,
        });

        let message = if cancelled {
            "Request cancelled."
        } else {
            "Request completed."
        };
        let _entered = self.span.enter();
        if status >= 500 {
            completion_event!(Level::ERROR, self, status, response_body_size, duration, message);
        } else {
            completion_event!(Level::INFO, self, status, response_body_size, duration, message);
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(STATUS_CLIENT_CLOSED, 0, None, true);
        }
    }
}
