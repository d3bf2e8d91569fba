//! Diagnostic endpoints.
//!
//! Each handler is small and stateless apart from the shared [`AppState`].
//! Query parameters are parsed here; failures become [`EchoError`]s and so
//! `400 Bad Request`.

use axum::body::{to_bytes, Bytes};
use axum::extract::{Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::KeyValue;
use serde::Deserialize;

use crate::http::middleware::recovery::panic_message;
use crate::http::request::RequestContext;
use crate::http::response::EchoError;
use crate::http::server::AppState;
use crate::simulation::{fibonacci as fib, parse_duration};

pub const X_HEADER_SIZE: HeaderName = HeaderName::from_static("x-header-size");

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimeoutParams {
    pub timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HeaderSizeParams {
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FibonacciParams {
    pub n: Option<String>,
}

/// `/`: the received request, serialized in HTTP/1.x wire format.
pub async fn echo(request: Request) -> Result<Response, EchoError> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX)
        .await
        .map_err(|e| EchoError::Body(e.to_string()))?;

    Ok(([(CONTENT_TYPE, TEXT_PLAIN)], dump_request(&parts, &body)).into_response())
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn panic() -> Result<Response, EchoError> {
    Err(EchoError::Fault("panic test".to_string()))
}

/// `/status`: the requested status code, or a weighted random one.
pub async fn status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<StatusParams>,
) -> Result<Response, EchoError> {
    let code = match params.status.as_deref() {
        None | Some("") | Some("random") => {
            let drawn = state.random_statuses.draw();
            StatusCode::from_u16(drawn).map_err(|e| EchoError::Fault(e.to_string()))?
        }
        Some(value) => {
            annotate(&ctx, "http.parameter.status", value);
            parse_status(value)?
        }
    };

    Ok((code, code.canonical_reason().unwrap_or("")).into_response())
}

fn parse_status(value: &str) -> Result<StatusCode, EchoError> {
    let code: u16 = value
        .parse()
        .map_err(|e| EchoError::invalid("status", value, e))?;
    let status =
        StatusCode::from_u16(code).map_err(|_| EchoError::invalid("status", value, "invalid status code"))?;
    if status.is_informational() {
        return Err(EchoError::invalid(
            "status",
            value,
            "informational status codes cannot be final responses",
        ));
    }
    Ok(status)
}

/// `/timeout`: answer after sleeping for the requested duration.
pub async fn timeout(
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<TimeoutParams>,
) -> Result<&'static str, EchoError> {
    let raw = params
        .timeout
        .filter(|value| !value.is_empty())
        .ok_or(EchoError::MissingParameter("timeout"))?;
    annotate(&ctx, "http.parameter.timeout", &raw);

    let delay = parse_duration(&raw)?;
    tokio::time::sleep(delay).await;
    Ok("OK")
}

/// `/headersize`: a response header of `size` bytes.
pub async fn header_size(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<HeaderSizeParams>,
) -> Result<Response, EchoError> {
    let raw = params
        .size
        .filter(|value| !value.is_empty())
        .ok_or(EchoError::MissingParameter("size"))?;
    annotate(&ctx, "http.parameter.size", &raw);

    let size: usize = raw.parse().map_err(|e| EchoError::invalid("size", &raw, e))?;
    let limit = state.config.listener.max_header_bytes;
    if size > limit {
        return Err(EchoError::invalid(
            "size",
            &raw,
            format!("exceeds the {limit} byte limit"),
        ));
    }

    let filler = header_filler(size)?;

    Ok(([(X_HEADER_SIZE, filler)], "OK").into_response())
}

/// `/fibonacci`: F(n) in decimal, computed off the async workers.
pub async fn fibonacci(
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<FibonacciParams>,
) -> Result<String, EchoError> {
    let raw = params
        .n
        .filter(|value| !value.is_empty())
        .ok_or(EchoError::MissingParameter("n"))?;
    annotate(&ctx, "http.parameter.n", &raw);

    let n: u64 = raw.parse().map_err(|e| EchoError::invalid("n", &raw, e))?;
    tokio::task::spawn_blocking(move || fib(n).to_string())
        .await
        .map_err(|e| {
            if e.is_panic() {
                EchoError::Fault(panic_message(&*e.into_panic()))
            } else {
                EchoError::Fault(e.to_string())
            }
        })
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = state.telemetry.metrics().render();
    ([(CONTENT_TYPE, PROMETHEUS_TEXT)], body).into_response()
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found")
}

/// `size` ASCII zeros. Allocation failure is an error, not an abort.
fn header_filler(size: usize) -> Result<HeaderValue, EchoError> {
    let mut filler = String::new();
    filler
        .try_reserve_exact(size)
        .map_err(|e| EchoError::Fault(e.to_string()))?;
    filler.extend(std::iter::repeat('0').take(size));
    HeaderValue::try_from(filler).map_err(|e| EchoError::Fault(e.to_string()))
}

fn annotate(ctx: &RequestContext, key: &'static str, value: &str) {
    ctx.trace
        .span()
        .set_attribute(KeyValue::new(key, value.to_string()));
}

/// Request line, `Host` header, remaining headers in arrival order, blank
/// line, body.
pub fn dump_request(parts: &Parts, body: &Bytes) -> Vec<u8> {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut out = Vec::with_capacity(256 + body.len());
    out.extend_from_slice(format!("{} {} {:?}\r\n", parts.method, target, parts.version).as_bytes());

    let host = parts
        .headers
        .get(axum::http::header::HOST)
        .map(|value| value.as_bytes().to_vec())
        .or_else(|| parts.uri.authority().map(|a| a.as_str().as_bytes().to_vec()));
    if let Some(host) = host {
        out.extend_from_slice(b"Host: ");
        out.extend_from_slice(&host);
        out.extend_from_slice(b"\r\n");
    }

    for (name, value) in &parts.headers {
        if name == axum::http::header::HOST {
            continue;
        }
        out.extend_from_slice(canonical_header_name(name.as_str()).as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

/// `x-request-id` → `X-Request-Id`.
fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}
