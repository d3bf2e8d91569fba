//! Request identity.
//!
//! # Responsibilities
//! - Generate process-unique request ids
//! - Reuse a caller-supplied `X-Request-ID` when it is non-empty
//! - Echo the id on the response
//!
//! # Design Decisions
//! - Ids look like `<hostname>/<random>-<counter>`: the prefix is fixed at
//!   startup, the counter is a single atomic increment per request
//! - Request id middleware runs before instrumentation so every log line
//!   and span of the request carries the id

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::Context;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::http::server::AppState;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const RANDOM_PREFIX_LEN: usize = 10;

/// Correlation id of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request values made available to handlers as a request extension.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// Context holding the request's server span.
    pub trace: Context,
}

pub struct RequestIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Generator whose prefix is `<hostname>/<10 random chars>`.
    pub fn new() -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        let hostname = if hostname.is_empty() {
            "localhost".to_string()
        } else {
            hostname
        };

        let random = Uuid::new_v4().simple().to_string();
        Self::with_prefix(format!("{}/{}", hostname, &random[..RANDOM_PREFIX_LEN]))
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        RequestId(format!("{}-{:06}", self.prefix, n))
    }

    /// The caller's id when present and non-empty, a fresh one otherwise.
    pub fn from_incoming(&self, incoming: Option<&str>) -> RequestId {
        match incoming.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => RequestId::new(id),
            None => self.next_id(),
        }
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware that assigns the request id and echoes it on the response.
pub async fn assign_request_id(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let incoming = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok());
    let request_id = state.request_ids.from_incoming(incoming);
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;
    match HeaderValue::from_str(request_id.as_str()) {
        Ok(value) => {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }
        Err(e) => tracing::warn!(error = %e, "Request id is not a valid header value."),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_sequential() {
        let ids = RequestIdGenerator::with_prefix("host/abcdefghij");
        assert_eq!(ids.next_id().as_str(), "host/abcdefghij-000001");
        assert_eq!(ids.next_id().as_str(), "host/abcdefghij-000002");
    }

    #[test]
    fn test_prefix_shape() {
        let ids = RequestIdGenerator::new();
        let (host, random) = ids.prefix().rsplit_once('/').unwrap();
        assert!(!host.is_empty());
        assert_eq!(random.len(), RANDOM_PREFIX_LEN);
    }

    #[test]
    fn test_incoming_id_reused() {
        let ids = RequestIdGenerator::with_prefix("p");
        assert_eq!(ids.from_incoming(Some("abc-123")).as_str(), "abc-123");
        assert_eq!(ids.from_incoming(Some("")).as_str(), "p-000001");
        assert_eq!(ids.from_incoming(None).as_str(), "p-000002");
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let ids = std::sync::Arc::new(RequestIdGenerator::with_prefix("p"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut all = std::collections::HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 1000);
    }
}
