//! Static dispatch table.
//!
//! Every endpoint is an exact path. The table is resolved once per request,
//! before the handler runs, so the matched route is known to the
//! instrumentation layer as a low-cardinality label.

use axum::routing::{any, get, post, MethodRouter};

use crate::http::server::AppState;
use crate::http::{handlers, relay, websocket};

/// Route label used for requests that match no endpoint.
pub const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Echo,
    Health,
    Panic,
    Status,
    Timeout,
    HeaderSize,
    Relay,
    Fibonacci,
    WebSocket,
    Metrics,
}

impl Endpoint {
    pub const ALL: [Endpoint; 10] = [
        Endpoint::Echo,
        Endpoint::Health,
        Endpoint::Panic,
        Endpoint::Status,
        Endpoint::Timeout,
        Endpoint::HeaderSize,
        Endpoint::Relay,
        Endpoint::Fibonacci,
        Endpoint::WebSocket,
        Endpoint::Metrics,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Echo => "/",
            Endpoint::Health => "/health",
            Endpoint::Panic => "/panic",
            Endpoint::Status => "/status",
            Endpoint::Timeout => "/timeout",
            Endpoint::HeaderSize => "/headersize",
            Endpoint::Relay => "/request",
            Endpoint::Fibonacci => "/fibonacci",
            Endpoint::WebSocket => "/websocket",
            Endpoint::Metrics => "/metrics",
        }
    }

    pub fn from_path(path: &str) -> Option<Endpoint> {
        Self::ALL.into_iter().find(|endpoint| endpoint.path() == path)
    }

    /// Handler and accepted methods for this endpoint.
    pub fn method_router(self) -> MethodRouter<AppState> {
        match self {
            Endpoint::Echo => any(handlers::echo),
            Endpoint::Health => any(handlers::health),
            Endpoint::Panic => any(handlers::panic),
            Endpoint::Status => any(handlers::status),
            Endpoint::Timeout => any(handlers::timeout),
            Endpoint::HeaderSize => any(handlers::header_size),
            Endpoint::Relay => post(relay::relay),
            Endpoint::Fibonacci => any(handlers::fibonacci),
            Endpoint::WebSocket => any(websocket::upgrade),
            Endpoint::Metrics => get(handlers::metrics),
        }
    }
}

/// Endpoints enabled for one server instance.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    endpoints: Vec<Endpoint>,
}

impl DispatchTable {
    /// All endpoints, leaving out `/metrics` when the exposition is disabled.
    pub fn new(metrics_enabled: bool) -> Self {
        let endpoints = Endpoint::ALL
            .into_iter()
            .filter(|endpoint| metrics_enabled || *endpoint != Endpoint::Metrics)
            .collect();
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn resolve(&self, path: &str) -> Option<Endpoint> {
        Endpoint::from_path(path).filter(|endpoint| self.endpoints.contains(endpoint))
    }

    /// Route label for `path`.
    pub fn route_label(&self, path: &str) -> &'static str {
        self.resolve(path).map(Endpoint::path).unwrap_or(UNMATCHED_ROUTE)
    }
}
