//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared [`AppState`]
//! - Create the Axum router from the dispatch table
//! - Wire up middleware (body limit, request id, instrumentation, recovery)
//! - Serve until the shutdown coordinator fires

use axum::middleware;
use axum::Router;
use rand::distributions::WeightedError;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::EchoConfig;
use crate::http::handlers;
use crate::http::middleware::{instrument, recovery};
use crate::http::request::{self, RequestIdGenerator};
use crate::http::routes::DispatchTable;
use crate::lifecycle::Shutdown;
use crate::observability::Telemetry;
use crate::relay::{RelayClient, RelayError};
use crate::simulation::{WeightedTable, RANDOM_HTTP_STATUSES};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("invalid outcome table: {0}")]
    Outcomes(#[from] WeightedError),
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EchoConfig>,
    pub telemetry: Telemetry,
    pub request_ids: Arc<RequestIdGenerator>,
    pub routes: Arc<DispatchTable>,
    pub relay: RelayClient,
    pub random_statuses: Arc<WeightedTable<u16>>,
}

impl AppState {
    pub fn new(
        config: EchoConfig,
        telemetry: Telemetry,
        request_ids: Arc<RequestIdGenerator>,
    ) -> Result<Self, ServerError> {
        Ok(Self {
            routes: Arc::new(DispatchTable::new(config.observability.metrics_enabled)),
            relay: RelayClient::new(&config.relay)?,
            random_statuses: Arc::new(WeightedTable::new(RANDOM_HTTP_STATUSES)?),
            config: Arc::new(config),
            telemetry,
            request_ids,
        })
    }
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: EchoConfig, telemetry: Telemetry) -> Result<Self, ServerError> {
        Self::with_request_ids(config, telemetry, Arc::new(RequestIdGenerator::new()))
    }

    /// Server sharing `request_ids` with other surfaces of the process.
    pub fn with_request_ids(
        config: EchoConfig,
        telemetry: Telemetry,
        request_ids: Arc<RequestIdGenerator>,
    ) -> Result<Self, ServerError> {
        let state = AppState::new(config, telemetry, request_ids)?;
        Ok(Self {
            router: build_router(state),
        })
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting.");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.notified())
            .await?;

        tracing::info!("HTTP server stopped.");
        Ok(())
    }
}

/// The last layer added is the outermost.
fn build_router(state: AppState) -> Router {
    recovery::install_panic_hook();

    let mut router = Router::new();
    for endpoint in state.routes.endpoints() {
        router = router.route(endpoint.path(), endpoint.method_router());
    }

    router
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(recovery::recover))
        .layer(middleware::from_fn_with_state(state.clone(), instrument::instrument))
        .layer(middleware::from_fn_with_state(state.clone(), request::assign_request_id))
        .layer(RequestBodyLimitLayer::new(state.config.listener.max_body_bytes))
        .with_state(state)
}
