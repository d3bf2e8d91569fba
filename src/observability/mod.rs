//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Middleware pipeline and handlers produce:
//!     → logging.rs (structured log events, log counter)
//!     → metrics.rs (counters, histograms, Prometheus rendering)
//!     → trace.rs   (OpenTelemetry spans, W3C context propagation)
//!
//! Consumers:
//!     → stdout (console or JSON lines)
//!     → /metrics (Prometheus scrape)
//!     → OTLP collector (optional)
//! ```
//!
//! # Design Decisions
//! - Metric registry and tracer provider are owned by a [`Telemetry`] value
//!   built at startup and handed to the server, never process globals
//! - Recording is best-effort: backend failures are logged, never surfaced
//!   to the request being served

pub mod logging;
pub mod metrics;
pub mod trace;

use std::sync::Arc;
use thiserror::Error;

use crate::config::ObservabilityConfig;

pub use self::metrics::{HttpObservation, Metrics, RpcObservation};
pub use self::trace::Tracing;

/// Error raised while building instrumentation backends.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to build span exporter: {0}")]
    Exporter(String),

    #[error("failed to install log subscriber: {0}")]
    Logging(String),
}

/// Instrumentation context shared by every request.
///
/// Cloning is cheap; all clones record into the same registry and tracer.
#[derive(Clone)]
pub struct Telemetry {
    metrics: Arc<Metrics>,
    tracing: Arc<Tracing>,
}

impl Telemetry {
    /// Build the metric registry and tracer provider described by `config`.
    pub fn new(config: &ObservabilityConfig) -> Result<Self, TelemetryError> {
        Ok(Self {
            metrics: Arc::new(Metrics::new()?),
            tracing: Arc::new(Tracing::new(config)?),
        })
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shared handle to the metric registry, for the log counter layer.
    pub fn metrics_handle(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn tracing(&self) -> &Tracing {
        &self.tracing
    }

    /// Flush and stop the tracer provider.
    pub fn shutdown(&self) {
        self.tracing.shutdown();
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}
