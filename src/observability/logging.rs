//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem
//! - Count emitted log events per level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, console format for development
//! - Log level configurable via config and `RUST_LOG`

use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::{Metrics, TelemetryError};

/// Layer that increments `echoserver_logs_total{level}` for every event.
pub struct LogCounterLayer {
    metrics: Arc<Metrics>,
}

impl LogCounterLayer {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S: Subscriber> Layer<S> for LogCounterLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.metrics.record_log(event.metadata().level());
    }
}

/// Install the global log subscriber.
///
/// `RUST_LOG`, when set, overrides `config.log_level`.
pub fn init_logging(config: &ObservabilityConfig, metrics: Arc<Metrics>) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let counter = LogCounterLayer::new(metrics);

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true).with_span_list(false))
            .with(counter)
            .try_init(),
        LogFormat::Console => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(counter)
            .try_init(),
    };

    result.map_err(|e| TelemetryError::Logging(e.to_string()))
}
