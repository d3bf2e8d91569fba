//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define server metrics (request count, latency, body sizes, log volume)
//! - Record observations into an injected Prometheus recorder
//! - Render the Prometheus text exposition for `/metrics`
//!
//! # Metrics
//! - `http_server_request_total` (counter): requests by status, method, route, scheme
//! - `http_server_request_duration_seconds` (histogram): latency distribution
//! - `http_server_request_body_size_bytes` (histogram): request body sizes
//! - `http_server_response_body_size_bytes` (histogram): response body sizes
//! - `grpc_server_handled_total` (counter): RPCs by service, method, code
//! - `grpc_server_handling_seconds` (histogram): RPC latency distribution
//! - `echoserver_logs_total` (counter): log events by level
//!
//! # Design Decisions
//! - Recording goes through `metrics::with_local_recorder`, so each
//!   [`Metrics`] value is an isolated registry
//! - Recorder primitives are atomic; handlers never lock around them

use metrics::{counter, describe_counter, describe_histogram, histogram, Label, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::time::Duration;

pub const HTTP_REQUESTS_TOTAL: &str = "http_server_request_total";
pub const HTTP_REQUEST_DURATION: &str = "http_server_request_duration_seconds";
pub const HTTP_REQUEST_BODY_SIZE: &str = "http_server_request_body_size_bytes";
pub const HTTP_RESPONSE_BODY_SIZE: &str = "http_server_response_body_size_bytes";
pub const GRPC_HANDLED_TOTAL: &str = "grpc_server_handled_total";
pub const GRPC_HANDLING_SECONDS: &str = "grpc_server_handling_seconds";
pub const LOGS_TOTAL: &str = "echoserver_logs_total";

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

const SIZE_BUCKETS: &[f64] = &[
    0.0, 100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0,
];

/// One finished HTTP request, as seen by the instrumentation middleware.
#[derive(Debug, Clone)]
pub struct HttpObservation<'a> {
    pub status: u16,
    pub method: &'a str,
    pub route: &'a str,
    pub scheme: &'a str,
    pub duration: Duration,
    pub request_body_size: u64,
    pub response_body_size: u64,
}

/// One finished RPC.
#[derive(Debug, Clone)]
pub struct RpcObservation<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub code: &'a str,
    pub duration: Duration,
}

/// Prometheus-backed metric registry.
pub struct Metrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl Metrics {
    /// Build a fresh, empty registry.
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(HTTP_REQUEST_DURATION.to_string()), DURATION_BUCKETS)?
            .set_buckets_for_metric(Matcher::Full(GRPC_HANDLING_SECONDS.to_string()), DURATION_BUCKETS)?
            .set_buckets_for_metric(Matcher::Suffix("_body_size_bytes".to_string()), SIZE_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();

        let metrics = Self { recorder, handle };
        metrics.describe();
        Ok(metrics)
    }

    fn describe(&self) {
        metrics::with_local_recorder(&self.recorder, || {
            describe_counter!(
                HTTP_REQUESTS_TOTAL,
                Unit::Count,
                "Number of HTTP requests processed, partitioned by status code, method and route."
            );
            describe_histogram!(HTTP_REQUEST_DURATION, Unit::Seconds, "Duration of HTTP server requests.");
            describe_histogram!(HTTP_REQUEST_BODY_SIZE, Unit::Bytes, "Size of HTTP server request bodies.");
            describe_histogram!(HTTP_RESPONSE_BODY_SIZE, Unit::Bytes, "Size of HTTP server response bodies.");
            describe_counter!(GRPC_HANDLED_TOTAL, Unit::Count, "Number of RPCs completed on the server.");
            describe_histogram!(GRPC_HANDLING_SECONDS, Unit::Seconds, "Duration of RPCs handled by the server.");
            describe_counter!(LOGS_TOTAL, Unit::Count, "Number of logs, partitioned by log level.");
        });
    }

    /// Record one finished HTTP request.
    pub fn record_http(&self, observation: &HttpObservation<'_>) {
        let labels = vec![
            Label::new("http_response_status_code", observation.status.to_string()),
            Label::new("http_request_method", observation.method.to_string()),
            Label::new("http_route", observation.route.to_string()),
            Label::new("url_scheme", observation.scheme.to_string()),
        ];

        metrics::with_local_recorder(&self.recorder, || {
            counter!(HTTP_REQUESTS_TOTAL, labels.clone()).increment(1);
            histogram!(HTTP_REQUEST_DURATION, labels.clone()).record(observation.duration.as_secs_f64());
            histogram!(HTTP_REQUEST_BODY_SIZE, labels.clone()).record(observation.request_body_size as f64);
            histogram!(HTTP_RESPONSE_BODY_SIZE, labels).record(observation.response_body_size as f64);
        });
    }

    /// Record one finished RPC.
    pub fn record_rpc(&self, observation: &RpcObservation<'_>) {
        let labels = vec![
            Label::new("grpc_service", observation.service.to_string()),
            Label::new("grpc_method", observation.method.to_string()),
            Label::new("grpc_code", observation.code.to_string()),
        ];

        metrics::with_local_recorder(&self.recorder, || {
            counter!(GRPC_HANDLED_TOTAL, labels.clone()).increment(1);
            histogram!(GRPC_HANDLING_SECONDS, labels).record(observation.duration.as_secs_f64());
        });
    }

    /// Count one log event.
    pub fn record_log(&self, level: &tracing::Level) {
        let level = level.as_str();
        metrics::with_local_recorder(&self.recorder, || {
            counter!(LOGS_TOTAL, "level" => level).increment(1);
        });
    }

    /// Prometheus text exposition of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
