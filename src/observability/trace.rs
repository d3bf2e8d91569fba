//! Distributed tracing support.
//!
//! # Responsibilities
//! - Own the OpenTelemetry tracer provider and tracer
//! - Extract trace context from incoming requests
//! - Inject trace context into relayed requests
//! - Start spans that continue the caller's trace
//!
//! # Design Decisions
//! - Spans are always created so trace ids appear in logs, even when no
//!   exporter is configured
//! - Supports W3C Trace Context and Baggage headers
//! - Optional OTLP/HTTP exporter with batching

use axum::http::HeaderMap;
use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer, TracerProvider};
use opentelemetry::Context;
use opentelemetry_http::{HeaderExtractor, HeaderInjector};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

use crate::config::{ObservabilityConfig, TraceExporter};
use crate::observability::TelemetryError;

const INSTRUMENTATION_SCOPE: &str = "echoserver";

/// Tracer provider, tracer and propagator for one server instance.
pub struct Tracing {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    propagator: TextMapCompositePropagator,
}

impl Tracing {
    pub fn new(config: &ObservabilityConfig) -> Result<Self, TelemetryError> {
        let resource = Resource::builder()
            .with_service_name(config.service_name.clone())
            .build();

        let mut builder = SdkTracerProvider::builder().with_resource(resource);
        if config.trace_exporter == TraceExporter::Otlp {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(config.otlp_endpoint.clone())
                .build()
                .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
            builder = builder.with_batch_exporter(exporter);
        }

        let provider = builder.build();
        let tracer = provider.tracer(INSTRUMENTATION_SCOPE);
        let propagator = TextMapCompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(BaggagePropagator::new()),
        ]);

        Ok(Self {
            provider,
            tracer,
            propagator,
        })
    }

    /// Remote context carried by the request headers, or an empty context.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        self.propagator.extract(&HeaderExtractor(headers))
    }

    /// Write `cx` into outbound headers.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        self.propagator.inject_context(cx, &mut HeaderInjector(headers));
    }

    /// Start a span as a child of `parent` and return a context holding it.
    ///
    /// The span ends when [`opentelemetry::trace::SpanRef::end`] is called
    /// on `cx.span()` or when the last clone of the context is dropped.
    pub fn start(&self, name: impl Into<String>, kind: SpanKind, parent: &Context) -> Context {
        let span = self
            .tracer
            .span_builder(name.into())
            .with_kind(kind)
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Graceful shutdown of the tracer provider failed.");
        }
    }
}

/// Hex trace id of the span in `cx`, empty when there is none.
pub fn trace_id(cx: &Context) -> String {
    let span_context = cx.span().span_context().clone();
    if span_context.is_valid() {
        span_context.trace_id().to_string()
    } else {
        String::new()
    }
}
