//! echoserver
//!
//! Diagnostic echo server for exercising proxies, load balancers and service
//! meshes.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──HTTP──→ body limit → request id → instrument → recovery → handler
//!                                                                 │
//!          /, /health, /panic, /status, /timeout, /headersize,    │
//!          /fibonacci, /metrics ◄─────────────────────────────────┤
//!          /request ──────────── relay client ──→ upstream        │
//!          /websocket ────────── echo session (ping / pong) ◄─────┘
//!
//!   client ──gRPC──→ Echo / Status / Request   (feature `grpc`)
//!
//!   cross-cutting: config, observability (logs, metrics, traces), lifecycle
//! ```

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};

use echoserver::cli::Cli;
use echoserver::http::{HttpServer, RequestIdGenerator};
use echoserver::lifecycle::{wait_for_signal, Shutdown};
use echoserver::observability::logging::init_logging;
use echoserver::observability::Telemetry;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config = cli.load()?;

    let telemetry = Telemetry::new(&config.observability)?;
    init_logging(&config.observability, telemetry.metrics_handle())?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting echoserver.");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        grpc_enabled = config.grpc.enabled,
        metrics_enabled = config.observability.metrics_enabled,
        trace_exporter = ?config.observability.trace_exporter,
        "Configuration loaded."
    );

    let shutdown = Shutdown::new();
    let request_ids = Arc::new(RequestIdGenerator::new());
    let mut servers: JoinSet<Result<(), BoxError>> = JoinSet::new();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let http = HttpServer::with_request_ids(config.clone(), telemetry.clone(), Arc::clone(&request_ids))?;
    let http_shutdown = shutdown.clone();
    servers.spawn(async move { http.run(listener, http_shutdown).await.map_err(BoxError::from) });

    if config.grpc.enabled {
        spawn_grpc(&mut servers, &config, &telemetry, &request_ids, &shutdown).await?;
    }

    tokio::select! {
        _ = wait_for_signal() => tracing::info!("Shutdown signal received."),
        Some(result) = servers.join_next() => report(result),
    }

    shutdown.trigger();
    let grace_period = config.shutdown.grace_period();
    let drained = tokio::time::timeout(grace_period, async {
        while let Some(result) = servers.join_next().await {
            report(result);
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            grace_period_secs = config.shutdown.grace_period_secs,
            "Grace period elapsed, closing remaining connections."
        );
        servers.abort_all();
    }

    telemetry.shutdown();
    tracing::info!("Shutdown complete.");
    Ok(())
}

#[cfg(feature = "grpc")]
async fn spawn_grpc(
    servers: &mut JoinSet<Result<(), BoxError>>,
    config: &echoserver::EchoConfig,
    telemetry: &Telemetry,
    request_ids: &Arc<RequestIdGenerator>,
    shutdown: &Shutdown,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind(&config.grpc.bind_address).await?;
    let grpc = echoserver::grpc::GrpcServer::new(config, telemetry.clone(), Arc::clone(request_ids))?;
    let shutdown = shutdown.clone();
    servers.spawn(async move { grpc.run(listener, shutdown).await.map_err(BoxError::from) });
    Ok(())
}

#[cfg(not(feature = "grpc"))]
async fn spawn_grpc(
    _servers: &mut JoinSet<Result<(), BoxError>>,
    _config: &echoserver::EchoConfig,
    _telemetry: &Telemetry,
    _request_ids: &Arc<RequestIdGenerator>,
    _shutdown: &Shutdown,
) -> Result<(), BoxError> {
    tracing::warn!("gRPC is enabled in the configuration but this build lacks the `grpc` feature.");
    Ok(())
}

fn report(result: Result<Result<(), BoxError>, JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Server died unexpectedly."),
        Err(e) => tracing::error!(error = %e, "Server task failed."),
    }
}
