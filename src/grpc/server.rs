//! gRPC server setup.

use rand::distributions::WeightedError;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::Code;

use crate::config::{EchoConfig, RelayConfig};
use crate::grpc::proto::file_descriptor_set;
use crate::grpc::service::{Echoserver, EchoserverServer};
use crate::grpc::status::RANDOM_GRPC_CODES;
use crate::http::RequestIdGenerator;
use crate::lifecycle::Shutdown;
use crate::observability::Telemetry;
use crate::simulation::WeightedTable;

#[derive(Debug, Error)]
pub enum GrpcError {
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("failed to build reflection service: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    #[error("invalid outcome table: {0}")]
    Outcomes(#[from] WeightedError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// State shared by every RPC.
#[derive(Clone)]
pub struct GrpcState {
    pub telemetry: Telemetry,
    pub request_ids: Arc<RequestIdGenerator>,
    pub relay: RelayConfig,
    pub random_codes: Arc<WeightedTable<Code>>,
}

impl GrpcState {
    pub fn new(
        config: &EchoConfig,
        telemetry: Telemetry,
        request_ids: Arc<RequestIdGenerator>,
    ) -> Result<Self, GrpcError> {
        Ok(Self {
            telemetry,
            request_ids,
            relay: config.relay.clone(),
            random_codes: Arc::new(WeightedTable::new(RANDOM_GRPC_CODES)?),
        })
    }
}

pub struct GrpcServer {
    state: GrpcState,
}

impl GrpcServer {
    pub fn new(
        config: &EchoConfig,
        telemetry: Telemetry,
        request_ids: Arc<RequestIdGenerator>,
    ) -> Result<Self, GrpcError> {
        Ok(Self {
            state: GrpcState::new(config, telemetry, request_ids)?,
        })
    }

    /// Serve Echoserver, reflection and health until shutdown fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), GrpcError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gRPC server starting.");

        let reflection = tonic_reflection::server::Builder::configure()
            .register_file_descriptor_set(file_descriptor_set())
            .build_v1()?;

        let (mut health_reporter, health) = tonic_health::server::health_reporter();
        health_reporter.set_serving::<EchoserverServer>().await;

        tonic::transport::Server::builder()
            .add_service(health)
            .add_service(reflection)
            .add_service(EchoserverServer::new(Echoserver::new(self.state)))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown.notified())
            .await?;

        tracing::info!("gRPC server stopped.");
        Ok(())
    }
}
