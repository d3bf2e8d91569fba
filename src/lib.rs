//! Diagnostic echo server library.
//!
//! Serves a fixed set of HTTP endpoints (echo, health, panic, status,
//! timeout, header size, relay, Fibonacci, WebSocket echo, metrics) and,
//! with the `grpc` feature, an RPC surface with the same behaviors.

pub mod cli;
pub mod config;
#[cfg(feature = "grpc")]
pub mod grpc;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod simulation;

pub use config::EchoConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observability::Telemetry;
