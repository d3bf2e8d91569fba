//! gRPC surface (cargo feature `grpc`).
//!
//! # Data Flow
//! ```text
//! tonic transport
//!     → reflection (grpc.reflection.v1), health (grpc.health.v1)
//!     → service.rs (echoserver.Echoserver routing)
//!     → instrument.rs (request id, server span, metrics, completion log)
//!     → Echo / Status (status.rs) / Request (relay.rs)
//! ```
//!
//! # Design Decisions
//! - Messages and the file descriptor are declared in Rust (proto.rs), so
//!   building the crate needs no protobuf compiler
//! - `Request` resolves the target method through the target's own
//!   reflection service and relays JSON-encoded messages dynamically

pub mod client;
pub mod instrument;
pub mod proto;
pub mod relay;
pub mod server;
pub mod service;
pub mod status;

pub use client::EchoserverClient;
pub use server::{GrpcError, GrpcServer, GrpcState};
pub use service::EchoserverServer;
