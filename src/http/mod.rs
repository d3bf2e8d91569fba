//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request id)
//!     → middleware/ (instrumentation, recovery)
//!     → routes.rs (exact-path dispatch table)
//!     → handlers.rs / relay.rs / websocket.rs
//!     → response.rs (errors → status codes)
//! ```

pub mod handlers;
pub mod middleware;
pub mod relay;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;
pub mod websocket;

pub use request::{RequestContext, RequestId, RequestIdGenerator, X_REQUEST_ID};
pub use response::{EchoError, Fault};
pub use routes::{DispatchTable, Endpoint};
pub use server::{AppState, HttpServer, ServerError};
