//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → listeners stop accepting → in-flight requests drain
//!             → grace period elapses or all servers exit → telemetry flush
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the signal out to every listener
//! - Draining is bounded by a grace period

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
