//! Middleware pipeline.
//!
//! # Data Flow
//! ```text
//! request
//!     → body limit
//!     → request id   (crate::http::request)
//!     → instrument.rs (server span, metrics, completion log)
//!     → recovery.rs   (panics and faults → 500)
//!     → handler
//! ```

pub mod instrument;
pub mod recovery;
