//! Outbound request relay.
//!
//! # Data Flow
//! ```text
//! JSON instruction (method, url, headers, body)
//!     → client.rs (validate, merge propagation headers, send)
//!     → upstream status + raw body handed back to the caller
//! ```
//!
//! # Design Decisions
//! - One pooled `reqwest` client per server, timeouts from config
//! - Caller-supplied headers always win over propagated ones
//! - Transport failures carry the full error chain as text

pub mod client;

pub use client::{RelayClient, RelayError, RelayRequest, RelayResponse};
