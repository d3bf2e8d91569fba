//! Behavior simulation primitives.
//!
//! # Data Flow
//! ```text
//! /status, gRPC Status  → outcome.rs   (weighted random pick)
//! /timeout              → duration.rs  (duration string → Duration)
//! /fibonacci            → fibonacci.rs (fast doubling on BigUint)
//! ```
//!
//! # Design Decisions
//! - Pure functions and plain data, no I/O and no shared state
//! - Handlers own the mapping from these results to responses

pub mod duration;
pub mod fibonacci;
pub mod outcome;

pub use duration::{parse_duration, DurationError};
pub use fibonacci::fibonacci;
pub use outcome::{WeightedTable, RANDOM_HTTP_STATUSES};
