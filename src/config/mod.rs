//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI / env overrides (cli.rs)
//!     → validation.rs (semantic checks)
//!     → EchoConfig (validated, immutable)
//!     → shared via Arc to handlers and sessions
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never mutated afterwards
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    EchoConfig, GrpcConfig, ListenerConfig, LogFormat, ObservabilityConfig, RelayConfig,
    ShutdownConfig, TraceExporter, WebSocketConfig,
};
pub use validation::{validate_config, ValidationError};
