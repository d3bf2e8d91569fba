//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (timeouts > 0)
//! - Check relationships between values (read deadline outlives ping interval)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EchoConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::EchoConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("websocket.read_timeout_secs ({read}) must be greater than websocket.ping_interval_secs ({ping})")]
    ReadTimeoutTooShort { read: u64, ping: u64 },

    #[error("observability.log_level: '{0}' is not a valid filter directive")]
    InvalidLogLevel(String),
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &EchoConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.grpc.enabled {
        check_address(&mut errors, "grpc.bind_address", &config.grpc.bind_address);
    }

    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_body_bytes" });
    }
    if config.relay.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "relay.timeout_secs" });
    }
    if config.relay.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "relay.connect_timeout_secs" });
    }

    let ws = &config.websocket;
    if ws.ping_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "websocket.ping_interval_secs" });
    }
    if ws.read_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "websocket.read_timeout_secs" });
    } else if ws.read_timeout_secs <= ws.ping_interval_secs {
        errors.push(ValidationError::ReadTimeoutTooShort {
            read: ws.read_timeout_secs,
            ping: ws.ping_interval_secs,
        });
    }

    let level = &config.observability.log_level;
    if tracing_subscriber::EnvFilter::try_new(level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
