//! Handler errors and their HTTP rendering.
//!
//! # Design Decisions
//! - Parameter and relay errors become `400 Bad Request` with the error
//!   text as a plain-text body
//! - A [`EchoError::Fault`] is not rendered here: the response carries a
//!   [`Fault`] extension that the recovery middleware turns into the same
//!   `500` a caught panic produces

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::relay::RelayError;
use crate::simulation::DurationError;

#[derive(Debug, Error)]
pub enum EchoError {
    #[error("{0} parameter is missing")]
    MissingParameter(&'static str),

    #[error("invalid {name} parameter \"{value}\": {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Duration(#[from] DurationError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("invalid request body: {0}")]
    Body(String),

    #[error("{0}")]
    Fault(String),
}

impl EchoError {
    pub fn invalid(name: &'static str, value: &str, reason: impl ToString) -> Self {
        EchoError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl IntoResponse for EchoError {
    fn into_response(self) -> Response {
        if let EchoError::Fault(message) = self {
            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            response.extensions_mut().insert(Fault::new(message));
            return response;
        }

        tracing::warn!(error = %self, "Rejected request.");
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Marker for a response produced by a fault rather than by the handler.
///
/// `stack` is filled in by the recovery middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub message: String,
    pub stack: Option<String>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }
}
