//! Gateway error types.
//!
//! Handler failures are values: the dispatcher converts every variant into
//! a 4-element error reply frame on the same session. Nothing here ever
//! terminates the process or another session.

use thiserror::Error;

/// Session-engine error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Message did not parse as JSON at all.
    #[error("invalid json string")]
    Json(#[from] serde_json::Error),

    /// A typed getter rejected a field, e.g. a string where an integer was
    /// expected.
    #[error("{0}")]
    BadValue(String),

    /// Domain failure inside a verb handler; becomes
    /// `["error", context, field, text]`.
    #[error("{context}/{field}: {text}")]
    Reject {
        context: &'static str,
        field: &'static str,
        text: String,
    },
}

impl GatewayError {
    pub fn reject(
        context: &'static str,
        field: &'static str,
        text: impl Into<String>,
    ) -> Self {
        Self::Reject {
            context,
            field,
            text: text.into(),
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
