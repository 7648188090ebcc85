//! Shared primitives for all kadmin crates.

#![forbid(unsafe_code)]

/// Transport failure classification shared by ports and adapters.
pub mod transport;

use thiserror::Error;

pub use transport::{TransportError, TransportErrorKind};

/// Result type used across kadmin crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Validates an optional value, naming the offending field on failure.
    pub fn required(value: Option<&str>, field: &str) -> AppResult<Self> {
        match value {
            Some(value) if !value.trim().is_empty() => Ok(Self(value.to_owned())),
            _ => Err(AppError::Validation(format!("{field} must not be empty"))),
        }
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common error categories for Admin API calls.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid or missing caller input, detected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist on the remote service.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or connection failure.
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Remote service answered with an error payload.
    #[error("service error (status {status}): {message}")]
    Service {
        /// HTTP status code returned by the service.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// Request or response body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true when the remote service closed the connection early.
    #[must_use]
    pub fn is_premature_close(&self) -> bool {
        matches!(
            self,
            Self::Transport(error) if error.kind() == TransportErrorKind::PrematureClose
        )
    }
}

impl From<TransportError> for AppError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}
