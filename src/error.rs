//! Error handling for the payload boundary.
//!
//! Scoring and clustering never fail: unknown tags fall back to neutral defaults and
//! insufficient data is silently excluded. The only fallible operations are decoding
//! collaborator JSON and validating configuration.

use thiserror::Error;

/// Errors produced while decoding payloads or validating configuration.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum HeatlineError {
    /// Payload was not valid JSON or did not match the expected shape
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of its allowed range
    #[error("invalid configuration for '{field}': {message}")]
    InvalidConfig { field: &'static str, message: String },
}

/// Result type alias for heatline operations.
pub type Result<T> = std::result::Result<T, HeatlineError>;

impl HeatlineError {
    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        HeatlineError::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}
