//! Error types for umbra-core.

use thiserror::Error;

/// Errors raised while validating configuration or geometry requests.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A configuration value is outside its documented range.
    #[error("invalid value for '{field}': {reason}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },

    /// A configuration record could not be decoded.
    #[error("invalid configuration record: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Shorthand for building a [`CoreError::Validation`].
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Both variants describe a bad input value.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Json(_))
    }
}

/// A specialized Result type for umbra-core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = CoreError::validation("night_factor", "must be within [0, 1], got 2");
        assert_eq!(
            err.to_string(),
            "invalid value for 'night_factor': must be within [0, 1], got 2"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_json_error_is_validation() {
        let err: CoreError = serde_json::from_str::<u32>("\"x\"").unwrap_err().into();
        assert!(err.is_validation());
    }
}
