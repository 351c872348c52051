//! Error types for the fraud detector, with stable error codes.

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the library.
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Top-level error type for encoding and scoring transactions.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("[UPI-1001] model initialization failed for {path}: {details}")]
    Initialization { path: PathBuf, details: String },

    #[error("[UPI-2001] invalid input in {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("[UPI-2002] unknown {field} value {value:?}")]
    UnknownCategory { field: &'static str, value: String },

    #[error("[UPI-3001] inference failed in model {model}: {details}")]
    Inference { model: String, details: String },

    #[error("[UPI-4001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[UPI-4002] CSV failure: {0}")]
    Csv(#[from] csv::Error),
}

impl DetectorError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Initialization { .. } => "UPI-1001",
            Self::InvalidInput { .. } => "UPI-2001",
            Self::UnknownCategory { .. } => "UPI-2002",
            Self::Inference { .. } => "UPI-3001",
            Self::Io { .. } => "UPI-4001",
            Self::Csv(_) => "UPI-4002",
        }
    }

    /// Shorthand for an [`DetectorError::InvalidInput`].
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an [`DetectorError::Inference`].
    pub fn inference(model: impl Into<String>, details: impl ToString) -> Self {
        Self::Inference {
            model: model.into(),
            details: details.to_string(),
        }
    }

    /// Whether the error was caused by the caller's data rather than the model
    /// or the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::UnknownCategory { .. }
        )
    }

    /// Name of the offending field, when the error points at one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { field, .. } => Some(field.as_str()),
            Self::UnknownCategory { field, .. } => Some(*field),
            _ => None,
        }
    }
}
