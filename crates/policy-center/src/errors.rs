use std::path::PathBuf;

use pagedefer_core_types::DeferError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    /// A layer (file, env JSON) could not be parsed at all.
    #[error("malformed policy in {origin}: {message}")]
    Malformed { origin: String, message: String },
    #[error("unsupported policy path: {0}")]
    UnsupportedPath(String),
    #[error("invalid value for {path}: {message}")]
    InvalidValue { path: String, message: String },
}

impl PolicyError {
    pub(crate) fn malformed(origin: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Malformed {
            origin: origin.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_value(path: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl From<PolicyError> for DeferError {
    fn from(value: PolicyError) -> Self {
        DeferError::new(value.to_string())
    }
}
