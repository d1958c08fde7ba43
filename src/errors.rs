//! Error type shared by the CLI library modules.

use std::path::PathBuf;

use pagedefer_core_types::DeferError;
use pagedefer_policy_center::PolicyError;
use pagedefer_render::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read manifest {}: {source}", path.display())]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {}: {message}", path.display())]
    ManifestInvalid { path: PathBuf, message: String },
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl CliError {
    pub fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<CliError> for DeferError {
    fn from(value: CliError) -> Self {
        DeferError::new(value.to_string())
    }
}
