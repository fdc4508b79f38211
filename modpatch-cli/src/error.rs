//! CLI error type.

use std::process::ExitCode;

use modpatch::config::ConfigError;
use modpatch::PatchError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("failed to initialize logging: {0}")]
    Logging(std::io::Error),

    #[error("failed to render state: {0}")]
    Render(#[from] serde_json::Error),

    #[error("patch '{0}' not found")]
    PatchNotFound(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) => ExitCode::from(2),
            CliError::PatchNotFound(_) => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}
