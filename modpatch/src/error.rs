//! Error types for patch state and export operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::retry::RetryError;

/// Result type for patch operations.
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors that can occur while persisting or exporting a patch.
#[derive(Debug, Error)]
pub enum PatchError {
    /// A required argument was missing or malformed. Raised before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A file operation kept failing after every retry.
    #[error("I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: RetryError<io::Error>,
    },

    /// The patch state could not be serialized.
    #[error("failed to serialize patch state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No definition info provider handles the requested game.
    #[error("no definition info provider for game '{game}'")]
    NoInfoProvider { game: String },

    /// A background task could not be joined.
    #[error("background task failed: {0}")]
    Task(String),
}

impl PatchError {
    /// Wrap an exhausted retry for `path`.
    pub fn io(path: impl Into<PathBuf>, source: RetryError<io::Error>) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shorthand for an invalid-argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether this error was raised by argument validation.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = PatchError::invalid("patch name is required");
        assert_eq!(err.to_string(), "invalid argument: patch name is required");
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_io_error_display_includes_path_and_cause() {
        let source = RetryError {
            errors: vec![io::Error::new(io::ErrorKind::PermissionDenied, "locked")],
        };
        let err = PatchError::io("/tmp/patch/state.json", source);
        let message = err.to_string();
        assert!(message.contains("state.json"));
        assert!(message.contains("locked"));
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn test_serialize_error_from() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: PatchError = json_err.into();
        assert!(matches!(err, PatchError::Serialize(_)));
    }
}
