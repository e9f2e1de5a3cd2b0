use std::path::PathBuf;

use thiserror::Error;
use xmds_api::ApiError;

/// Errors raised while synchronizing content with the CMS
///
/// None of these stop the sync loop; they are logged and the affected step
/// is retried on the next cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The CMS could not be reached or refused the call
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Reading or writing the save directory failed
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A downloaded file does not match its declared digest
    #[error("Digest mismatch for {}: expected {expected}, got {actual}", path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// A stop was requested while the operation was in progress
    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Storage {
            path: path.into(),
            source,
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::ParseError(msg) | ApiError::InvalidResponse(msg) => SyncError::Parse(msg),
            other => SyncError::Transport(other.to_string()),
        }
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
