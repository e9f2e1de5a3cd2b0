use thiserror::Error;

use crate::logging::LoggingError;

/// Errors that can stop the display from starting
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identity error: {0}")]
    Identity(#[from] xmds_api::ApiError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Push channel error: {0}")]
    Push(#[from] push_channel::PushError),

    #[error("Sync error: {0}")]
    Sync(#[from] display_sync::SyncError),
}

pub type Result<T> = std::result::Result<T, DisplayError>;
