//! Error types for display-player

use thiserror::Error;

/// Result type for display-player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors that can occur during playback
///
/// None of these escape the sequencer: a broken layout leaves the screen
/// empty until the next selection, and a failing media unit is finished and
/// skipped.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// The layout file is missing or malformed
    #[error("Layout error: {0}")]
    Layout(String),

    /// The external player could not be started or controlled
    #[error("Process error: {0}")]
    Process(String),

    /// The renderer refused a request
    #[error("Render error: {0}")]
    Render(String),
}

impl From<xmltree::ParseError> for PlayerError {
    fn from(error: xmltree::ParseError) -> Self {
        PlayerError::Layout(error.to_string())
    }
}

impl From<std::io::Error> for PlayerError {
    fn from(error: std::io::Error) -> Self {
        PlayerError::Process(error.to_string())
    }
}
