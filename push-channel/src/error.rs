use thiserror::Error;

/// Errors raised by the push channel
///
/// None of these are fatal to the display: a message that fails to decode is
/// logged and dropped, and a broken transport is reconnected.
#[derive(Debug, Error)]
pub enum PushError {
    /// The sealed payload or its envelope key could not be opened
    #[error("Decrypt error: {0}")]
    Decrypt(String),

    /// A frame did not have the expected shape
    #[error("Format error: {0}")]
    Format(String),

    /// The publish/subscribe connection failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Key generation or export failed
    #[error("Key error: {0}")]
    Key(String),
}

impl From<std::io::Error> for PushError {
    fn from(error: std::io::Error) -> Self {
        PushError::Transport(error.to_string())
    }
}

impl From<base64::DecodeError> for PushError {
    fn from(error: base64::DecodeError) -> Self {
        PushError::Format(format!("invalid base64: {}", error))
    }
}

/// Type alias for results that can return a PushError
pub type Result<T> = std::result::Result<T, PushError>;
