use soap_client::SoapError;
use thiserror::Error;

/// High-level API errors for XMDS operations
///
/// This enum abstracts the underlying SOAP transport and gives the sync loop
/// enough information to decide between "retry next cycle" and "fall back to
/// the cached snapshot".
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network communication error
    ///
    /// Connection refused, DNS failure, timeouts and non-SOAP HTTP errors.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response parsing error
    ///
    /// The envelope or the embedded document (manifest, schedule, ...) could
    /// not be parsed into the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// SOAP fault returned by the CMS
    #[error("SOAP fault {code}: {message}")]
    SoapFault { code: String, message: String },

    /// The response parsed but its content is unusable (wrong root element,
    /// empty payload where one is required)
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Display identity could not be established
    #[error("Identity error: {0}")]
    Identity(String),
}

impl ApiError {
    /// Whether the failure is worth retrying on the next poll cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<SoapError> for ApiError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Network(msg) => ApiError::NetworkError(msg),
            SoapError::Parse(msg) => ApiError::ParseError(msg),
            SoapError::Fault { code, message } => ApiError::SoapFault { code, message },
        }
    }
}

impl From<xmltree::ParseError> for ApiError {
    fn from(error: xmltree::ParseError) -> Self {
        ApiError::ParseError(error.to_string())
    }
}

impl From<quick_xml::DeError> for ApiError {
    fn from(error: quick_xml::DeError) -> Self {
        ApiError::ParseError(error.to_string())
    }
}
