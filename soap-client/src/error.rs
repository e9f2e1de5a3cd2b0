//! Error types for the SOAP client

use thiserror::Error;

/// Errors that can occur during SOAP communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// Network or HTTP communication error
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// SOAP fault returned by the server
    #[error("SOAP fault {code}: {message}")]
    Fault {
        /// `faultcode` of the fault, e.g. `Sender` or `SOAP-ENV:Server`
        code: String,
        /// Human readable `faultstring`
        message: String,
    },
}

impl SoapError {
    /// Whether retrying the same call later can succeed.
    ///
    /// Faults are answers from the service (bad key, unknown display) and will
    /// repeat until configuration changes; everything else is transient.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SoapError::Fault { .. })
    }
}
