use xmltree::Element;

use crate::error::ApiError;

/// Base trait for all XMDS operations
///
/// Every XMDS call is authenticated by the server key and the display's
/// hardware key; the client prepends those two parameters, so
/// [`XmdsOperation::build_params`] only returns the action-specific ones.
pub trait XmdsOperation {
    /// The request type for this operation
    type Request;

    /// The response type for this operation
    type Response;

    /// The SOAP action name for this operation
    const ACTION: &'static str;

    /// Build the ordered action parameters (without the key pair)
    fn build_params(request: &Self::Request) -> Vec<(&'static str, String)>;

    /// Parse the `{Action}Response` element into the typed response
    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError>;
}

/// Interpret an XMDS boolean `success` payload
pub(crate) fn parse_success(text: &str) -> bool {
    matches!(text.trim(), "true" | "1")
}
