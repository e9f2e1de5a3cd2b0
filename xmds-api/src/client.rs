use soap_client::SoapClient;

use crate::operations::{
    GetFileOperation, GetFileRequest, GetResourceOperation, GetResourceRequest, MediaInventory,
    MediaInventoryOperation, RegisterDisplayOperation, RegisterDisplayRequest,
    RegisterDisplayResponse, RequiredFiles, RequiredFilesOperation, Schedule, ScheduleOperation,
    StatsBatch, SubmitStatsOperation,
};
use crate::{DisplayIdentity, RemoteService, Result, XmdsOperation};

/// XML namespace of the XMDS service
pub const XMDS_NAMESPACE: &str = "urn:xmds";

/// Protocol version requested from the CMS
pub const DEFAULT_XMDS_VERSION: u32 = 5;

/// A client for executing XMDS operations against a CMS
///
/// Bridges the stateless operation definitions and the SOAP transport. Every
/// call is authenticated with the display's server and hardware keys.
///
/// ```rust,no_run
/// use xmds_api::{DisplayIdentity, RemoteService, XmdsClient};
///
/// let identity = DisplayIdentity::from_mac("aa:bb:cc:dd:ee:ff", "server-key");
/// let client = XmdsClient::new("http://cms.example.com", identity);
/// let schedule = client.schedule()?;
/// # Ok::<(), xmds_api::ApiError>(())
/// ```
#[derive(Debug, Clone)]
pub struct XmdsClient {
    soap_client: SoapClient,
    base_url: String,
    endpoint: String,
    identity: DisplayIdentity,
}

impl XmdsClient {
    /// Create a client for the CMS at `base_url`
    pub fn new(base_url: &str, identity: DisplayIdentity) -> Self {
        Self::with_soap_client(base_url, identity, SoapClient::new())
    }

    /// Create a client with a custom SOAP client (timeouts, tests)
    pub fn with_soap_client(base_url: &str, identity: DisplayIdentity, soap_client: SoapClient) -> Self {
        Self {
            soap_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoint: endpoint_url(base_url, DEFAULT_XMDS_VERSION),
            identity,
        }
    }

    /// Request a different protocol version
    pub fn with_version(mut self, version: u32) -> Self {
        self.endpoint = endpoint_url(&self.base_url, version);
        self
    }

    pub fn identity(&self) -> &DisplayIdentity {
        &self.identity
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute an XMDS operation
    pub fn execute<Op: XmdsOperation>(&self, request: &Op::Request) -> Result<Op::Response> {
        let mut params = vec![
            ("serverKey", self.identity.server_key.clone()),
            ("hardwareKey", self.identity.hardware_key.clone()),
        ];
        params.extend(Op::build_params(request));

        let xml = self
            .soap_client
            .call(&self.endpoint, XMDS_NAMESPACE, Op::ACTION, &params)?;

        Op::parse_response(&xml)
    }
}

fn endpoint_url(base_url: &str, version: u32) -> String {
    format!("{}/xmds.php?v={}", base_url.trim_end_matches('/'), version)
}

impl RemoteService for XmdsClient {
    fn register_display(&self, request: &RegisterDisplayRequest) -> Result<RegisterDisplayResponse> {
        self.execute::<RegisterDisplayOperation>(request)
    }

    fn required_files(&self) -> Result<RequiredFiles> {
        self.execute::<RequiredFilesOperation>(&())
    }

    fn schedule(&self) -> Result<Schedule> {
        self.execute::<ScheduleOperation>(&())
    }

    fn get_file(&self, request: &GetFileRequest) -> Result<Vec<u8>> {
        self.execute::<GetFileOperation>(request)
    }

    fn get_resource(&self, request: &GetResourceRequest) -> Result<String> {
        self.execute::<GetResourceOperation>(request)
    }

    fn submit_stats(&self, batch: &StatsBatch) -> Result<bool> {
        let xml = batch.to_xml()?;
        self.execute::<SubmitStatsOperation>(&xml)
    }

    fn media_inventory(&self, inventory: &MediaInventory) -> Result<bool> {
        let xml = inventory.to_xml()?;
        self.execute::<MediaInventoryOperation>(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(endpoint_url("http://cms/", 5), "http://cms/xmds.php?v=5");
        assert_eq!(endpoint_url("http://cms", 4), "http://cms/xmds.php?v=4");
    }

    #[test]
    fn test_with_version() {
        let identity = DisplayIdentity::from_mac("aa:bb:cc:dd:ee:ff", "k");
        let client = XmdsClient::new("http://cms/", identity).with_version(4);
        assert_eq!(client.endpoint(), "http://cms/xmds.php?v=4");
        assert_eq!(client.with_version(5).endpoint(), "http://cms/xmds.php?v=5");
    }
}
