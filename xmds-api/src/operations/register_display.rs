//! RegisterDisplay operation

use std::collections::HashMap;
use std::time::Duration;

use xmltree::Element;

use crate::{ApiError, XmdsOperation};

/// RegisterDisplay operation
pub struct RegisterDisplayOperation;

/// Request for RegisterDisplay
#[derive(Debug, Clone)]
pub struct RegisterDisplayRequest {
    pub display_name: String,
    pub client_type: String,
    pub client_version: String,
    pub client_code: u32,
    pub operating_system: String,
    pub mac_address: String,
    /// Push channel name, empty when the push channel is disabled
    pub xmr_channel: String,
    /// PEM public key for the push channel, empty when disabled
    pub xmr_pub_key: String,
}

impl Default for RegisterDisplayRequest {
    fn default() -> Self {
        Self {
            display_name: "xiboside".to_string(),
            client_type: "android".to_string(),
            client_version: "1.0".to_string(),
            client_code: 1,
            operating_system: "Linux".to_string(),
            mac_address: String::new(),
            xmr_channel: String::new(),
            xmr_pub_key: String::new(),
        }
    }
}

/// Parsed `<display>` activation message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterDisplayResponse {
    pub status: String,
    pub code: String,
    pub message: String,
    pub version_instructions: String,
    /// Text-bearing child elements, e.g. `collectInterval`, `screenShotRequested`
    pub details: HashMap<String, String>,
}

impl RegisterDisplayResponse {
    /// Code the CMS uses for an authorised display
    pub const READY: &'static str = "READY";

    /// Parse the activation message document
    pub fn parse(text: &str) -> Result<Self, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::InvalidResponse("empty activation message".to_string()));
        }

        let root = Element::parse(text.as_bytes())?;
        if root.name != "display" {
            return Err(ApiError::InvalidResponse(format!(
                "expected <display>, found <{}>",
                root.name
            )));
        }

        let attr = |name: &str| root.attributes.get(name).cloned().unwrap_or_default();
        let details = root
            .children
            .iter()
            .filter_map(|node| node.as_element())
            .filter_map(|child| {
                let text = child.get_text()?;
                Some((child.name.clone(), text.trim().to_string()))
            })
            .collect();

        Ok(Self {
            status: attr("status"),
            code: attr("code"),
            message: attr("message"),
            version_instructions: attr("version_instructions"),
            details,
        })
    }

    /// Whether the CMS accepted the display
    pub fn is_ready(&self) -> bool {
        self.code == Self::READY
    }

    /// Poll interval requested by the CMS, if present and sane
    pub fn collect_interval(&self) -> Option<Duration> {
        let raw = self.details.get("collectInterval")?;
        let secs = raw.trim().parse::<f64>().ok()?;
        (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
    }
}

impl XmdsOperation for RegisterDisplayOperation {
    type Request = RegisterDisplayRequest;
    type Response = RegisterDisplayResponse;

    const ACTION: &'static str = "RegisterDisplay";

    fn build_params(request: &Self::Request) -> Vec<(&'static str, String)> {
        vec![
            ("displayName", request.display_name.clone()),
            ("clientType", request.client_type.clone()),
            ("clientVersion", request.client_version.clone()),
            ("clientCode", request.client_code.to_string()),
            ("operatingSystem", request.operating_system.clone()),
            ("macAddress", request.mac_address.clone()),
            ("xmrChannel", request.xmr_channel.clone()),
            ("xmrPubKey", request.xmr_pub_key.clone()),
        ]
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        RegisterDisplayResponse::parse(&soap_client::response_text(xml))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READY_XML: &str = r#"<?xml version="1.0"?>
<display status="0" code="READY" message="Display is active and ready to start." version_instructions="">
    <collectInterval>60</collectInterval>
    <screenShotRequested>0</screenShotRequested>
    <commands/>
</display>"#;

    #[test]
    fn test_parse_ready_display() {
        let response = RegisterDisplayResponse::parse(READY_XML).unwrap();
        assert!(response.is_ready());
        assert_eq!(response.status, "0");
        assert_eq!(response.collect_interval(), Some(Duration::from_secs(60)));
        assert_eq!(response.details.get("screenShotRequested").map(String::as_str), Some("0"));
        assert!(!response.details.contains_key("commands"));
    }

    #[test]
    fn test_parse_waiting_display() {
        let xml = r#"<display status="2" code="WAITING" message="Display is awaiting licensing"/>"#;
        let response = RegisterDisplayResponse::parse(xml).unwrap();
        assert!(!response.is_ready());
        assert_eq!(response.collect_interval(), None);
    }

    #[test]
    fn test_parse_wrong_root() {
        let result = RegisterDisplayResponse::parse("<files/>");
        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            RegisterDisplayResponse::parse("<display"),
            Err(ApiError::ParseError(_))
        ));
        assert!(RegisterDisplayResponse::parse("").is_err());
    }

    #[test]
    fn test_invalid_collect_interval_ignored() {
        let mut response = RegisterDisplayResponse::default();
        response.details.insert("collectInterval".to_string(), "soon".to_string());
        assert_eq!(response.collect_interval(), None);
        response.details.insert("collectInterval".to_string(), "0".to_string());
        assert_eq!(response.collect_interval(), None);
    }

    #[test]
    fn test_build_params_order() {
        let request = RegisterDisplayRequest {
            mac_address: "aa:bb:cc:dd:ee:ff".to_string(),
            ..Default::default()
        };
        let params = RegisterDisplayOperation::build_params(&request);
        let names: Vec<_> = params.iter().map(|(name, _)| *name).collect();
        assert_eq!(names[0], "displayName");
        assert_eq!(names[5], "macAddress");
        assert_eq!(params[5].1, "aa:bb:cc:dd:ee:ff");
        assert_eq!(names.last(), Some(&"xmrPubKey"));
    }
}
