//! Private SOAP client for XMDS communication
//!
//! This crate provides a minimal blocking SOAP client specifically designed
//! for talking to the Xibo display service (XMDS). Requests are rpc-style:
//! every parameter is a flat child element of the action element, and every
//! response carries its payload as the text of a single child element.

mod error;

pub use error::SoapError;

use std::time::Duration;
use xmltree::Element;

/// Default connect timeout for the shared agent
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default read timeout; large enough for a 2 MiB base64 chunk on a slow link
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A minimal SOAP client for XMDS communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    /// Create a new SOAP client with default configuration
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Create a SOAP client with explicit connect/read timeouts
    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
        }
    }

    /// Send a SOAP request and return the parsed response element
    ///
    /// # Arguments
    /// * `endpoint_url` - Full service URL, e.g. `http://cms/xmds.php?v=5`
    /// * `namespace` - Service namespace, e.g. `urn:xmds`
    /// * `action` - Action name, e.g. `RegisterDisplay`
    /// * `params` - Ordered `(name, value)` pairs; values are escaped here
    pub fn call(
        &self,
        endpoint_url: &str,
        namespace: &str,
        action: &str,
        params: &[(&str, String)],
    ) -> Result<Element, SoapError> {
        let body = build_envelope(namespace, action, params);
        let soap_action = format!("\"{}#{}\"", namespace, action);

        tracing::trace!(action, url = endpoint_url, "sending SOAP request");

        let xml_text = match self
            .agent
            .post(endpoint_url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPAction", &soap_action)
            .send_string(&body)
        {
            Ok(response) => response
                .into_string()
                .map_err(|e| SoapError::Network(e.to_string()))?,
            // Faults travel with HTTP 500; keep the body so the fault can be decoded
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                if text.trim().is_empty() {
                    return Err(SoapError::Network(format!("HTTP {}", code)));
                }
                text
            }
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml = Element::parse(xml_text.as_bytes())
            .map_err(|e| SoapError::Parse(e.to_string()))?;

        self.extract_response(&xml, action)
    }

    fn extract_response(&self, xml: &Element, action: &str) -> Result<Element, SoapError> {
        let body = xml
            .get_child("Body")
            .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

        // Check for SOAP fault first
        if let Some(fault) = body.get_child("Fault") {
            let code = fault
                .get_child("faultcode")
                .and_then(|c| c.get_text())
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| "Server".to_string());
            let message = fault
                .get_child("faultstring")
                .and_then(|c| c.get_text())
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            return Err(SoapError::Fault { code, message });
        }

        let response_name = format!("{}Response", action);
        body.get_child(response_name.as_str())
            .cloned()
            .ok_or_else(|| SoapError::Parse(format!("Missing {} element", response_name)))
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Text payload of an rpc-style response element.
///
/// XMDS wraps every return value in one child element (`ActivationMessage`,
/// `RequiredFilesXml`, `file`, `success`, ...). Returns an empty string when
/// the element has no text.
pub fn response_text(response: &Element) -> String {
    response
        .children
        .iter()
        .find_map(|node| node.as_element())
        .and_then(|child| child.get_text())
        .map(|text| text.into_owned())
        .unwrap_or_default()
}

/// Escape the five XML special characters
pub fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn build_envelope(namespace: &str, action: &str, params: &[(&str, String)]) -> String {
    let payload: String = params
        .iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape_xml(value)))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:tns="{namespace}">
    <soap:Body>
        <tns:{action}>{payload}</tns:{action}>
    </soap:Body>
</soap:Envelope>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_soap_client_creation() {
        let _client = SoapClient::new();
        let _default_client = SoapClient::default();
        let _custom = SoapClient::with_timeouts(Duration::from_secs(1), Duration::from_secs(2));
    }

    #[test]
    fn test_extract_response_with_valid_response() {
        let client = SoapClient::new();

        let xml_str = r#"
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ns1="urn:xmds">
                <SOAP-ENV:Body>
                    <ns1:ScheduleResponse>
                        <ScheduleXml>&lt;schedule/&gt;</ScheduleXml>
                    </ns1:ScheduleResponse>
                </SOAP-ENV:Body>
            </SOAP-ENV:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        let response = client.extract_response(&xml, "Schedule").unwrap();

        assert_eq!(response.name, "ScheduleResponse");
        assert_eq!(response_text(&response), "<schedule/>");
    }

    #[test]
    fn test_extract_response_with_soap_fault() {
        let client = SoapClient::new();

        let xml_str = r#"
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
                <SOAP-ENV:Body>
                    <SOAP-ENV:Fault>
                        <faultcode>Sender</faultcode>
                        <faultstring>Server key incorrect</faultstring>
                    </SOAP-ENV:Fault>
                </SOAP-ENV:Body>
            </SOAP-ENV:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match client.extract_response(&xml, "RegisterDisplay").unwrap_err() {
            SoapError::Fault { code, message } => {
                assert_eq!(code, "Sender");
                assert_eq!(message, "Server key incorrect");
            }
            other => panic!("Expected SoapError::Fault, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_response_missing_body() {
        let client = SoapClient::new();

        let xml_str = r#"
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
            </SOAP-ENV:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match client.extract_response(&xml, "Schedule").unwrap_err() {
            SoapError::Parse(msg) => assert!(msg.contains("Missing SOAP Body")),
            _ => panic!("Expected SoapError::Parse"),
        }
    }

    #[test]
    fn test_extract_response_missing_action_response() {
        let client = SoapClient::new();

        let xml_str = r#"
            <SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
                <SOAP-ENV:Body>
                </SOAP-ENV:Body>
            </SOAP-ENV:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match client.extract_response(&xml, "GetFile").unwrap_err() {
            SoapError::Parse(msg) => assert!(msg.contains("Missing GetFileResponse element")),
            _ => panic!("Expected SoapError::Parse"),
        }
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("a&b", "a&amp;b")]
    #[case("<stats/>", "&lt;stats/&gt;")]
    #[case("say \"hi\"", "say &quot;hi&quot;")]
    fn test_escape_xml(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(escape_xml(input), expected);
    }

    #[test]
    fn test_envelope_contains_escaped_params() {
        let body = build_envelope(
            "urn:xmds",
            "SubmitStats",
            &[("serverKey", "k".to_string()), ("statXml", "<stats/>".to_string())],
        );
        assert!(body.contains("<tns:SubmitStats>"));
        assert!(body.contains("<serverKey>k</serverKey>"));
        assert!(body.contains("<statXml>&lt;stats/&gt;</statXml>"));
        assert!(Element::parse(body.as_bytes()).is_ok());
    }

    #[test]
    fn test_call_against_mock_server() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/xmds.php")
            .match_query(mockito::Matcher::Any)
            .match_header("SOAPAction", "\"urn:xmds#Schedule\"")
            .with_status(200)
            .with_body(
                r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
                    <SOAP-ENV:Body><ns1:ScheduleResponse xmlns:ns1="urn:xmds"><ScheduleXml>ok</ScheduleXml></ns1:ScheduleResponse></SOAP-ENV:Body>
                </SOAP-ENV:Envelope>"#,
            )
            .create();

        let client = SoapClient::new();
        let url = format!("{}/xmds.php?v=5", server.url());
        let response = client.call(&url, "urn:xmds", "Schedule", &[]).unwrap();

        assert_eq!(response_text(&response), "ok");
        mock.assert();
    }

    #[test]
    fn test_call_decodes_fault_on_http_500() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/xmds.php")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body(
                r#"<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
                    <SOAP-ENV:Body><SOAP-ENV:Fault><faultcode>Sender</faultcode><faultstring>This display is not licensed.</faultstring></SOAP-ENV:Fault></SOAP-ENV:Body>
                </SOAP-ENV:Envelope>"#,
            )
            .create();

        let client = SoapClient::new();
        let url = format!("{}/xmds.php?v=5", server.url());
        let err = client.call(&url, "urn:xmds", "RequiredFiles", &[]).unwrap_err();

        assert!(matches!(err, SoapError::Fault { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_call_unreachable_is_network_error() {
        let client = SoapClient::with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
        let err = client
            .call("http://127.0.0.1:1/xmds.php?v=5", "urn:xmds", "Schedule", &[])
            .unwrap_err();
        assert!(matches!(err, SoapError::Network(_)));
        assert!(err.is_transient());
    }
}
