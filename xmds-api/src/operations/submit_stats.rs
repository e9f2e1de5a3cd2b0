//! SubmitStats operation: proof-of-play records

use serde::Serialize;
use xmltree::Element;

use crate::operation::parse_success;
use crate::{ApiError, XmdsOperation};

/// SubmitStats operation
pub struct SubmitStatsOperation;

/// One `<stat>` record, times already rendered in the CMS format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRecord {
    #[serde(rename = "@type")]
    pub kind: String,
    #[serde(rename = "@fromdt")]
    pub from: String,
    #[serde(rename = "@todt")]
    pub to: String,
    #[serde(rename = "@scheduleid")]
    pub schedule_id: String,
    #[serde(rename = "@layoutid")]
    pub layout_id: String,
    #[serde(rename = "@mediaid")]
    pub media_id: String,
}

/// A `<stats>` batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename = "stats")]
pub struct StatsBatch {
    #[serde(rename = "stat")]
    pub records: Vec<StatRecord>,
}

impl StatsBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Render the batch document sent as `statXml`
    pub fn to_xml(&self) -> Result<String, ApiError> {
        let body = quick_xml::se::to_string(self)
            .map_err(|e| ApiError::ParseError(format!("failed to serialize stats: {}", e)))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n{}", body))
    }
}

impl XmdsOperation for SubmitStatsOperation {
    /// Pre-rendered `statXml` document
    type Request = String;
    type Response = bool;

    const ACTION: &'static str = "SubmitStats";

    fn build_params(request: &Self::Request) -> Vec<(&'static str, String)> {
        vec![("statXml", request.clone())]
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(parse_success(&soap_client::response_text(xml)))
    }
}
