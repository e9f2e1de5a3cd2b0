//! MediaInventory operation: report which required files are complete

use serde::Serialize;
use xmltree::Element;

use crate::operation::parse_success;
use crate::{ApiError, XmdsOperation};

/// MediaInventory operation
pub struct MediaInventoryOperation;

/// Status of one required file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem {
    #[serde(rename = "@id")]
    pub id: String,
    /// `1` when the local copy matches, `0` otherwise
    #[serde(rename = "@complete")]
    pub complete: u8,
    #[serde(rename = "@md5")]
    pub md5: String,
    /// Epoch seconds of the check
    #[serde(rename = "@lastChecked")]
    pub last_checked: i64,
}

/// A `<files>` inventory document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename = "files")]
pub struct MediaInventory {
    #[serde(rename = "file")]
    pub items: Vec<InventoryItem>,
}

impl MediaInventory {
    pub fn to_xml(&self) -> Result<String, ApiError> {
        let body = quick_xml::se::to_string(self)
            .map_err(|e| ApiError::ParseError(format!("failed to serialize inventory: {}", e)))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n{}", body))
    }

    pub fn complete_count(&self) -> usize {
        self.items.iter().filter(|i| i.complete == 1).count()
    }
}

impl XmdsOperation for MediaInventoryOperation {
    type Request = String;
    type Response = bool;

    const ACTION: &'static str = "MediaInventory";

    fn build_params(request: &Self::Request) -> Vec<(&'static str, String)> {
        vec![("mediaInventory", request.clone())]
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Ok(parse_success(&soap_client::response_text(xml)))
    }
}
