//! GetResource operation: server-rendered widget HTML

use xmltree::Element;

use crate::{ApiError, XmdsOperation};

/// GetResource operation
pub struct GetResourceOperation;

/// Request for GetResource
#[derive(Debug, Clone)]
pub struct GetResourceRequest {
    pub layout_id: String,
    pub region_id: String,
    pub media_id: String,
}

impl XmdsOperation for GetResourceOperation {
    type Request = GetResourceRequest;
    type Response = String;

    const ACTION: &'static str = "GetResource";

    fn build_params(request: &Self::Request) -> Vec<(&'static str, String)> {
        vec![
            ("layoutId", request.layout_id.clone()),
            ("regionId", request.region_id.clone()),
            ("mediaId", request.media_id.clone()),
        ]
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        let text = soap_client::response_text(xml);
        if text.is_empty() {
            return Err(ApiError::InvalidResponse("empty resource".to_string()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource() {
        let xml = Element::parse(
            r#"<GetResourceResponse><resource>&lt;html&gt;hi&lt;/html&gt;</resource></GetResourceResponse>"#
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(GetResourceOperation::parse_response(&xml).unwrap(), "<html>hi</html>");
    }

    #[test]
    fn test_empty_resource_is_error() {
        let xml = Element::parse(b"<GetResourceResponse><resource/></GetResourceResponse>".as_slice())
            .unwrap();
        assert!(GetResourceOperation::parse_response(&xml).is_err());
    }
}
