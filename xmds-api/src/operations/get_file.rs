//! GetFile operation: one chunk of a media or layout file

use base64::Engine;
use xmltree::Element;

use crate::{ApiError, EntryKind, XmdsOperation};

/// GetFile operation
pub struct GetFileOperation;

/// Request for one chunk
#[derive(Debug, Clone)]
pub struct GetFileRequest {
    pub file_id: String,
    pub file_type: EntryKind,
    pub chunk_offset: u64,
    pub chunk_size: u64,
}

impl XmdsOperation for GetFileOperation {
    type Request = GetFileRequest;
    type Response = Vec<u8>;

    const ACTION: &'static str = "GetFile";

    fn build_params(request: &Self::Request) -> Vec<(&'static str, String)> {
        vec![
            ("fileId", request.file_id.clone()),
            ("fileType", request.file_type.to_string()),
            ("chunkOffset", request.chunk_offset.to_string()),
            // the service WSDL really spells it this way
            ("chuckSize", request.chunk_size.to_string()),
        ]
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        decode_chunk(&soap_client::response_text(xml))
    }
}

/// Decode a base64 chunk, tolerating line-wrapped payloads
pub fn decode_chunk(text: &str) -> Result<Vec<u8>, ApiError> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(ApiError::InvalidResponse("empty file chunk".to_string()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ApiError::ParseError(format!("invalid base64 chunk: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_chunk() {
        assert_eq!(decode_chunk("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_chunk("aGVs\nbG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_chunk_rejects_empty_and_garbage() {
        assert!(matches!(decode_chunk(""), Err(ApiError::InvalidResponse(_))));
        assert!(matches!(decode_chunk("!!!"), Err(ApiError::ParseError(_))));
    }

    #[test]
    fn test_build_params() {
        let params = GetFileOperation::build_params(&GetFileRequest {
            file_id: "5".to_string(),
            file_type: EntryKind::Media,
            chunk_offset: 2097152,
            chunk_size: 1024,
        });
        assert_eq!(
            params,
            vec![
                ("fileId", "5".to_string()),
                ("fileType", "media".to_string()),
                ("chunkOffset", "2097152".to_string()),
                ("chuckSize", "1024".to_string()),
            ]
        );
    }
}
