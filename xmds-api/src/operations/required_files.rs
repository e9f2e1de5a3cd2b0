//! RequiredFiles operation and the manifest model

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use xmltree::Element;

use crate::digest::md5_hex;
use crate::{ApiError, XmdsOperation};

/// RequiredFiles operation
pub struct RequiredFilesOperation;

/// Kind of a manifest entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Library media, fetched with GetFile and verified by md5
    Media,
    /// Layout (XLF), fetched with GetFile and verified by md5
    Layout,
    /// Server-rendered widget HTML, fetched with GetResource
    Resource,
    /// Anything else the CMS lists (fonts, blacklist markers, ...)
    Unknown(String),
}

impl EntryKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "media" => EntryKind::Media,
            "layout" => EntryKind::Layout,
            "resource" => EntryKind::Resource,
            other => EntryKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntryKind::Media => "media",
            EntryKind::Layout => "layout",
            EntryKind::Resource => "resource",
            EntryKind::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file the display is required to hold locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: EntryKind,
    pub id: String,
    pub size: u64,
    /// Expected md5 hex; empty when the CMS does not declare one
    pub digest: String,
    pub download: String,
    pub path: String,
    pub layout_id: String,
    pub region_id: String,
    pub media_id: String,
}

impl ManifestEntry {
    pub fn has_digest(&self) -> bool {
        !self.digest.trim().is_empty()
    }
}

/// Parsed RequiredFiles document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequiredFiles {
    pub files: Vec<ManifestEntry>,
    /// Normalized document text; this is what gets digested and persisted
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct FilesXml {
    #[serde(rename = "file", default)]
    files: Vec<FileXml>,
}

#[derive(Debug, Deserialize)]
struct FileXml {
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@size", default)]
    size: String,
    #[serde(rename = "@md5", default)]
    md5: String,
    #[serde(rename = "@download", default)]
    download: String,
    #[serde(rename = "@path", default)]
    path: String,
    #[serde(rename = "@layoutid", default)]
    layout_id: String,
    #[serde(rename = "@regionid", default)]
    region_id: String,
    #[serde(rename = "@mediaid", default)]
    media_id: String,
}

impl From<FileXml> for ManifestEntry {
    fn from(file: FileXml) -> Self {
        let size = file
            .size
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(|s| s as u64)
            .unwrap_or(0);

        Self {
            kind: EntryKind::parse(&file.kind),
            id: file.id,
            size,
            digest: file.md5,
            download: file.download,
            path: file.path,
            layout_id: file.layout_id,
            region_id: file.region_id,
            media_id: file.media_id,
        }
    }
}

fn resource_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(type="resource")\s+id="[^"]*""#).expect("static pattern is valid")
    })
}

/// Drop the `id` attribute of resource entries.
///
/// The CMS regenerates that id on every request even when nothing changed,
/// which would otherwise make every manifest look new.
pub fn normalize_manifest(text: &str) -> String {
    resource_id_pattern().replace_all(text, "$1").into_owned()
}

impl RequiredFiles {
    /// Parse a RequiredFiles document
    pub fn parse(text: &str) -> Result<Self, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::InvalidResponse("empty RequiredFiles document".to_string()));
        }

        let content = normalize_manifest(text);
        let trimmed = strip_declaration(&content);
        if !trimmed.starts_with("<files") {
            return Err(ApiError::InvalidResponse("expected <files> root".to_string()));
        }

        let parsed: FilesXml = quick_xml::de::from_str(&content)?;
        Ok(Self {
            files: parsed.files.into_iter().map(ManifestEntry::from).collect(),
            content,
        })
    }

    /// Digest of the normalized document
    pub fn content_digest(&self) -> String {
        md5_hex(self.content.as_bytes())
    }
}

fn strip_declaration(text: &str) -> &str {
    let text = text.trim_start();
    match text.strip_prefix("<?xml") {
        Some(rest) => rest.find("?>").map(|i| rest[i + 2..].trim_start()).unwrap_or(""),
        None => text,
    }
}

impl XmdsOperation for RequiredFilesOperation {
    type Request = ();
    type Response = RequiredFiles;

    const ACTION: &'static str = "RequiredFiles";

    fn build_params(_request: &Self::Request) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        RequiredFiles::parse(&soap_client::response_text(xml))
    }
}
