//! Schedule operation and the schedule model

use xmltree::Element;

use crate::digest::md5_hex;
use crate::{ApiError, XmdsOperation};

/// Schedule operation
pub struct ScheduleOperation;

/// One scheduled layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Layout id (the CMS calls it `file`)
    pub layout_file: String,
    /// Start, in the CMS time format and time zone
    pub from: String,
    /// End, in the CMS time format and time zone
    pub to: String,
    pub schedule_id: String,
    /// Parsed for completeness; resolution is by list order
    pub priority: i32,
    pub dependents: Vec<String>,
}

/// Parsed Schedule document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    /// Layout played when nothing is scheduled for "now"
    pub default_layout: Option<String>,
    pub entries: Vec<ScheduleEntry>,
    /// Files every layout depends on
    pub dependants: Vec<String>,
    /// Raw document text; this is what gets digested and persisted
    pub content: String,
}

impl Schedule {
    /// Parse a Schedule document
    pub fn parse(text: &str) -> Result<Self, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::InvalidResponse("empty Schedule document".to_string()));
        }

        let root = Element::parse(text.as_bytes())?;
        if root.name != "schedule" {
            return Err(ApiError::InvalidResponse(format!(
                "expected <schedule>, found <{}>",
                root.name
            )));
        }

        let mut schedule = Schedule {
            content: text.to_string(),
            ..Default::default()
        };

        for child in root.children.iter().filter_map(|n| n.as_element()) {
            match child.name.as_str() {
                "layout" => schedule.entries.push(parse_entry(child)),
                "default" => {
                    schedule.default_layout = child
                        .attributes
                        .get("file")
                        .filter(|f| !f.is_empty())
                        .cloned();
                }
                "dependants" => {
                    schedule.dependants.extend(
                        child
                            .children
                            .iter()
                            .filter_map(|n| n.as_element())
                            .filter_map(|dep| dep.get_text())
                            .map(|t| t.trim().to_string()),
                    );
                }
                other => tracing::trace!(element = other, "ignoring schedule element"),
            }
        }

        Ok(schedule)
    }

    /// Digest of the document text
    pub fn content_digest(&self) -> String {
        md5_hex(self.content.as_bytes())
    }
}

fn parse_entry(node: &Element) -> ScheduleEntry {
    let attr = |name: &str| node.attributes.get(name).cloned().unwrap_or_default();
    ScheduleEntry {
        layout_file: attr("file"),
        from: attr("fromdt"),
        to: attr("todt"),
        schedule_id: attr("scheduleid"),
        priority: attr("priority").trim().parse().unwrap_or(0),
        dependents: attr("dependents")
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

impl XmdsOperation for ScheduleOperation {
    type Request = ();
    type Response = Schedule;

    const ACTION: &'static str = "Schedule";

    fn build_params(_request: &Self::Request) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn parse_response(xml: &Element) -> Result<Self::Response, ApiError> {
        Schedule::parse(&soap_client::response_text(xml))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEDULE: &str = r#"<?xml version="1.0"?>
<schedule>
    <default file="1"/>
    <layout file="7" fromdt="2024-01-01 08:00:00" todt="2024-01-01 18:00:00" scheduleid="31" priority="0" dependents="a.jpg,b.mp4"/>
    <layout file="8" fromdt="2024-01-01 09:00:00" todt="2024-01-01 10:00:00" scheduleid="32" priority="1"/>
    <dependants><file>logo.png</file><file>font.ttf</file></dependants>
</schedule>"#;

    #[test]
    fn test_parse_schedule() {
        let schedule = Schedule::parse(SCHEDULE).unwrap();
        assert_eq!(schedule.default_layout.as_deref(), Some("1"));
        assert_eq!(schedule.entries.len(), 2);

        let first = &schedule.entries[0];
        assert_eq!(first.layout_file, "7");
        assert_eq!(first.from, "2024-01-01 08:00:00");
        assert_eq!(first.schedule_id, "31");
        assert_eq!(first.dependents, vec!["a.jpg", "b.mp4"]);

        assert_eq!(schedule.entries[1].priority, 1);
        assert_eq!(schedule.dependants, vec!["logo.png", "font.ttf"]);
    }

    #[test]
    fn test_entries_keep_document_order() {
        let schedule = Schedule::parse(SCHEDULE).unwrap();
        let files: Vec<_> = schedule.entries.iter().map(|e| e.layout_file.as_str()).collect();
        assert_eq!(files, vec!["7", "8"]);
    }

    #[test]
    fn test_schedule_without_default() {
        let schedule = Schedule::parse("<schedule/>").unwrap();
        assert!(schedule.default_layout.is_none());
        assert!(schedule.entries.is_empty());
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = Schedule::parse(SCHEDULE).unwrap();
        let b = Schedule::parse(&SCHEDULE.replace("scheduleid=\"32\"", "scheduleid=\"33\"")).unwrap();
        assert_ne!(a.content_digest(), b.content_digest());
        assert_eq!(a.content_digest(), Schedule::parse(SCHEDULE).unwrap().content_digest());
    }

    #[test]
    fn test_wrong_root_rejected() {
        assert!(matches!(
            Schedule::parse("<files/>"),
            Err(ApiError::InvalidResponse(_))
        ));
    }
}
