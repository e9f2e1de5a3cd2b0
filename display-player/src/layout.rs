//! XLF layout documents
//!
//! A layout is a canvas split into regions, each holding an ordered media
//! list. Layouts are re-read from the cache every time they are played so a
//! freshly downloaded revision takes effect on the next swap.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use xmltree::Element;

use crate::error::{PlayerError, Result};

/// How a media item is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    /// Everything else is rendered as a web page
    Web,
}

impl MediaKind {
    pub fn from_type(raw: &str) -> Self {
        match raw {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::Web,
        }
    }
}

/// Pixel rectangle of a region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// One `<media>` element
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSpec {
    pub id: String,
    pub kind: MediaKind,
    /// The `type` attribute as written
    pub raw_type: String,
    /// Seconds; zero means "unspecified"
    pub duration: f64,
    pub render: String,
    pub options: HashMap<String, String>,
    pub raws: HashMap<String, String>,
}

impl MediaSpec {
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    /// Configured duration, `None` when unspecified or out of range
    pub fn duration(&self) -> Option<Duration> {
        if self.duration > 0.0 {
            Duration::try_from_secs_f64(self.duration).ok()
        } else {
            None
        }
    }

    pub fn is_muted(&self) -> bool {
        self.option("mute").map(int_flag).unwrap_or(false)
    }

    pub fn is_native_webpage(&self) -> bool {
        self.raw_type == "webpage" && self.render == "native"
    }
}

/// One `<region>` element
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    pub geometry: Geometry,
    /// Restart from the first media after the last one finishes
    pub loop_media: bool,
    pub options: HashMap<String, String>,
    pub media: Vec<MediaSpec>,
}

/// A parsed XLF document
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub id: String,
    pub width: i32,
    pub height: i32,
    pub background_color: Option<String>,
    pub background: Option<String>,
    pub regions: Vec<Region>,
    pub tags: Vec<String>,
}

impl Layout {
    /// Read and parse a cached layout file
    pub fn load(id: &str, path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| PlayerError::Layout(format!("{}: {}", path.display(), e)))?;
        Self::parse(id, &text)
    }

    pub fn parse(id: &str, text: &str) -> Result<Self> {
        let root = Element::parse(text.as_bytes())?;
        if root.name != "layout" {
            return Err(PlayerError::Layout(format!(
                "expected <layout>, found <{}>",
                root.name
            )));
        }

        let mut layout = Layout {
            id: id.to_string(),
            width: dimension(&root, "width"),
            height: dimension(&root, "height"),
            background_color: non_empty_attr(&root, "bgcolor"),
            background: non_empty_attr(&root, "background"),
            regions: Vec::new(),
            tags: Vec::new(),
        };

        for child in elements(&root) {
            match child.name.as_str() {
                "region" => layout.regions.push(parse_region(child)?),
                "tags" => layout
                    .tags
                    .extend(elements(child).filter_map(|t| t.get_text()).map(|t| t.to_string())),
                _ => {}
            }
        }

        Ok(layout)
    }
}

fn elements(node: &Element) -> impl Iterator<Item = &Element> {
    node.children.iter().filter_map(|n| n.as_element())
}

fn non_empty_attr(node: &Element, name: &str) -> Option<String> {
    node.attributes
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required_attr(node: &Element, name: &str) -> Result<String> {
    node.attributes.get(name).cloned().ok_or_else(|| {
        PlayerError::Layout(format!("<{}> without `{}` attribute", node.name, name))
    })
}

fn dimension(node: &Element, name: &str) -> i32 {
    node.attributes
        .get(name)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v as i32)
        .unwrap_or(0)
}

/// `<options><name>value</name>...</options>`, skipping empty values
fn text_children(node: &Element) -> HashMap<String, String> {
    elements(node)
        .filter_map(|opt| opt.get_text().map(|t| (opt.name.clone(), t.into_owned())))
        .filter(|(_, v)| !v.is_empty())
        .collect()
}

fn int_flag(value: &str) -> bool {
    value.trim().parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

fn parse_region(node: &Element) -> Result<Region> {
    let mut options = HashMap::new();
    let mut media = Vec::new();

    for child in elements(node) {
        match child.name.as_str() {
            "media" => media.push(parse_media(child)?),
            "options" => options.extend(text_children(child)),
            _ => {}
        }
    }

    Ok(Region {
        id: required_attr(node, "id")?,
        geometry: Geometry {
            left: dimension(node, "left"),
            top: dimension(node, "top"),
            width: dimension(node, "width"),
            height: dimension(node, "height"),
        },
        loop_media: options.get("loop").map(|v| int_flag(v)).unwrap_or(false),
        options,
        media,
    })
}

fn parse_media(node: &Element) -> Result<MediaSpec> {
    let raw_type = required_attr(node, "type")?;
    let mut options = HashMap::new();
    let mut raws = HashMap::new();

    for child in elements(node) {
        match child.name.as_str() {
            "options" => options.extend(text_children(child)),
            "raw" => raws.extend(text_children(child)),
            _ => {}
        }
    }

    Ok(MediaSpec {
        id: required_attr(node, "id")?,
        kind: MediaKind::from_type(&raw_type),
        raw_type,
        duration: node
            .attributes
            .get("duration")
            .and_then(|d| d.trim().parse::<f64>().ok())
            .unwrap_or(0.0),
        render: node.attributes.get("render").cloned().unwrap_or_default(),
        options,
        raws,
    })
}
