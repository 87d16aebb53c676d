//! Typed view of an Azure AI Vision "Image Analysis 4.0" response.
//!
//! The service returns one JSON document with a `*Result` section per requested
//! feature. Sections are optional, and every entry is validated on its own: a
//! malformed entry becomes a [`Diagnostic`] and the rest of the document is
//! still usable.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("analysis document is malformed: {0}")]
    Malformed(String),
}

/// Axis-aligned box in source-image pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DenseCaption {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmartCrop {
    pub aspect_ratio: f64,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedObject {
    /// Position in `objectsResult.values`, counting skipped entries.
    pub source_index: usize,
    pub label: String,
    pub confidence: f64,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedPerson {
    /// Position in `peopleResult.values`, counting skipped entries.
    pub source_index: usize,
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub caption: Option<String>,
    pub dense_captions: Vec<DenseCaption>,
    pub tags: Vec<Tag>,
    pub text_lines: Vec<String>,
    pub smart_crops: Vec<SmartCrop>,
    pub objects: Vec<DetectedObject>,
    pub people: Vec<DetectedPerson>,
    pub model_version: Option<String>,
    pub metadata: Option<ImageMetadata>,
}

/// One entry that was skipped instead of aborting the whole operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub section: &'static str,
    pub index: Option<usize>,
    pub reason: String,
}

impl Diagnostic {
    pub fn entry(section: &'static str, index: usize, reason: impl Into<String>) -> Self {
        Self { section, index: Some(index), reason: reason.into() }
    }

    pub fn section(section: &'static str, reason: impl Into<String>) -> Self {
        Self { section, index: None, reason: reason.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]: {}", self.section, index, self.reason),
            None => write!(f, "{}: {}", self.section, self.reason),
        }
    }
}

/// A validated result together with everything that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    pub result: AnalysisResult,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Deserialize)]
struct WireBox {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl TryFrom<WireBox> for BoundingBox {
    type Error = String;

    fn try_from(wire: WireBox) -> Result<Self, Self::Error> {
        let coord = |name: &str, value: f64| {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "bounding box `{name}` must be a non-negative number, got {value}"
                ));
            }
            if value > u32::MAX as f64 {
                return Err(format!("bounding box `{name}` is out of range: {value}"));
            }
            Ok(value.round() as u32)
        };
        let bbox = BoundingBox::new(
            coord("x", wire.x)?,
            coord("y", wire.y)?,
            coord("w", wire.w)?,
            coord("h", wire.h)?,
        );
        if bbox.width == 0 || bbox.height == 0 {
            return Err(format!("bounding box {bbox} has an empty area"));
        }
        Ok(bbox)
    }
}

#[derive(Deserialize)]
struct WireScored {
    #[serde(alias = "name")]
    text: String,
    confidence: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSmartCrop {
    aspect_ratio: f64,
    bounding_box: WireBox,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireObject {
    bounding_box: WireBox,
    tags: Vec<WireScored>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePerson {
    bounding_box: WireBox,
}

#[derive(Deserialize)]
struct WireLine {
    text: String,
}

fn confidence(value: f64) -> Result<f64, String> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("confidence {value} is outside [0, 1]"))
    }
}

impl AnalysisResult {
    pub fn from_json(json: &str) -> Result<Parsed, AnalysisError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Validate a raw response document, skipping entries that do not fit the schema.
    pub fn from_value(document: Value) -> Result<Parsed, AnalysisError> {
        let mut document = match document {
            Value::Object(document) => document,
            other => {
                return Err(AnalysisError::Malformed(format!(
                    "expected a JSON object at the top level, got {}",
                    kind_of(&other)
                )))
            }
        };
        let mut diagnostics = Vec::new();
        let diag = &mut diagnostics;

        let caption = parse_caption(&mut document, diag);

        let dense_captions = parse_section(
            "denseCaptions",
            section_values(&mut document, "denseCaptionsResult", "denseCaptions", diag),
            diag,
            |_, wire: WireScored| {
                Ok(DenseCaption { text: wire.text, confidence: confidence(wire.confidence)? })
            },
        );

        let tags = parse_section(
            "tags",
            section_values(&mut document, "tagsResult", "tags", diag),
            diag,
            |_, wire: WireScored| {
                Ok(Tag { name: wire.text, confidence: confidence(wire.confidence)? })
            },
        );

        let text_lines = parse_read(&mut document, diag);

        let smart_crops = parse_section(
            "smartCrops",
            section_values(&mut document, "smartCropsResult", "smartCrops", diag),
            diag,
            |_, wire: WireSmartCrop| {
                if !wire.aspect_ratio.is_finite() || wire.aspect_ratio <= 0.0 {
                    return Err(format!("aspect ratio {} must be positive", wire.aspect_ratio));
                }
                Ok(SmartCrop {
                    aspect_ratio: wire.aspect_ratio,
                    bounding_box: wire.bounding_box.try_into()?,
                })
            },
        );

        let objects = parse_section(
            "objects",
            section_values(&mut document, "objectsResult", "objects", diag),
            diag,
            |source_index, wire: WireObject| {
                let bounding_box: BoundingBox = wire.bounding_box.try_into()?;
                let top = wire
                    .tags
                    .into_iter()
                    .next()
                    .ok_or_else(|| "object has no tags".to_string())?;
                Ok(DetectedObject {
                    source_index,
                    label: top.text,
                    confidence: confidence(top.confidence)?,
                    bounding_box,
                })
            },
        );

        let people = parse_section(
            "people",
            section_values(&mut document, "peopleResult", "people", diag),
            diag,
            |source_index, wire: WirePerson| {
                Ok(DetectedPerson { source_index, bounding_box: wire.bounding_box.try_into()? })
            },
        );

        let model_version = match document.remove("modelVersion") {
            Some(Value::String(version)) => Some(version),
            _ => None,
        };

        let metadata = document.remove("metadata").and_then(|value| {
            match serde_json::from_value::<ImageMetadataWire>(value) {
                Ok(wire) => Some(ImageMetadata { width: wire.width, height: wire.height }),
                Err(err) => {
                    diag.push(Diagnostic::section("metadata", err.to_string()));
                    None
                }
            }
        });

        Ok(Parsed {
            result: AnalysisResult {
                caption,
                dense_captions,
                tags,
                text_lines,
                smart_crops,
                objects,
                people,
                model_version,
                metadata,
            },
            diagnostics,
        })
    }
}

#[derive(Deserialize)]
struct ImageMetadataWire {
    width: u32,
    height: u32,
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_caption(
    document: &mut Map<String, Value>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    let section = document.remove("captionResult")?;
    match section.get("text") {
        Some(Value::String(text)) => Some(text.clone()),
        Some(other) => {
            diagnostics.push(Diagnostic::section(
                "caption",
                format!("`text` must be a string, got {}", kind_of(other)),
            ));
            None
        }
        None => None,
    }
}

fn section_values(
    document: &mut Map<String, Value>,
    key: &str,
    section: &'static str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Value> {
    match document.remove(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(mut body)) => match body.remove("values") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values,
            Some(other) => {
                diagnostics.push(Diagnostic::section(
                    section,
                    format!("`values` must be an array, got {}", kind_of(&other)),
                ));
                Vec::new()
            }
        },
        Some(other) => {
            diagnostics.push(Diagnostic::section(
                section,
                format!("`{key}` must be an object, got {}", kind_of(&other)),
            ));
            Vec::new()
        }
    }
}

fn parse_section<W, T>(
    section: &'static str,
    values: Vec<Value>,
    diagnostics: &mut Vec<Diagnostic>,
    convert: impl Fn(usize, W) -> Result<T, String>,
) -> Vec<T>
where
    W: DeserializeOwned,
{
    let mut entries = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let entry = serde_json::from_value::<W>(value)
            .map_err(|err| err.to_string())
            .and_then(|wire| convert(index, wire));
        match entry {
            Ok(entry) => entries.push(entry),
            Err(reason) => diagnostics.push(Diagnostic::entry(section, index, reason)),
        }
    }
    entries
}

/// Flatten `readResult.blocks[].lines[].text` in source order.
fn parse_read(document: &mut Map<String, Value>, diagnostics: &mut Vec<Diagnostic>) -> Vec<String> {
    let blocks = match document.remove("readResult") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Object(mut body)) => match body.remove("blocks") {
            None | Some(Value::Null) => return Vec::new(),
            Some(Value::Array(blocks)) => blocks,
            Some(other) => {
                diagnostics.push(Diagnostic::section(
                    "text",
                    format!("`blocks` must be an array, got {}", kind_of(&other)),
                ));
                return Vec::new();
            }
        },
        Some(other) => {
            diagnostics.push(Diagnostic::section(
                "text",
                format!("`readResult` must be an object, got {}", kind_of(&other)),
            ));
            return Vec::new();
        }
    };

    let mut lines = Vec::new();
    for (index, block) in blocks.into_iter().enumerate() {
        let block_lines = match block.get("lines") {
            Some(Value::Array(block_lines)) => block_lines,
            None => continue,
            Some(other) => {
                diagnostics.push(Diagnostic::entry(
                    "text",
                    index,
                    format!("`lines` must be an array, got {}", kind_of(other)),
                ));
                continue;
            }
        };
        for (line_index, line) in block_lines.iter().enumerate() {
            match WireLine::deserialize(line) {
                Ok(line) => lines.push(line.text),
                Err(err) => diagnostics.push(Diagnostic::entry(
                    "text",
                    index,
                    format!("line {line_index}: {err}"),
                )),
            }
        }
    }
    lines
}
