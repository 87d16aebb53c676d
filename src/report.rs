//! JSON bodies returned by the web front-end.

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;

use crate::analysis::{AnalysisResult, Diagnostic};
use crate::extract::{self, CropSuggestion, SafetyTipRules, ScoredText};
use crate::render::{OutputFormat, Overlay};

#[derive(Debug, Serialize)]
pub struct TagView {
    pub name: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct AnnotatedImageView {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// `data:` URL ready for an `<img src>`.
    pub data_url: String,
    pub overlays: Vec<Overlay>,
}

impl AnnotatedImageView {
    pub fn new(
        format: OutputFormat,
        width: u32,
        height: u32,
        bytes: &[u8],
        overlays: Vec<Overlay>,
    ) -> Self {
        let encoded = general_purpose::STANDARD.encode(bytes);
        let data_url = format!("data:{};base64,{}", format.mime_type(), encoded);
        Self { format, width, height, data_url, overlays }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub caption: String,
    pub has_caption: bool,
    pub dense_captions: Vec<ScoredText>,
    pub tags: Vec<TagView>,
    pub text_lines: Vec<String>,
    pub smart_crops: Vec<CropSuggestion>,
    pub objects: Vec<ScoredText>,
    pub people_count: usize,
    pub people_summary: String,
    pub model_version: Option<String>,
    pub annotated_image: AnnotatedImageView,
    pub skipped: Vec<String>,
    pub processing_time_ms: u128,
}

impl AnalysisReport {
    pub fn new(
        result: &AnalysisResult,
        annotated_image: AnnotatedImageView,
        skipped: &[Diagnostic],
        processing_time_ms: u128,
    ) -> Self {
        let caption = extract::extract_caption(result);
        Self {
            caption: caption.unwrap_or(extract::NO_CAPTION).to_string(),
            has_caption: caption.is_some(),
            dense_captions: extract::extract_dense_captions(result),
            tags: tag_views(result),
            text_lines: extract::extract_text(result),
            smart_crops: extract::extract_smart_crops(result),
            objects: extract::extract_objects(result),
            people_count: extract::people_count(result),
            people_summary: extract::people_summary(result),
            model_version: result.model_version.clone(),
            annotated_image,
            skipped: skipped.iter().map(ToString::to_string).collect(),
            processing_time_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub caption: String,
    pub tags: Vec<TagView>,
    pub safety_tips: Vec<String>,
    pub objects: Vec<ScoredText>,
    pub annotated_image: AnnotatedImageView,
    pub skipped: Vec<String>,
    pub processing_time_ms: u128,
}

impl ReplayReport {
    pub fn new(
        result: &AnalysisResult,
        rules: &SafetyTipRules,
        annotated_image: AnnotatedImageView,
        skipped: &[Diagnostic],
        processing_time_ms: u128,
    ) -> Self {
        Self {
            caption: extract::extract_caption(result).unwrap_or(extract::NO_CAPTION).to_string(),
            tags: tag_views(result),
            safety_tips: extract::match_safety_tips(extract::tag_names(result).as_slice(), rules),
            objects: extract::extract_objects(result),
            annotated_image,
            skipped: skipped.iter().map(ToString::to_string).collect(),
            processing_time_ms,
        }
    }
}

fn tag_views(result: &AnalysisResult) -> Vec<TagView> {
    extract::extract_tags(result)
        .into_iter()
        .map(|(name, confidence)| TagView { name, confidence })
        .collect()
}
