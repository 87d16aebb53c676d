//! Draws Azure AI Vision annotations over uploaded images.
//!
//! The core is [`render::Renderer`], which burns object and people boxes into
//! a private copy of the image, and the pure helpers in [`extract`]. Around it
//! sit the response schema ([`analysis`]), the HTTP client ([`vision`]) and a
//! small axum front-end ([`server`]).

pub mod analysis;
pub mod config;
pub mod extract;
pub mod render;
pub mod report;
pub mod server;
pub mod vision;

pub use analysis::{AnalysisError, AnalysisResult, BoundingBox, Diagnostic, Parsed};
pub use extract::{
    extract_caption, extract_tags, extract_text, match_safety_tips, SafetyTipRules,
};
pub use render::{render, AnnotatedImage, OutputFormat, RenderError, Rendered, Renderer};
