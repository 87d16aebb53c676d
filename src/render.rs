//! Burns detection overlays into a private copy of an uploaded image.

use std::io::Cursor;

use ab_glyph::{FontArc, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::{AnalysisResult, BoundingBox, Diagnostic};

/// Vertical distance between a label and the top edge of its box.
pub const LABEL_OFFSET: u32 = 10;
pub const BORDER_WIDTH: u32 = 3;
pub const OBJECT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const PERSON_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const PERSON_LABEL: &str = "Person";

const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_SCALE: f32 = 11.0;
// Rough advance per character at LABEL_SCALE, for sizing the tag without a font.
const LABEL_ADVANCE: u32 = 7;
const LABEL_PADDING: u32 = 2;
const JPEG_QUALITY: u8 = 85;

/// DejaVu Sans Mono Bold, see `assets/fonts/LICENSE-DejaVu.txt`.
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono-Bold.ttf");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image could not be decoded: {0}")]
    Decode(#[source] ImageError),
    #[error("image could not be encoded as {format:?}: {source}")]
    Encode {
        format: OutputFormat,
        #[source]
        source: ImageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Sniff the raster format of `bytes`, if it is one we can write back.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Object,
    Person,
}

impl OverlayKind {
    pub fn color(self) -> Rgb<u8> {
        match self {
            Self::Object => OBJECT_COLOR,
            Self::Person => PERSON_COLOR,
        }
    }

    fn section(self) -> &'static str {
        match self {
            Self::Object => "objects",
            Self::Person => "people",
        }
    }
}

/// Record of one rectangle drawn onto an [`AnnotatedImage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub kind: OverlayKind,
    /// Index of the entry in its `*Result.values` array.
    pub source_index: usize,
    /// Box after clamping to the image bounds.
    pub rect: BoundingBox,
    pub label: String,
    pub label_anchor: (u32, u32),
}

#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    pixels: RgbImage,
    overlays: Vec<Overlay>,
}

impl AnnotatedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Overlays in the order they were drawn.
    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, RenderError> {
        let mut bytes = Vec::new();
        let written = match format {
            OutputFormat::Png => {
                self.pixels.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            }
            OutputFormat::Jpeg => self
                .pixels
                .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)),
        };
        written.map_err(|source| RenderError::Encode { format, source })?;
        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct Rendered {
    pub image: AnnotatedImage,
    pub skipped: Vec<Diagnostic>,
}

/// Draws object and people boxes with labels.
///
/// Labels use the bundled font unless another one is supplied. If no font is
/// available the label is still marked by a filled tag in the box colour.
#[derive(Clone)]
pub struct Renderer {
    font: Option<FontArc>,
    show_confidence: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        let font = match FontArc::try_from_slice(DEFAULT_FONT) {
            Ok(font) => Some(font),
            Err(err) => {
                warn!(%err, "bundled label font is unreadable; labels are drawn without text");
                None
            }
        };
        Self { font, show_confidence: false }
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bundled label font.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    /// Append `(0.93)` style confidences to object labels.
    pub fn with_confidence(mut self, enabled: bool) -> Self {
        self.show_confidence = enabled;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, image: &[u8], result: &AnalysisResult) -> Result<Rendered, RenderError> {
        Ok(self.render_pixels(decode(image)?, result))
    }

    /// Draw onto an already decoded buffer, see [`decode`].
    pub fn render_pixels(&self, mut pixels: RgbImage, result: &AnalysisResult) -> Rendered {
        let mut overlays = Vec::with_capacity(result.objects.len() + result.people.len());
        let mut skipped = Vec::new();

        let objects = result.objects.iter().map(|object| {
            let label = if self.show_confidence {
                format!("{} ({:.2})", object.label, object.confidence)
            } else {
                object.label.clone()
            };
            (OverlayKind::Object, object.source_index, object.bounding_box, label)
        });
        let people = result.people.iter().map(|person| {
            let label = PERSON_LABEL.to_string();
            (OverlayKind::Person, person.source_index, person.bounding_box, label)
        });

        for (kind, source_index, bbox, label) in objects.chain(people) {
            match self.draw(&mut pixels, kind, source_index, bbox, label) {
                Some(overlay) => overlays.push(overlay),
                None => {
                    let (width, height) = pixels.dimensions();
                    warn!(
                        section = kind.section(),
                        index = source_index,
                        %bbox,
                        "box lies outside the image"
                    );
                    skipped.push(Diagnostic::entry(
                        kind.section(),
                        source_index,
                        format!("box {bbox} lies outside the {width}x{height} image"),
                    ));
                }
            }
        }

        debug!(drawn = overlays.len(), skipped = skipped.len(), "rendered overlays");
        Rendered { image: AnnotatedImage { pixels, overlays }, skipped }
    }

    fn draw(
        &self,
        canvas: &mut RgbImage,
        kind: OverlayKind,
        source_index: usize,
        bbox: BoundingBox,
        label: String,
    ) -> Option<Overlay> {
        let (width, height) = canvas.dimensions();
        let rect = clamp_box(bbox, width, height)?;
        let color = kind.color();

        for inset in 0..BORDER_WIDTH {
            let w = rect.width.saturating_sub(2 * inset);
            let h = rect.height.saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let border = Rect::at((rect.x + inset) as i32, (rect.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, border, color);
        }

        let label_anchor = label_anchor(rect, width, height);
        self.draw_label(canvas, label_anchor, &label, color);

        Some(Overlay { kind, source_index, rect, label, label_anchor })
    }

    fn draw_label(&self, canvas: &mut RgbImage, (x, y): (u32, u32), label: &str, color: Rgb<u8>) {
        let (width, height) = canvas.dimensions();
        let scale = PxScale::from(LABEL_SCALE);
        let text_width = match &self.font {
            Some(font) => text_size(scale, font, label).0,
            None => label.chars().count() as u32 * LABEL_ADVANCE,
        };
        let tag_width = (text_width + 2 * LABEL_PADDING).min(width - x);
        let tag_height = LABEL_OFFSET.min(height - y);
        if tag_width == 0 || tag_height == 0 {
            return;
        }
        let tag = Rect::at(x as i32, y as i32).of_size(tag_width, tag_height);
        draw_filled_rect_mut(canvas, tag, color);

        if let Some(font) = &self.font {
            let text_x = (x + LABEL_PADDING) as i32;
            draw_text_mut(canvas, LABEL_TEXT_COLOR, text_x, y as i32, scale, font, label);
        }
    }
}

/// Decode an upload into the RGB buffer the renderer draws on.
pub fn decode(image: &[u8]) -> Result<RgbImage, RenderError> {
    Ok(image::load_from_memory(image).map_err(RenderError::Decode)?.to_rgb8())
}

/// Render with the default renderer: bundled font, names only.
pub fn render(image: &[u8], result: &AnalysisResult) -> Result<Rendered, RenderError> {
    Renderer::default().render(image, result)
}

/// Clip `bbox` to a `width`x`height` canvas, or `None` when nothing of it is visible.
fn clamp_box(bbox: BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
    if bbox.x >= width || bbox.y >= height {
        return None;
    }
    let right = bbox.right().min(width);
    let bottom = bbox.bottom().min(height);
    Some(BoundingBox::new(bbox.x, bbox.y, right - bbox.x, bottom - bbox.y))
}

/// Label sits `LABEL_OFFSET` above the box, pulled back inside the canvas when
/// the box touches the top edge.
fn label_anchor(rect: BoundingBox, width: u32, height: u32) -> (u32, u32) {
    let x = rect.x.min(width.saturating_sub(1));
    let y = rect
        .y
        .saturating_sub(LABEL_OFFSET)
        .min(height.saturating_sub(LABEL_OFFSET.min(height)));
    (x, y)
}
