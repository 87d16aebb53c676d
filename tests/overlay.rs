//! Saved response document in, annotated pixels out.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;

use vision_overlay::render::{OverlayKind, LABEL_OFFSET, OBJECT_COLOR, PERSON_COLOR};
use vision_overlay::{extract_text, render, AnalysisResult, BoundingBox};

fn black_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([0, 0, 0]));
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    bytes
}

#[test]
fn document_renders_every_well_formed_box_in_order() {
    let parsed = AnalysisResult::from_value(json!({
        "objectsResult": { "values": [
            { "boundingBox": { "x": 10, "y": 20, "w": 30, "h": 30 },
              "tags": [ { "name": "cup", "confidence": 0.7 } ] },
            { "tags": [ { "name": "lost", "confidence": 0.6 } ] },
            { "boundingBox": { "x": 60, "y": 60, "w": 20, "h": 20 },
              "tags": [ { "name": "book", "confidence": 0.9 } ] }
        ]},
        "peopleResult": { "values": [
            { "boundingBox": { "x": 2, "y": 2, "w": 90, "h": 90 } }
        ]}
    }))
    .unwrap();

    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].section, "objects");
    assert_eq!(parsed.diagnostics[0].index, Some(1));

    let image = black_png(100, 100);
    let rendered = render(&image, &parsed.result).unwrap();
    let overlays = rendered.image.overlays();

    let summary: Vec<_> = overlays.iter().map(|o| (o.kind, o.rect, o.label.as_str())).collect();
    assert_eq!(
        summary,
        vec![
            (OverlayKind::Object, BoundingBox::new(10, 20, 30, 30), "cup"),
            (OverlayKind::Object, BoundingBox::new(60, 60, 20, 20), "book"),
            (OverlayKind::Person, BoundingBox::new(2, 2, 90, 90), "Person"),
        ]
    );

    let pixels = rendered.image.pixels();
    assert_eq!(*pixels.get_pixel(10, 40), OBJECT_COLOR);
    assert_eq!(*pixels.get_pixel(79, 70), OBJECT_COLOR);
    assert_eq!(*pixels.get_pixel(2, 50), PERSON_COLOR);
}

#[test]
fn off_canvas_box_is_reported_at_its_document_index() {
    let parsed = AnalysisResult::from_value(json!({
        "objectsResult": { "values": [
            { "tags": [ { "name": "no-box", "confidence": 0.5 } ] },
            { "boundingBox": { "x": 1, "y": 1, "w": 5, "h": 5 },
              "tags": [ { "name": "cup", "confidence": 0.8 } ] },
            { "boundingBox": { "x": 500, "y": 1, "w": 5, "h": 5 },
              "tags": [ { "name": "kite", "confidence": 0.9 } ] }
        ]}
    }))
    .unwrap();
    assert_eq!(parsed.diagnostics.len(), 1);
    assert!(parsed.diagnostics[0].to_string().starts_with("objects[0]:"));

    let rendered = render(&black_png(20, 20), &parsed.result).unwrap();
    assert_eq!(rendered.image.overlays().len(), 1);
    assert_eq!(rendered.image.overlays()[0].source_index, 1);
    assert_eq!(rendered.skipped.len(), 1);
    assert_eq!(rendered.skipped[0].section, "objects");
    assert_eq!(rendered.skipped[0].index, Some(2));
    assert!(rendered.skipped[0].to_string().starts_with("objects[2]:"));
}

#[test]
fn top_edge_label_stays_on_canvas() {
    let parsed = AnalysisResult::from_value(json!({
        "peopleResult": { "values": [ { "boundingBox": { "x": 0, "y": 0, "w": 20, "h": 20 } } ] }
    }))
    .unwrap();
    let rendered = render(&black_png(32, 32), &parsed.result).unwrap();
    let (x, y) = rendered.image.overlays()[0].label_anchor;
    assert_eq!((x, y), (0, 0));
    assert!(y + LABEL_OFFSET <= rendered.image.height());
}

#[test]
fn repeated_renders_match_pixel_for_pixel() {
    let parsed = AnalysisResult::from_value(json!({
        "objectsResult": { "values": [
            { "boundingBox": { "x": 3, "y": 3, "w": 12, "h": 9 },
              "tags": [ { "name": "sign", "confidence": 0.5 } ] }
        ]}
    }))
    .unwrap();
    let image = black_png(24, 24);
    let a = render(&image, &parsed.result).unwrap();
    let b = render(&image, &parsed.result).unwrap();
    assert_eq!(a.image.pixels().as_raw(), b.image.pixels().as_raw());
}

#[test]
fn no_text_blocks_means_no_lines() {
    let parsed = AnalysisResult::from_value(json!({ "readResult": { "blocks": [] } })).unwrap();
    assert!(extract_text(&parsed.result).is_empty());
}
