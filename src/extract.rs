//! Display-ready fields pulled out of an [`AnalysisResult`].
//!
//! Everything here is pure. Placeholder text such as "No caption detected."
//! belongs to whoever presents the values, not to these functions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisResult, BoundingBox};

pub const NO_CAPTION: &str = "No caption detected.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredText {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropSuggestion {
    pub aspect_ratio: f64,
    pub bounding_box: BoundingBox,
}

/// Round to two decimal places for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn extract_caption(result: &AnalysisResult) -> Option<&str> {
    result.caption.as_deref()
}

pub fn extract_tags(result: &AnalysisResult) -> Vec<(String, f64)> {
    result
        .tags
        .iter()
        .map(|tag| (tag.name.clone(), round2(tag.confidence)))
        .collect()
}

pub fn extract_text(result: &AnalysisResult) -> Vec<String> {
    result.text_lines.clone()
}

pub fn extract_dense_captions(result: &AnalysisResult) -> Vec<ScoredText> {
    result
        .dense_captions
        .iter()
        .map(|caption| ScoredText {
            text: caption.text.clone(),
            confidence: round2(caption.confidence),
        })
        .collect()
}

pub fn extract_objects(result: &AnalysisResult) -> Vec<ScoredText> {
    result
        .objects
        .iter()
        .map(|object| ScoredText {
            text: object.label.clone(),
            confidence: round2(object.confidence),
        })
        .collect()
}

pub fn extract_smart_crops(result: &AnalysisResult) -> Vec<CropSuggestion> {
    result
        .smart_crops
        .iter()
        .map(|crop| CropSuggestion {
            aspect_ratio: crop.aspect_ratio,
            bounding_box: crop.bounding_box,
        })
        .collect()
}

pub fn people_count(result: &AnalysisResult) -> usize {
    result.people.len()
}

pub fn people_summary(result: &AnalysisResult) -> String {
    let count = people_count(result);
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} person{plural} detected.")
}

/// Tag names in detection order.
pub fn tag_names(result: &AnalysisResult) -> Vec<&str> {
    result.tags.iter().map(|tag| tag.name.as_str()).collect()
}

/// Advice text keyed by exact, case-sensitive tag name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SafetyTipRules(HashMap<String, String>);

impl SafetyTipRules {
    /// Parse a JSON object of `{"tag": "advice"}` pairs.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn tip_for(&self, tag: &str) -> Option<&str> {
        self.0.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SafetyTipRules {
    fn default() -> Self {
        [
            ("helmet", "Always wear a helmet when cycling."),
            ("footwear", "Wear proper footwear to avoid injury."),
            ("bicycle", "Ride your bicycle with supervision in safe areas."),
        ]
        .into_iter()
        .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SafetyTipRules {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(tag, tip)| (tag.into(), tip.into())).collect())
    }
}

/// One tip per matching tag, in tag order. Repeated tags repeat their tip.
pub fn match_safety_tips<S: AsRef<str>>(tags: &[S], rules: &SafetyTipRules) -> Vec<String> {
    tags.iter()
        .filter_map(|tag| rules.tip_for(tag.as_ref()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DetectedObject, DetectedPerson, Tag};

    fn tagged(names: &[(&str, f64)]) -> AnalysisResult {
        AnalysisResult {
            tags: names
                .iter()
                .map(|(name, confidence)| Tag { name: name.to_string(), confidence: *confidence })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn caption_is_optional() {
        assert_eq!(extract_caption(&AnalysisResult::default()), None);
        let result = AnalysisResult { caption: Some("a dog".into()), ..Default::default() };
        assert_eq!(extract_caption(&result), Some("a dog"));
    }

    #[test]
    fn tags_round_for_display_only() {
        let result = tagged(&[("bicycle", 0.98765), ("road", 0.5049)]);
        assert_eq!(
            extract_tags(&result),
            vec![("bicycle".to_string(), 0.99), ("road".to_string(), 0.5)]
        );
        assert_eq!(result.tags[0].confidence, 0.98765);
    }

    #[test]
    fn text_is_empty_without_lines() {
        assert!(extract_text(&AnalysisResult::default()).is_empty());
        let result = AnalysisResult { text_lines: vec!["EXIT".into()], ..Default::default() };
        assert_eq!(extract_text(&result), vec!["EXIT"]);
    }

    #[test]
    fn objects_and_people() {
        let bbox = BoundingBox::new(0, 0, 4, 4);
        let result = AnalysisResult {
            objects: vec![DetectedObject {
                source_index: 0,
                label: "cone".into(),
                confidence: 0.777,
                bounding_box: bbox,
            }],
            people: vec![DetectedPerson { source_index: 0, bounding_box: bbox }],
            ..Default::default()
        };
        let cone = ScoredText { text: "cone".into(), confidence: 0.78 };
        assert_eq!(extract_objects(&result), vec![cone]);
        assert_eq!(people_summary(&result), "1 person detected.");
        assert_eq!(people_summary(&AnalysisResult::default()), "0 persons detected.");
    }

    #[test]
    fn matches_known_tags_only() {
        let rules: SafetyTipRules =
            [("helmet", "Always wear a helmet when cycling.")].into_iter().collect();
        assert_eq!(
            match_safety_tips(&["helmet", "unknown"], &rules),
            vec!["Always wear a helmet when cycling.".to_string()]
        );
    }

    #[test]
    fn matching_is_case_sensitive_and_keeps_duplicates() {
        let rules = SafetyTipRules::default();
        let tips = match_safety_tips(&["Helmet", "bicycle", "footwear", "bicycle"], &rules);
        assert_eq!(
            tips,
            vec![
                "Ride your bicycle with supervision in safe areas.",
                "Wear proper footwear to avoid injury.",
                "Ride your bicycle with supervision in safe areas.",
            ]
        );
    }

    #[test]
    fn rules_load_from_json() {
        let rules =
            SafetyTipRules::from_json(r#"{"vest": "Wear a high-visibility vest."}"#).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.tip_for("vest"), Some("Wear a high-visibility vest."));
        assert!(SafetyTipRules::from_json("[]").is_err());
    }

    #[test]
    fn tag_names_follow_detection_order() {
        let result = tagged(&[("outdoor", 0.9), ("helmet", 0.8)]);
        let names = tag_names(&result);
        assert_eq!(names, vec!["outdoor", "helmet"]);
        assert_eq!(match_safety_tips(names.as_slice(), &SafetyTipRules::default()).len(), 1);
    }
}
