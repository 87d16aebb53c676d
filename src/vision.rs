//! Client for the Azure AI Vision image analysis endpoint.

use std::fmt;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub const API_VERSION: &str = "2023-10-01";
pub const FEATURES: [&str; 7] =
    ["tags", "read", "caption", "denseCaptions", "smartCrops", "objects", "people"];
pub const LANGUAGE: &str = "en";

const LOGGED_BODY_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("request to the vision service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Azure API Error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("vision service returned invalid JSON: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Endpoint and subscription key, supplied at call time.
#[derive(Clone, PartialEq, Eq)]
pub struct VisionCredentials {
    pub endpoint: String,
    key: String,
}

impl VisionCredentials {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `{endpoint}/computervision/imageanalysis:analyze`, tolerating a trailing slash.
    pub fn analyze_url(&self) -> String {
        format!("{}/computervision/imageanalysis:analyze", self.endpoint.trim_end_matches('/'))
    }
}

impl fmt::Debug for VisionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionCredentials")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisionClient {
    http: reqwest::Client,
}

impl VisionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `image` for analysis and return the raw response document.
    pub async fn analyze(
        &self,
        credentials: &VisionCredentials,
        image: Vec<u8>,
    ) -> Result<Value, VisionError> {
        let url = credentials.analyze_url();
        let features = FEATURES.join(",");
        info!(%url, bytes = image.len(), "sending image to vision service");

        let response = self
            .http
            .post(&url)
            .query(&[
                ("api-version", API_VERSION),
                ("features", features.as_str()),
                ("language", LANGUAGE),
            ])
            .header("Ocp-Apim-Subscription-Key", credentials.key())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(
            %status,
            body = %body.chars().take(LOGGED_BODY_CHARS).collect::<String>(),
            "vision service responded"
        );

        if !status.is_success() {
            return Err(VisionError::Api { status: status.as_u16(), body });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_url_handles_trailing_slash() {
        let endpoint = "https://example.cognitiveservices.azure.com";
        let with_slash = VisionCredentials::new(format!("{endpoint}/"), "k");
        let without = VisionCredentials::new(endpoint, "k");
        assert_eq!(
            with_slash.analyze_url(),
            "https://example.cognitiveservices.azure.com/computervision/imageanalysis:analyze"
        );
        assert_eq!(with_slash.analyze_url(), without.analyze_url());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let credentials = VisionCredentials::new("https://example.com", "super-secret");
        let printed = format!("{credentials:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("https://example.com"));
    }

    #[test]
    fn api_errors_read_like_the_service_message() {
        let err = VisionError::Api { status: 401, body: "Access denied".into() };
        assert_eq!(err.to_string(), "Azure API Error 401: Access denied");
    }
}
