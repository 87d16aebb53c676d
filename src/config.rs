//! Settings read from the process environment (and `.env`, via dotenvy).

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::vision::VisionCredentials;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid { key: &'static str, value: String, reason: String },
    #[error("{present} is set but {missing} is not; set both or neither")]
    IncompleteCredentials { present: &'static str, missing: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Server-side credentials. Requests may still supply their own.
    pub vision: Option<VisionCredentials>,
    pub font_path: Option<PathBuf>,
    pub safety_tips_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            vision: None,
            font_path: None,
            safety_tips_path: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        };

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = parse("BIND_ADDR", bind_addr)?;
        let max_upload_bytes: usize = match get("MAX_UPLOAD_BYTES") {
            Some(value) => parse("MAX_UPLOAD_BYTES", value)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let vision = match (get("AZURE_VISION_ENDPOINT"), get("AZURE_VISION_KEY")) {
            (Some(endpoint), Some(key)) => Some(VisionCredentials::new(endpoint, key)),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::IncompleteCredentials {
                    present: "AZURE_VISION_ENDPOINT",
                    missing: "AZURE_VISION_KEY",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteCredentials {
                    present: "AZURE_VISION_KEY",
                    missing: "AZURE_VISION_ENDPOINT",
                })
            }
        };

        Ok(Self {
            bind_addr,
            vision,
            font_path: get("FONT_PATH").map(PathBuf::from),
            safety_tips_path: get("SAFETY_TIPS_PATH").map(PathBuf::from),
            max_upload_bytes,
        })
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err: T::Err| ConfigError::Invalid { key, reason: err.to_string(), value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap());
        assert!(config.vision.is_none());
        assert!(config.font_path.is_none());
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn reads_every_variable() {
        let config = config(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("AZURE_VISION_ENDPOINT", "https://example.cognitiveservices.azure.com/"),
            ("AZURE_VISION_KEY", "abc"),
            ("FONT_PATH", "/usr/share/fonts/DejaVuSans.ttf"),
            ("SAFETY_TIPS_PATH", "tips.json"),
            ("MAX_UPLOAD_BYTES", "2048"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        let vision = config.vision.unwrap();
        assert_eq!(vision.endpoint, "https://example.cognitiveservices.azure.com/");
        assert_eq!(vision.key(), "abc");
        assert_eq!(config.font_path, Some(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf")));
        assert_eq!(config.safety_tips_path, Some(PathBuf::from("tips.json")));
        assert_eq!(config.max_upload_bytes, 2048);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config(&[("AZURE_VISION_ENDPOINT", "  "), ("AZURE_VISION_KEY", "")]).unwrap();
        assert!(config.vision.is_none());
    }

    #[test]
    fn half_configured_credentials_are_rejected() {
        let err = config(&[("AZURE_VISION_KEY", "abc")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::IncompleteCredentials {
                present: "AZURE_VISION_KEY",
                missing: "AZURE_VISION_ENDPOINT",
            }
        );
    }

    #[test]
    fn invalid_numbers_are_reported() {
        let err = config(&[("MAX_UPLOAD_BYTES", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MAX_UPLOAD_BYTES", .. }));
        assert!(config(&[("BIND_ADDR", "nowhere")]).is_err());
    }
}
