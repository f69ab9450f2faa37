use serde::{Deserialize, Serialize};

use crate::common::errors::EngineError;
use crate::configs::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub logging: Option<LoggingConfig>,
    /// JSON track list consumed by the demo binary.
    #[serde(default)]
    pub tracks_file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub filters: Option<String>,
    pub file: Option<FileLogConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FileLogConfig {
    pub path: String,
    #[serde(default = "default_max_lines")]
    pub max_lines: u32,
}

fn default_max_lines() -> u32 {
    10_000
}

impl Config {
    pub fn load() -> Result<Self, EngineError> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            crate::log_println!("No config.toml found, using built-in defaults");
            return Ok(Self::default());
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| EngineError::Config(format!("{config_path}: {e}")))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.playback.max_buffered_seconds, 20);
        assert_eq!(config.playback.poll_interval_ms, 250);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.transcoder.binary, "ffmpeg");
        assert!(config.logging.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let toml_str = r#"
            [playback]
            high_watermark_seconds = 6.0

            [http]
            referer = "https://radio.example.com/"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.playback.high_watermark_seconds, 6.0);
        assert_eq!(config.playback.low_watermark_seconds, 0.5);
        assert_eq!(config.http.referer.as_deref(), Some("https://radio.example.com/"));
        assert_eq!(config.http.timeout_secs, 15);
        let logging = config.logging.unwrap();
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert!(logging.file.is_none());
    }
}
