use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlaybackConfig {
    /// Ring buffer capacity, expressed as seconds of decoded audio.
    #[serde(default = "default_max_buffered_seconds")]
    pub max_buffered_seconds: u32,
    /// Buffered seconds required before playback starts.
    #[serde(default = "default_high_watermark_seconds")]
    pub high_watermark_seconds: f64,
    /// Buffered seconds below which playback falls back to buffering.
    #[serde(default = "default_low_watermark_seconds")]
    pub low_watermark_seconds: f64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Producer sleep while the buffer is nearly full.
    #[serde(default = "default_fill_delay_ms")]
    pub fill_delay_ms: u64,
}

fn default_max_buffered_seconds() -> u32 {
    20
}

fn default_high_watermark_seconds() -> f64 {
    4.0
}

fn default_low_watermark_seconds() -> f64 {
    0.5
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_fill_delay_ms() -> u64 {
    500
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_buffered_seconds: default_max_buffered_seconds(),
            high_watermark_seconds: default_high_watermark_seconds(),
            low_watermark_seconds: default_low_watermark_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            fill_delay_ms: default_fill_delay_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscoderConfig {
    /// External transcoder binary used as a decode fallback for segments
    /// symphonia cannot open directly.
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_binary() -> String {
    "ffmpeg".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            enabled: default_enabled(),
        }
    }
}
