pub mod buffer;
pub mod decode;
pub mod direct;
pub mod format;
pub mod hls;
pub mod reader;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use buffer::PlaybackBuffer;
pub use format::WaveFormat;

use crate::configs::{RetryConfig, TranscoderConfig};
use crate::net::StreamClient;

/// Everything a producer thread needs to stream one track.
pub struct StreamContext {
    pub client: StreamClient,
    pub retry: RetryConfig,
    pub transcoder: TranscoderConfig,
    /// Pause between occupancy checks while the ring is nearly full.
    pub fill_delay: Duration,
    pub buffer: Arc<PlaybackBuffer>,
    pub cancel: CancellationToken,
    /// Set once a segment decoded through the external transcoder; the
    /// volume stage then leaves sample gain untouched.
    pub transcoder_fallback: Arc<AtomicBool>,
}

impl StreamContext {
    pub fn mark_transcoder_fallback(&self) {
        self.transcoder_fallback.store(true, Ordering::Release);
    }
}
