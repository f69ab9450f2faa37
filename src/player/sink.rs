use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use super::volume::PcmSource;
use crate::audio::WaveFormat;
use crate::common::errors::EngineResult;

/// Audio output device boundary.
///
/// The controller only drives lifecycle calls; the sink pulls PCM from the
/// source it was initialised with at its own pace. `init` is called exactly
/// once per stream, before the first `play`.
pub trait OutputSink: Send {
    fn init(&mut self, format: WaveFormat, source: Arc<dyn PcmSource>) -> EngineResult<()>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    /// Releases the device. Called once when the player tears the sink
    /// down; no other call follows it.
    fn dispose(&mut self);
}

const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

mod mode {
    pub const IDLE: u8 = 0;
    pub const PLAYING: u8 = 1;
    pub const DISPOSED: u8 = 2;
}

/// Headless sink that consumes PCM at wall-clock rate and discards it.
///
/// Stands in for a sound card in the demo binary and wherever playback
/// pacing is wanted without an audio device.
pub struct NullSink {
    mode: Arc<AtomicU8>,
    drain: Option<JoinHandle<()>>,
}

impl NullSink {
    pub fn new() -> Self {
        Self {
            mode: Arc::new(AtomicU8::new(mode::IDLE)),
            drain: None,
        }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for NullSink {
    fn init(&mut self, format: WaveFormat, source: Arc<dyn PcmSource>) -> EngineResult<()> {
        let mode = self.mode.clone();
        let step = (format.bytes_per_second() / 10).max(format.block_align());
        let handle = std::thread::Builder::new()
            .name("null-sink".to_string())
            .spawn(move || {
                let mut scratch = vec![0u8; step];
                loop {
                    match mode.load(Ordering::Acquire) {
                        mode::DISPOSED => break,
                        mode::PLAYING => {
                            source.read(&mut scratch);
                        }
                        _ => {}
                    }
                    std::thread::sleep(DRAIN_INTERVAL);
                }
            })?;
        self.drain = Some(handle);
        debug!("null sink ready: {}", format);
        Ok(())
    }

    fn play(&mut self) {
        self.mode.store(mode::PLAYING, Ordering::Release);
    }

    fn pause(&mut self) {
        self.mode.store(mode::IDLE, Ordering::Release);
    }

    fn stop(&mut self) {
        self.mode.store(mode::IDLE, Ordering::Release);
    }

    fn dispose(&mut self) {
        self.mode.store(mode::DISPOSED, Ordering::Release);
        if let Some(handle) = self.drain.take() {
            let _ = handle.join();
        }
    }
}

/// Sink double for controller tests: records every lifecycle call and hands
/// the PCM source out so tests can drain the buffer through the real path.
#[cfg(test)]
pub(crate) struct RecordingSink {
    pub calls: Arc<parking_lot::Mutex<Vec<String>>>,
    pub source: Arc<parking_lot::Mutex<Option<Arc<dyn PcmSource>>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new(
        calls: Arc<parking_lot::Mutex<Vec<String>>>,
        source: Arc<parking_lot::Mutex<Option<Arc<dyn PcmSource>>>>,
    ) -> Self {
        Self { calls, source }
    }
}

#[cfg(test)]
impl OutputSink for RecordingSink {
    fn init(&mut self, format: WaveFormat, source: Arc<dyn PcmSource>) -> EngineResult<()> {
        self.calls
            .lock()
            .push(format!("init {}x{}", format.sample_rate, format.channels));
        *self.source.lock() = Some(source);
        Ok(())
    }

    fn play(&mut self) {
        self.calls.lock().push("play".into());
    }

    fn pause(&mut self) {
        self.calls.lock().push("pause".into());
    }

    fn stop(&mut self) {
        self.calls.lock().push("stop".into());
    }

    fn dispose(&mut self) {
        self.calls.lock().push("dispose".into());
    }
}
