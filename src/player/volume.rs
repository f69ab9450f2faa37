use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::audio::PlaybackBuffer;

/// Shared volume setting, stored as the bit pattern of an `f32` gain so it
/// can be read lock-free from the output path.
pub struct VolumeControl {
    gain_bits: AtomicU32,
}

impl VolumeControl {
    pub fn new(gain: f32) -> Self {
        Self {
            gain_bits: AtomicU32::new(gain.max(0.0).to_bits()),
        }
    }

    pub fn set(&self, gain: f32) {
        self.gain_bits.store(gain.max(0.0).to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Acquire))
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Pull side of the playback buffer as seen by an output sink.
pub trait PcmSource: Send + Sync {
    /// Fills `out` with as many bytes as are currently buffered and returns
    /// the count. Never blocks.
    fn read(&self, out: &mut [u8]) -> usize;
}

/// Applies the shared gain to interleaved signed 16-bit samples read from
/// the playback buffer.
///
/// Scaling is skipped while the stream's transcoder-fallback flag is set;
/// transcoded audio passes through at its produced level.
pub struct VolumeSource {
    buffer: Arc<PlaybackBuffer>,
    control: Arc<VolumeControl>,
    bypass: Arc<AtomicBool>,
}

impl VolumeSource {
    pub fn new(
        buffer: Arc<PlaybackBuffer>,
        control: Arc<VolumeControl>,
        bypass: Arc<AtomicBool>,
    ) -> Self {
        Self {
            buffer,
            control,
            bypass,
        }
    }
}

impl PcmSource for VolumeSource {
    fn read(&self, out: &mut [u8]) -> usize {
        let n = self.buffer.read(out);
        let gain = self.control.get();
        if self.bypass.load(Ordering::Acquire) || (gain - 1.0).abs() < f32::EPSILON {
            return n;
        }

        for sample in out[..n].chunks_exact_mut(2) {
            let scaled = i16::from_le_bytes([sample[0], sample[1]]) as f32 * gain;
            let clamped = scaled.clamp(i16::MIN as f32, i16::MAX as f32).round() as i16;
            sample.copy_from_slice(&clamped.to_le_bytes());
        }
        n
    }
}
