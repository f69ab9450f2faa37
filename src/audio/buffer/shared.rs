use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::audio::buffer::ring::RingBuffer;
use crate::audio::format::WaveFormat;
use crate::common::errors::{EngineError, EngineResult};

const FULL_WAIT: Duration = Duration::from_millis(100);

/// PCM buffer shared between one producer (stream session) and one consumer
/// (output device).
///
/// The wave format is unknown until the producer appends its first block;
/// the ring is sized at that moment to hold `max_seconds` of audio in that
/// format. A later append with a different format fails the stream.
pub struct PlaybackBuffer {
    max_seconds: u32,
    state: Mutex<BufferState>,
    space: Condvar,
}

#[derive(Default)]
struct BufferState {
    bound: Option<BoundBuffer>,
}

struct BoundBuffer {
    format: WaveFormat,
    ring: RingBuffer,
}

impl PlaybackBuffer {
    pub fn new(max_seconds: u32) -> Arc<Self> {
        Arc::new(Self {
            max_seconds,
            state: Mutex::new(BufferState::default()),
            space: Condvar::new(),
        })
    }

    /// Appends decoded PCM, blocking while the ring is full. Returns
    /// [`EngineError::Cancelled`] if the token fires before every byte is
    /// accepted.
    pub fn append(
        &self,
        format: WaveFormat,
        mut data: &[u8],
        cancel: &CancellationToken,
    ) -> EngineResult<()> {
        let mut state = self.state.lock();

        match &state.bound {
            None => {
                let capacity = format.bytes_per_second() * self.max_seconds as usize;
                debug!("binding playback buffer: {} ({} bytes)", format, capacity);
                state.bound = Some(BoundBuffer {
                    format,
                    ring: RingBuffer::new(capacity),
                });
            }
            Some(bound) if bound.format == format => {}
            Some(bound) => {
                return Err(EngineError::Decode(format!(
                    "stream format changed mid-track: {} -> {}",
                    bound.format, format
                )));
            }
        }

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let bound = state
                .bound
                .as_mut()
                .ok_or_else(|| EngineError::Device("playback buffer detached".into()))?;
            let written = bound.ring.write(data);
            data = &data[written..];
            if data.is_empty() {
                return Ok(());
            }
            let _ = self.space.wait_for(&mut state, FULL_WAIT);
        }
    }

    /// Non-blocking read for the output device. Returns bytes copied.
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        let n = match state.bound.as_mut() {
            Some(bound) => bound.ring.read_into(out),
            None => 0,
        };
        if n > 0 {
            self.space.notify_one();
        }
        n
    }

    /// PCM format bound by the producer, once known.
    pub fn format(&self) -> Option<WaveFormat> {
        self.state.lock().bound.as_ref().map(|b| b.format)
    }

    pub fn buffered_bytes(&self) -> usize {
        self.state
            .lock()
            .bound
            .as_ref()
            .map(|b| b.ring.len())
            .unwrap_or(0)
    }

    /// Seconds of audio currently buffered; zero before the format is known.
    pub fn buffered_seconds(&self) -> f64 {
        let state = self.state.lock();
        match state.bound.as_ref() {
            Some(bound) => bound.format.bytes_to_seconds(bound.ring.len()),
            None => 0.0,
        }
    }

    /// True once less than a quarter second of free space remains.
    /// Producers pause fetching while this holds.
    pub fn is_nearly_full(&self) -> bool {
        let state = self.state.lock();
        match state.bound.as_ref() {
            Some(bound) => bound.ring.remaining() < bound.format.bytes_per_second() / 4,
            None => false,
        }
    }

    /// Drops any unplayed audio. The format binding survives so the session
    /// can resume appending without renegotiation.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        if let Some(bound) = state.bound.as_mut() {
            bound.ring.clear();
        }
        self.space.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 200 bytes per second keeps capacities tiny: one second of "audio"
    // is 100 frames of mono 16-bit at 100 Hz.
    fn tiny_format() -> WaveFormat {
        WaveFormat::new(100, 1)
    }

    #[test]
    fn format_binds_on_first_append() {
        let buffer = PlaybackBuffer::new(1);
        let cancel = CancellationToken::new();
        assert!(buffer.format().is_none());

        buffer.append(tiny_format(), &[0u8; 10], &cancel).unwrap();
        assert_eq!(buffer.format(), Some(tiny_format()));
        assert_eq!(buffer.buffered_bytes(), 10);
    }

    #[test]
    fn format_change_mid_stream_fails() {
        let buffer = PlaybackBuffer::new(1);
        let cancel = CancellationToken::new();
        buffer.append(tiny_format(), &[0u8; 10], &cancel).unwrap();

        let err = buffer
            .append(WaveFormat::new(200, 1), &[0u8; 10], &cancel)
            .unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn buffered_seconds_follows_format() {
        let buffer = PlaybackBuffer::new(2);
        let cancel = CancellationToken::new();
        buffer.append(tiny_format(), &[0u8; 100], &cancel).unwrap();
        assert!((buffer.buffered_seconds() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn near_full_flips_at_quarter_second_of_space() {
        // Capacity 200 bytes; quarter second is 50 bytes.
        let buffer = PlaybackBuffer::new(1);
        let cancel = CancellationToken::new();

        buffer.append(tiny_format(), &[0u8; 140], &cancel).unwrap();
        assert!(!buffer.is_nearly_full());

        buffer.append(tiny_format(), &[0u8; 20], &cancel).unwrap();
        assert!(buffer.is_nearly_full());

        let mut out = [0u8; 50];
        buffer.read(&mut out);
        assert!(!buffer.is_nearly_full());
    }

    #[test]
    fn append_blocks_until_consumer_drains() {
        let buffer = PlaybackBuffer::new(1); // 200-byte capacity
        let cancel = CancellationToken::new();

        let producer_buf = buffer.clone();
        let producer_cancel = cancel.clone();
        let producer = std::thread::spawn(move || {
            producer_buf.append(tiny_format(), &[7u8; 500], &producer_cancel)
        });

        let mut collected = Vec::new();
        while collected.len() < 500 {
            // The bounded ring must never hold more than its capacity.
            assert!(buffer.buffered_bytes() <= 200);
            let mut out = [0u8; 60];
            let n = buffer.read(&mut out);
            collected.extend_from_slice(&out[..n]);
            if n == 0 {
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        producer.join().unwrap().unwrap();
        assert_eq!(collected.len(), 500);
        assert!(collected.iter().all(|&b| b == 7));
    }

    #[test]
    fn cancel_unblocks_a_full_append() {
        let buffer = PlaybackBuffer::new(1);
        let cancel = CancellationToken::new();

        let producer_buf = buffer.clone();
        let producer_cancel = cancel.clone();
        let producer = std::thread::spawn(move || {
            producer_buf.append(tiny_format(), &[1u8; 1000], &producer_cancel)
        });

        std::thread::sleep(Duration::from_millis(50));
        cancel.cancel();

        let result = producer.join().unwrap();
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }

    #[test]
    fn clear_keeps_the_binding() {
        let buffer = PlaybackBuffer::new(1);
        let cancel = CancellationToken::new();
        buffer.append(tiny_format(), &[0u8; 50], &cancel).unwrap();

        buffer.clear();
        assert_eq!(buffer.buffered_bytes(), 0);
        assert_eq!(buffer.format(), Some(tiny_format()));
    }
}
