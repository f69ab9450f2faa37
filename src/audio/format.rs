use std::fmt;

/// PCM format of decoded audio held in the playback buffer.
///
/// Samples are interleaved signed 16-bit little-endian throughout the
/// engine; decoders that produce anything else convert before appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    /// Format produced by the external transcoder and assumed for raw
    /// pass-through audio.
    pub const FALLBACK: WaveFormat = WaveFormat::new(44_100, 2);

    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
        }
    }

    /// Size of one interleaved sample frame in bytes.
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.block_align()
    }

    /// Seconds of audio represented by `bytes` at this format.
    pub fn bytes_to_seconds(&self, bytes: usize) -> f64 {
        let bps = self.bytes_per_second();
        if bps == 0 {
            0.0
        } else {
            bytes as f64 / bps as f64
        }
    }

    pub fn seconds_to_bytes(&self, seconds: f64) -> usize {
        (self.bytes_per_second() as f64 * seconds) as usize
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_stereo_sizes() {
        let format = WaveFormat::new(44_100, 2);
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.bytes_per_second(), 176_400);
    }

    #[test]
    fn byte_second_conversions_round_trip() {
        let format = WaveFormat::new(48_000, 2);
        let bytes = format.seconds_to_bytes(2.5);
        assert_eq!(bytes, 480_000);
        assert!((format.bytes_to_seconds(bytes) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn mono_format() {
        let format = WaveFormat::new(22_050, 1);
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.bytes_per_second(), 44_100);
        assert_eq!(format.to_string(), "22050 Hz, 1 ch, 16-bit");
    }
}
