//! Decode stage backed by an external ffmpeg binary.
//!
//! Segments that symphonia cannot probe get written to a temp file and
//! handed to ffmpeg, which emits interleaved 16-bit stereo PCM at
//! 44.1 kHz on stdout.

use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::audio::format::WaveFormat;
use crate::common::errors::{EngineError, EngineResult};
use crate::configs::TranscoderConfig;

use super::{DecodedAudio, SegmentDecoder};

static AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Removes the backing file when dropped so failed runs do not leave
/// segment dumps behind in the temp directory.
struct TempInput {
    path: PathBuf,
}

impl TempInput {
    fn create(data: &[u8]) -> EngineResult<Self> {
        let suffix: u64 = rand::random();
        let path = std::env::temp_dir().join(format!("legato_{:016x}.seg", suffix));
        let mut file = std::fs::File::create(&path)?;
        file.write_all(data)?;
        Ok(Self { path })
    }
}

impl Drop for TempInput {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub struct TranscodeDecoder {
    binary: String,
    enabled: bool,
}

impl TranscodeDecoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            enabled: config.enabled,
        }
    }

    /// Probes the binary once per process; later calls reuse the answer.
    fn available(&self) -> bool {
        *AVAILABLE.get_or_init(|| {
            match Command::new(&self.binary).arg("-version").output() {
                Ok(out) => out.status.success(),
                Err(e) => {
                    warn!("transcoder binary {} unavailable: {}", self.binary, e);
                    false
                }
            }
        })
    }
}

impl SegmentDecoder for TranscodeDecoder {
    fn label(&self) -> &'static str {
        "transcode"
    }

    fn decode(&self, data: &[u8]) -> EngineResult<DecodedAudio> {
        if !self.enabled {
            return Err(EngineError::Decode("transcoder disabled".into()));
        }
        if !self.available() {
            return Err(EngineError::Decode(format!(
                "transcoder binary {} not found",
                self.binary
            )));
        }

        let input = TempInput::create(data)?;
        let input_path = input.path.to_string_lossy().into_owned();

        let output = Command::new(&self.binary)
            .args([
                "-v", "error", "-i", &input_path, "-vn", "-f", "s16le", "-ar", "44100",
                "-ac", "2", "-",
            ])
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("no error output");
            return Err(EngineError::Decode(format!("transcode failed: {}", detail)));
        }

        if output.stdout.is_empty() {
            return Err(EngineError::Decode("transcode produced no audio".into()));
        }

        debug!(
            "transcoded {} segment bytes into {} PCM bytes",
            data.len(),
            output.stdout.len()
        );

        Ok(DecodedAudio {
            format: WaveFormat::FALLBACK,
            pcm: output.stdout,
        })
    }
}
