//! Ordered decode strategies for AAC / transport-stream segments.
//!
//! Radio CDNs serve segments in wildly varying shapes: proper MPEG-TS,
//! bare ADTS, mislabelled containers, or raw data no probe recognizes.
//! The chain tries each strategy in order and takes the first success;
//! the last stage never fails so a segment always produces bytes.

use tracing::{debug, warn};

use crate::audio::format::WaveFormat;
use crate::common::errors::{EngineError, EngineResult};
use crate::configs::TranscoderConfig;

use super::transcode::TranscodeDecoder;
use super::{DecodedAudio, SegmentDecoder, decode_fully, ts};

/// Label of the external-transcoder stage. Sessions that decode through
/// it carry PCM whose gain the volume stage must leave untouched.
pub const TRANSCODE_LABEL: &str = "transcode";

/// The winning stage alongside its output.
#[derive(Debug)]
pub struct ChainOutcome {
    pub audio: DecodedAudio,
    pub stage: &'static str,
}

impl ChainOutcome {
    pub fn used_transcoder(&self) -> bool {
        self.stage == TRANSCODE_LABEL
    }
}

pub struct DecodeChain {
    stages: Vec<Box<dyn SegmentDecoder>>,
}

impl DecodeChain {
    pub fn new(stages: Vec<Box<dyn SegmentDecoder>>) -> Self {
        Self { stages }
    }

    /// The standard chain for AAC segments: container extraction, external
    /// transcoder, generic probe, raw pass-through.
    pub fn for_aac(transcoder: &TranscoderConfig) -> Self {
        Self::new(vec![
            Box::new(TsExtractDecoder),
            Box::new(TranscodeDecoder::new(transcoder)),
            Box::new(ProbeDecoder),
            Box::new(RawPassthrough),
        ])
    }

    /// Runs the stages in order and returns the first success. Fails only
    /// when every stage has failed.
    pub fn decode(&self, data: &[u8]) -> EngineResult<ChainOutcome> {
        let mut failures: Vec<String> = Vec::new();

        for stage in &self.stages {
            match stage.decode(data) {
                Ok(audio) => {
                    if !failures.is_empty() {
                        debug!(
                            "decode stage {} recovered the segment after {} failed attempt(s)",
                            stage.label(),
                            failures.len()
                        );
                    }
                    return Ok(ChainOutcome {
                        audio,
                        stage: stage.label(),
                    });
                }
                Err(e) => {
                    warn!("decode stage {} failed: {}", stage.label(), e);
                    failures.push(format!("{}: {}", stage.label(), e));
                }
            }
        }

        Err(EngineError::Decode(format!(
            "all decode stages failed ({})",
            failures.join("; ")
        )))
    }
}

/// Stage (a): demux the transport stream and decode the recovered ADTS.
struct TsExtractDecoder;

impl SegmentDecoder for TsExtractDecoder {
    fn label(&self) -> &'static str {
        "ts-extract"
    }

    fn decode(&self, data: &[u8]) -> EngineResult<DecodedAudio> {
        let adts = ts::extract_audio_stream(data);
        if adts.is_empty() {
            return Err(EngineError::Decode(
                "no audio elementary stream in transport data".into(),
            ));
        }
        decode_fully(adts, Some("aac"))
    }
}

/// Stage (c): let symphonia probe the raw segment with no container hint.
struct ProbeDecoder;

impl SegmentDecoder for ProbeDecoder {
    fn label(&self) -> &'static str {
        "probe"
    }

    fn decode(&self, data: &[u8]) -> EngineResult<DecodedAudio> {
        decode_fully(data.to_vec(), None)
    }
}

/// Stage (d): declare the bytes to already be PCM at the fallback format.
/// May produce audible corruption, which beats dropping the track.
struct RawPassthrough;

impl SegmentDecoder for RawPassthrough {
    fn label(&self) -> &'static str {
        "raw"
    }

    fn decode(&self, data: &[u8]) -> EngineResult<DecodedAudio> {
        // Trim to a whole sample frame so interleave alignment survives
        // across segment boundaries.
        let frame = WaveFormat::FALLBACK.block_align();
        let len = data.len() - data.len() % frame;
        Ok(DecodedAudio {
            format: WaveFormat::FALLBACK,
            pcm: data[..len].to_vec(),
        })
    }
}
