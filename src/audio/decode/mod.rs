use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

pub mod fallback;
pub mod transcode;
pub mod ts;

#[cfg(test)]
pub(crate) mod testdata;

use crate::audio::format::WaveFormat;
use crate::common::errors::{EngineError, EngineResult};

/// One decoded run of interleaved 16-bit little-endian PCM.
#[derive(Debug, Clone)]
pub struct PcmBlock {
    pub format: WaveFormat,
    pub bytes: Vec<u8>,
}

/// A fully decoded segment.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub format: WaveFormat,
    pub pcm: Vec<u8>,
}

/// One strategy for turning segment bytes into PCM. Strategies are tried
/// in order by [`fallback::DecodeChain`] until one of them succeeds.
pub trait SegmentDecoder: Send + Sync {
    /// Short name used in logs and in the error raised when every
    /// strategy has failed.
    fn label(&self) -> &'static str;

    fn decode(&self, data: &[u8]) -> EngineResult<DecodedAudio>;
}

/// Incremental decode pipeline: probe once, then pull PCM block by block.
///
/// Wraps symphonia's probe, format reader and codec; the direct-stream path
/// drives it against a live HTTP response, the segment path against
/// in-memory buffers.
pub struct FrameDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<i16>>,
}

impl FrameDecoder {
    /// Probes `source` and prepares the first audio track for decoding.
    ///
    /// `Ok(None)` means the source ended before a single frame could be
    /// probed; the caller decides whether that is a clean end of stream or
    /// a truncated segment.
    pub fn new(source: Box<dyn MediaSource>, hint_ext: Option<&str>) -> EngineResult<Option<Self>> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = hint_ext {
            hint.with_extension(ext);
        }

        let probed = match symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        ) {
            Ok(probed) => probed,
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(map_symphonia(e)),
        };

        let reader = probed.format;
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| EngineError::Decode("no audio track found".into()))?;

        let track_id = track.id;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(map_symphonia)?;

        Ok(Some(Self {
            reader,
            decoder,
            track_id,
            sample_buf: None,
        }))
    }

    /// Decodes packets until one yields audio. `Ok(None)` is clean end of
    /// stream; malformed packets are logged and skipped.
    pub fn next_block(&mut self) -> EngineResult<Option<PcmBlock>> {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(Error::DecodeError(e)) => {
                    warn!("skipping malformed packet: {}", e);
                    continue;
                }
                Err(Error::ResetRequired) => return Ok(None),
                Err(e) => return Err(map_symphonia(e)),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(audio_buf) => {
                    let spec = *audio_buf.spec();
                    let mut buf = match self.sample_buf.take() {
                        Some(buf) => buf,
                        None => SampleBuffer::<i16>::new(audio_buf.capacity() as u64, spec),
                    };
                    buf.copy_interleaved_ref(audio_buf);

                    let format = WaveFormat::new(spec.rate, spec.channels.count() as u16);
                    let mut bytes = vec![0u8; buf.samples().len() * 2];
                    LittleEndian::write_i16_into(buf.samples(), &mut bytes);
                    self.sample_buf = Some(buf);

                    if bytes.is_empty() {
                        continue;
                    }
                    return Ok(Some(PcmBlock { format, bytes }));
                }
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(Error::DecodeError(e)) => {
                    warn!("skipping malformed packet: {}", e);
                    continue;
                }
                Err(e) => return Err(map_symphonia(e)),
            }
        }
    }
}

/// Decodes an entire in-memory segment, concatenating blocks and requiring
/// a stable PCM format throughout.
pub fn decode_fully(data: Vec<u8>, hint_ext: Option<&str>) -> EngineResult<DecodedAudio> {
    let byte_len = data.len();
    let mut decoder = match FrameDecoder::new(Box::new(Cursor::new(data)), hint_ext)? {
        Some(decoder) => decoder,
        None => {
            return Err(EngineError::Decode(format!(
                "segment too short to probe ({byte_len} bytes)"
            )));
        }
    };

    let mut format: Option<WaveFormat> = None;
    let mut pcm = Vec::new();
    while let Some(block) = decoder.next_block()? {
        match format {
            None => format = Some(block.format),
            Some(f) if f == block.format => {}
            Some(f) => {
                return Err(EngineError::Decode(format!(
                    "format changed inside a segment: {f} -> {}",
                    block.format
                )));
            }
        }
        pcm.extend_from_slice(&block.bytes);
    }

    let format = format.ok_or_else(|| EngineError::Decode("segment produced no audio".into()))?;
    Ok(DecodedAudio { format, pcm })
}

fn map_symphonia(e: Error) -> EngineError {
    match e {
        Error::IoError(io) if io.kind() == std::io::ErrorKind::Interrupted => {
            EngineError::Cancelled
        }
        Error::IoError(io) => EngineError::Network(format!("stream read: {io}")),
        other => EngineError::Decode(other.to_string()),
    }
}
