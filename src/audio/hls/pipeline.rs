//! Segment pipeline: playlist to PCM for one HLS track session.

use tracing::{debug, info};

use crate::audio::StreamContext;
use crate::audio::decode::fallback::DecodeChain;
use crate::audio::decode::decode_fully;
use crate::audio::hls::crypt::{SegmentCipher, sequence_iv};
use crate::audio::hls::parser::{HlsSegment, StreamCodec, parse_media_playlist};
use crate::common::cancel::wait_cancellable;
use crate::common::errors::{EngineError, EngineResult};
use crate::net::retry_fetch;

/// Streams every segment of `playlist_url` into the session buffer.
///
/// Runs on the producer thread and returns once the final segment has been
/// appended; an `Ok` return is the fully-consumed signal. The first error
/// aborts the remaining segments.
pub fn run(ctx: &StreamContext, playlist_url: &str) -> EngineResult<()> {
    let text = retry_fetch(&ctx.retry, &ctx.cancel, "playlist fetch", || {
        ctx.client.get_text(playlist_url)
    })?;
    let playlist = parse_media_playlist(&text, playlist_url)?;

    // The key is fetched exactly once per track. A failure here is fatal
    // for the whole session since no segment could be decrypted anyway.
    let key = match &playlist.key_url {
        Some(key_url) => {
            let bytes = retry_fetch(&ctx.retry, &ctx.cancel, "key fetch", || {
                ctx.client.get_bytes(key_url)
            })
            .map_err(|e| match e {
                EngineError::Cancelled => EngineError::Cancelled,
                other => EngineError::Key(other.to_string()),
            })?;
            Some(bytes)
        }
        None => None,
    };

    let chain = match playlist.codec {
        StreamCodec::Aac => Some(DecodeChain::for_aac(&ctx.transcoder)),
        StreamCodec::Mp3 => None,
    };

    info!(
        "streaming {} segments ({:?}, {})",
        playlist.segments.len(),
        playlist.codec,
        if key.is_some() { "encrypted" } else { "cleartext" }
    );

    for segment in &playlist.segments {
        if ctx.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        // Hold fetching while the buffer is close to capacity so a slow
        // consumer does not force the producer to sit in a blocked append.
        while ctx.buffer.is_nearly_full() {
            if !wait_cancellable(&ctx.cancel, ctx.fill_delay) {
                return Err(EngineError::Cancelled);
            }
        }

        let mut data = retry_fetch(&ctx.retry, &ctx.cancel, "segment fetch", || {
            ctx.client.get_bytes(&segment.url)
        })?
        .to_vec();

        if let Some(key) = &key {
            decrypt_segment(key, segment, &mut data)?;
        }

        let audio = match &chain {
            None => decode_fully(data, Some("mp3"))?,
            Some(chain) => {
                let outcome = chain.decode(&data)?;
                if outcome.used_transcoder() {
                    ctx.mark_transcoder_fallback();
                }
                outcome.audio
            }
        };

        debug!(
            "segment {} decoded: {} PCM bytes at {}",
            segment.sequence,
            audio.pcm.len(),
            audio.format
        );
        ctx.buffer.append(audio.format, &audio.pcm, &ctx.cancel)?;
    }

    Ok(())
}

fn decrypt_segment(key: &[u8], segment: &HlsSegment, data: &mut [u8]) -> EngineResult<()> {
    let iv = segment.iv.unwrap_or_else(|| sequence_iv(segment.sequence));
    let cipher = SegmentCipher::new(key, iv)?;
    cipher.apply(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use byteorder::{ByteOrder, LittleEndian};
    use tokio_util::sync::CancellationToken;

    use crate::audio::buffer::PlaybackBuffer;
    use crate::audio::decode::testdata::pcm_wav;
    use crate::audio::format::WaveFormat;
    use crate::configs::{HttpConfig, RetryConfig, TranscoderConfig};
    use crate::net::StreamClient;
    use crate::net::testserver::{Reply, TestServer};

    fn test_context(buffer: Arc<PlaybackBuffer>) -> StreamContext {
        let http = HttpConfig {
            user_agent: "legato-test/1.0".to_string(),
            referer: None,
            timeout_secs: 5,
        };
        StreamContext {
            client: StreamClient::new(&http).unwrap(),
            retry: RetryConfig {
                max_attempts: 2,
                base_delay_ms: 1,
            },
            transcoder: TranscoderConfig {
                binary: "legato-test-no-such-transcoder".to_string(),
                enabled: false,
            },
            fill_delay: Duration::from_millis(1),
            buffer,
            cancel: CancellationToken::new(),
            transcoder_fallback: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    fn drain(buffer: &PlaybackBuffer) -> Vec<u8> {
        let mut out = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = buffer.read(&mut chunk);
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&chunk[..n]);
        }
    }

    #[test]
    fn cleartext_playlist_streams_every_segment() {
        let first: Vec<i16> = (0..800).map(|i| (i % 311) as i16).collect();
        let second: Vec<i16> = (0..800).map(|i| (i % 127) as i16 - 64).collect();
        let seg_a = pcm_wav(&first, 8_000, 1);
        let seg_b = pcm_wav(&second, 8_000, 1);

        let server = TestServer::start(move |req| match req.path.as_str() {
            "/radio/list.m3u8" => Reply::ok(
                b"#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:3\n#EXTINF:10,\nseg0.wav\n#EXTINF:10,\nseg1.wav\n"
                    .to_vec(),
            ),
            "/radio/seg0.wav" => Reply::ok(seg_a.clone()),
            "/radio/seg1.wav" => Reply::ok(seg_b.clone()),
            _ => Reply::status(404),
        });

        let buffer = PlaybackBuffer::new(20);
        let ctx = test_context(buffer.clone());

        run(&ctx, &server.url("/radio/list.m3u8")).unwrap();

        assert_eq!(buffer.format(), Some(WaveFormat::new(8_000, 1)));
        let mut expected = vec![0u8; 1_600 * 2];
        LittleEndian::write_i16_into(&first, &mut expected[..1_600]);
        LittleEndian::write_i16_into(&second, &mut expected[1_600..]);
        assert_eq!(drain(&buffer), expected);
        assert!(!ctx.transcoder_fallback.load(Ordering::SeqCst));
    }

    #[test]
    fn encrypted_segments_decrypt_with_sequence_ivs() {
        let key = [0x42u8; 16];
        // Plaintext that no demuxer or probe recognizes so the raw stage
        // wins and the buffer receives the decrypted bytes unchanged.
        let plain_a: Vec<u8> = (0..192u32)
            .map(|i| {
                let b = (i * 3 % 251) as u8;
                if b == 0x47 { 0x48 } else { b }
            })
            .collect();
        let plain_b: Vec<u8> = plain_a.iter().map(|b| b ^ 0x55).map(|b| if b == 0x47 { 0x48 } else { b }).collect();

        let mut enc_a = plain_a.clone();
        SegmentCipher::new(&key, sequence_iv(7)).unwrap().apply(&mut enc_a);
        let mut enc_b = plain_b.clone();
        SegmentCipher::new(&key, sequence_iv(8)).unwrap().apply(&mut enc_b);

        let server = TestServer::start(move |req| match req.path.as_str() {
            "/live/list.m3u8" => Reply::ok(
                b"#EXTM3U\n#EXT-X-MEDIA-SEQUENCE:7\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n#EXTINF:6,\nseg7.ts\n#EXTINF:6,\nseg8.ts\n"
                    .to_vec(),
            ),
            "/live/key.bin" => Reply::ok(key.to_vec()),
            "/live/seg7.ts" => Reply::ok(enc_a.clone()),
            "/live/seg8.ts" => Reply::ok(enc_b.clone()),
            _ => Reply::status(404),
        });

        let buffer = PlaybackBuffer::new(20);
        let ctx = test_context(buffer.clone());

        run(&ctx, &server.url("/live/list.m3u8")).unwrap();

        // `.ts` extension classifies the stream as AAC; the chain falls
        // through to raw pass-through at the fallback format.
        assert_eq!(buffer.format(), Some(WaveFormat::FALLBACK));
        let mut expected = plain_a.clone();
        expected.extend_from_slice(&plain_b);
        assert_eq!(drain(&buffer), expected);
        assert!(!ctx.transcoder_fallback.load(Ordering::SeqCst));
    }

    #[test]
    fn key_failure_is_fatal_before_any_segment_fetch() {
        let server = TestServer::start(move |req| match req.path.as_str() {
            "/list.m3u8" => Reply::ok(
                b"#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\nseg0.ts\n".to_vec(),
            ),
            "/key.bin" => Reply::status(403),
            "/seg0.ts" => panic!("segment must not be fetched when the key is unavailable"),
            _ => Reply::status(404),
        });

        let buffer = PlaybackBuffer::new(20);
        let ctx = test_context(buffer.clone());

        let err = run(&ctx, &server.url("/list.m3u8")).unwrap_err();
        assert!(matches!(err, EngineError::Key(_)), "got {err:?}");
        assert_eq!(buffer.buffered_bytes(), 0);
    }

    #[test]
    fn missing_segment_aborts_the_pipeline() {
        let samples: Vec<i16> = (0..400).map(|i| i as i16).collect();
        let seg = pcm_wav(&samples, 8_000, 1);

        let server = TestServer::start(move |req| match req.path.as_str() {
            "/list.m3u8" => Reply::ok(b"#EXTM3U\nseg0.wav\ngone.wav\n".to_vec()),
            "/seg0.wav" => Reply::ok(seg.clone()),
            _ => Reply::status(404),
        });

        let buffer = PlaybackBuffer::new(20);
        let ctx = test_context(buffer.clone());

        let err = run(&ctx, &server.url("/list.m3u8")).unwrap_err();
        assert!(matches!(err, EngineError::Resource(_)), "got {err:?}");
        // The first segment made it into the buffer before the abort.
        assert_eq!(buffer.buffered_bytes(), 800);
    }

    #[test]
    fn cancelled_session_stops_without_fetching() {
        let server = TestServer::start(|_| Reply::ok(b"#EXTM3U\nseg0.wav\n".to_vec()));
        let buffer = PlaybackBuffer::new(20);
        let ctx = test_context(buffer);
        ctx.cancel.cancel();

        let err = run(&ctx, &server.url("/list.m3u8")).unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }
}
