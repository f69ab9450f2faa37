use tracing::{debug, warn};

use crate::audio::hls::crypt::parse_iv_hex;
use crate::common::errors::{EngineError, EngineResult};

/// Compressed codec carried by the playlist's segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCodec {
    Mp3,
    Aac,
}

#[derive(Debug, Clone)]
pub struct HlsSegment {
    pub url: String,
    /// Media sequence number; derives the IV when the key directive does
    /// not carry an explicit one.
    pub sequence: u64,
    /// Explicit IV from the most recent key directive.
    pub iv: Option<[u8; 16]>,
}

#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    pub segments: Vec<HlsSegment>,
    /// Absolute key URI; `None` means the stream is cleartext.
    pub key_url: Option<String>,
    pub codec: StreamCodec,
}

/// Parses a media playlist into its ordered segment list.
///
/// Handles the directives the pipeline acts on (`#EXT-X-KEY`,
/// `#EXT-X-MEDIA-SEQUENCE`, a `CODECS` attribute on any tag line); every
/// other `#`-line is skipped and every non-comment line is a segment URI,
/// resolved against `base_url`.
pub fn parse_media_playlist(text: &str, base_url: &str) -> EngineResult<MediaPlaylist> {
    let mut segments = Vec::new();
    let mut key_url: Option<String> = None;
    let mut current_iv: Option<[u8; 16]> = None;
    let mut sequence = 0u64;
    let mut codecs_attr: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("#EXT-X-KEY:") {
            if let Some(uri) = extract_attr_str(line, "URI") {
                key_url = Some(resolve_url(base_url, &uri));
            }
            current_iv = match extract_attr_str(line, "IV") {
                Some(raw) => Some(parse_iv_hex(&raw)?),
                None => None,
            };
        } else if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            sequence = rest.trim().parse().unwrap_or_else(|_| {
                warn!("unparseable media sequence {:?}, starting at 0", rest);
                0
            });
        } else if line.starts_with('#') {
            if codecs_attr.is_none() {
                codecs_attr = extract_attr_str(line, "CODECS");
            }
        } else {
            segments.push(HlsSegment {
                url: resolve_url(base_url, line),
                sequence,
                iv: current_iv,
            });
            sequence += 1;
        }
    }

    if segments.is_empty() {
        return Err(EngineError::EmptyPlaylist(base_url.to_string()));
    }

    let codec = detect_codec(codecs_attr.as_deref(), &segments[0].url);
    debug!(
        "parsed media playlist: {} segments, codec {:?}, encrypted: {}",
        segments.len(),
        codec,
        key_url.is_some()
    );

    Ok(MediaPlaylist {
        segments,
        key_url,
        codec,
    })
}

fn detect_codec(codecs: Option<&str>, first_segment_url: &str) -> StreamCodec {
    if let Some(codecs) = codecs {
        let lower = codecs.to_ascii_lowercase();
        // mp4a.40.34 is MPEG-1 layer III despite the mp4a registration.
        if lower.contains("mp3") || lower.contains("mp4a.40.34") {
            return StreamCodec::Mp3;
        }
        if lower.contains("mp4a") || lower.contains("aac") {
            return StreamCodec::Aac;
        }
    }
    // Without a codec attribute, transport-stream segments default to AAC.
    let path = first_segment_url
        .split(['?', '#'])
        .next()
        .unwrap_or(first_segment_url);
    if path.to_ascii_lowercase().ends_with(".ts") {
        StreamCodec::Aac
    } else {
        StreamCodec::Mp3
    }
}

fn extract_attr_str(line: &str, key: &str) -> Option<String> {
    let key_eq = format!("{}=", key);
    // Attributes follow #TAG: or a comma
    let pos = line
        .find(&format!(":{}", key_eq))
        .map(|p| p + 1)
        .or_else(|| line.find(&format!(",{}", key_eq)).map(|p| p + 1))?;

    let rest = &line[pos + key_eq.len()..];

    if rest.starts_with('"') {
        let end = rest[1..].find('"')?;
        Some(rest[1..1 + end].to_string())
    } else {
        let end = rest.find(',').unwrap_or(rest.len());
        Some(rest[..end].trim().to_string())
    }
}

/// Resolve a (possibly relative) URI against the playlist URL.
fn resolve_url(base: &str, maybe_relative: &str) -> String {
    if maybe_relative.starts_with("http://") || maybe_relative.starts_with("https://") {
        return maybe_relative.to_string();
    }

    // Absolute path → keep scheme and host, replace the path.
    if maybe_relative.starts_with('/') {
        if let Some(scheme_end) = base.find("://") {
            let host_start = scheme_end + 3;
            let host_end = base[host_start..]
                .find('/')
                .map(|p| host_start + p)
                .unwrap_or(base.len());
            return format!("{}{}", &base[..host_end], maybe_relative);
        }
    }

    // Relative path → strip the last path component from base and append.
    let base_dir = base.rfind('/').map(|i| &base[..=i]).unwrap_or(base);
    format!("{}{}", base_dir, maybe_relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://cdn.example.com/audio/list.m3u8";

    #[test]
    fn encrypted_playlist_with_sequence_and_iv() {
        let text = "\
#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:5
#EXT-X-KEY:METHOD=AES-128,URI=\"keys/track.key\",IV=0x000102030405060708090a0b0c0d0e0f
#EXTINF:10.0,
seg0.ts
#EXTINF:10.0,
seg1.ts
#EXTINF:9.5,
seg2.ts
#EXT-X-ENDLIST
";
        let playlist = parse_media_playlist(text, BASE).unwrap();

        assert_eq!(playlist.segments.len(), 3);
        assert_eq!(
            playlist.segments[0].url,
            "http://cdn.example.com/audio/seg0.ts"
        );
        assert_eq!(
            playlist.segments[2].url,
            "http://cdn.example.com/audio/seg2.ts"
        );
        let sequences: Vec<u64> = playlist.segments.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![5, 6, 7]);

        assert_eq!(
            playlist.key_url.as_deref(),
            Some("http://cdn.example.com/audio/keys/track.key")
        );
        let iv = playlist.segments[0].iv.unwrap();
        assert_eq!(iv[1], 0x01);
        assert_eq!(iv[15], 0x0f);

        assert_eq!(playlist.codec, StreamCodec::Aac);
    }

    #[test]
    fn playlist_without_segments_is_an_error() {
        let text = "#EXTM3U\n#EXT-X-TARGETDURATION:10\n#EXT-X-ENDLIST\n";
        let err = parse_media_playlist(text, BASE).unwrap_err();
        assert!(matches!(err, EngineError::EmptyPlaylist(_)));
    }

    #[test]
    fn key_without_iv_leaves_sequence_derivation() {
        let text = "\
#EXTM3U
#EXT-X-KEY:METHOD=AES-128,URI=\"https://keys.example.com/k1\"
#EXTINF:4.0,
a.ts
";
        let playlist = parse_media_playlist(text, BASE).unwrap();
        assert_eq!(
            playlist.key_url.as_deref(),
            Some("https://keys.example.com/k1")
        );
        assert!(playlist.segments[0].iv.is_none());
        assert_eq!(playlist.segments[0].sequence, 0);
    }

    #[test]
    fn cleartext_playlist_has_no_key() {
        let text = "#EXTM3U\n#EXTINF:4.0,\nchunk.mp3\n";
        let playlist = parse_media_playlist(text, BASE).unwrap();
        assert!(playlist.key_url.is_none());
        assert_eq!(playlist.codec, StreamCodec::Mp3);
    }

    #[test]
    fn codec_attribute_outranks_extension() {
        let aac = "#EXT-X-STREAM-INF:BANDWIDTH=96000,CODECS=\"mp4a.40.2\"\nchunk.mp3\n";
        assert_eq!(
            parse_media_playlist(aac, BASE).unwrap().codec,
            StreamCodec::Aac
        );

        // The mp4a.40.34 registration is MPEG layer III.
        let mp3_in_mp4a = "#EXT-X-STREAM-INF:CODECS=\"mp4a.40.34\"\nchunk.ts\n";
        assert_eq!(
            parse_media_playlist(mp3_in_mp4a, BASE).unwrap().codec,
            StreamCodec::Mp3
        );

        let plain_mp3 = "#EXT-X-STREAM-INF:CODECS=\"mp3\"\nchunk.ts\n";
        assert_eq!(
            parse_media_playlist(plain_mp3, BASE).unwrap().codec,
            StreamCodec::Mp3
        );
    }

    #[test]
    fn extension_fallback_ignores_query_strings() {
        let text = "#EXTM3U\n#EXTINF:4.0,\nseg.ts?token=abc\n";
        assert_eq!(
            parse_media_playlist(text, BASE).unwrap().codec,
            StreamCodec::Aac
        );
    }

    #[test]
    fn url_resolution_forms() {
        let text = "\
#EXTM3U
#EXTINF:4.0,
https://other.example.net/abs.ts
#EXTINF:4.0,
/root-rel/seg.ts
#EXTINF:4.0,
sub/dir/seg.ts
";
        let playlist = parse_media_playlist(text, BASE).unwrap();
        assert_eq!(playlist.segments[0].url, "https://other.example.net/abs.ts");
        assert_eq!(
            playlist.segments[1].url,
            "http://cdn.example.com/root-rel/seg.ts"
        );
        assert_eq!(
            playlist.segments[2].url,
            "http://cdn.example.com/audio/sub/dir/seg.ts"
        );
    }

    #[test]
    fn later_key_directive_replaces_the_iv() {
        let text = "\
#EXTM3U
#EXT-X-KEY:METHOD=AES-128,URI=\"k\",IV=0x000102030405060708090a0b0c0d0e0f
#EXTINF:4.0,
a.ts
#EXT-X-KEY:METHOD=AES-128,URI=\"k\"
#EXTINF:4.0,
b.ts
";
        let playlist = parse_media_playlist(text, BASE).unwrap();
        assert!(playlist.segments[0].iv.is_some());
        assert!(playlist.segments[1].iv.is_none());
        assert_eq!(playlist.segments[1].sequence, 1);
    }

    #[test]
    fn malformed_iv_fails_parsing() {
        let text = "#EXT-X-KEY:METHOD=AES-128,URI=\"k\",IV=0xnothex\n#EXTINF:4,\na.ts\n";
        let err = parse_media_playlist(text, BASE).unwrap_err();
        assert!(matches!(err, EngineError::Decrypt(_)));
    }
}
