//! Encrypted HLS ingestion: playlist parsing, AES-128 segment decryption
//! and the sequential fetch/decrypt/decode pipeline.

pub mod crypt;
pub mod parser;
pub mod pipeline;

pub use crypt::{SegmentCipher, sequence_iv};
pub use parser::{HlsSegment, MediaPlaylist, StreamCodec, parse_media_playlist};
