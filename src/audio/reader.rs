//! Buffered reader adapting an open HTTP response for the decoder.

use std::io::{Read, Seek, SeekFrom};

use symphonia::core::io::MediaSource;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::net::StreamResponse;

const DEFAULT_CHUNK: usize = 128 * 1024;
const MAX_CHUNK: usize = 1024 * 1024;
const MIN_CHUNK: usize = 4 * 1024;

/// Read-ahead size for a stream of `content_length` bytes: a tenth of the
/// body, clamped so tiny files still make progress and huge ones do not
/// pin megabytes per session.
pub fn adaptive_chunk_size(content_length: Option<u64>) -> usize {
    match content_length {
        Some(len) => ((len / 10) as usize).clamp(MIN_CHUNK, MAX_CHUNK),
        None => DEFAULT_CHUNK,
    }
}

/// Blocking reader over a live HTTP body.
///
/// Pulls the response in adaptive chunks and serves the decoder out of the
/// staging buffer. A cancelled session surfaces as `Interrupted`, which the
/// decode layer reports as cancellation rather than a stream failure.
pub struct HttpStreamReader {
    response: StreamResponse,
    cancel: CancellationToken,
    chunk: Vec<u8>,
    chunk_pos: usize,
    chunk_len: usize,
    content_length: Option<u64>,
}

impl HttpStreamReader {
    pub fn new(response: StreamResponse, cancel: CancellationToken) -> Self {
        let content_length = response.content_length();
        let chunk_size = adaptive_chunk_size(content_length);
        debug!(
            "stream reader using {} byte chunks (content_length={:?})",
            chunk_size, content_length
        );

        Self {
            response,
            cancel,
            chunk: vec![0u8; chunk_size],
            chunk_pos: 0,
            chunk_len: 0,
            content_length,
        }
    }

    fn refill(&mut self) -> std::io::Result<()> {
        self.chunk_pos = 0;
        self.chunk_len = self.response.read(&mut self.chunk)?;
        Ok(())
    }
}

impl Read for HttpStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Interrupted,
                "stream session cancelled",
            ));
        }

        if self.chunk_pos >= self.chunk_len {
            self.refill()?;
            if self.chunk_len == 0 {
                return Ok(0);
            }
        }

        let n = buf.len().min(self.chunk_len - self.chunk_pos);
        buf[..n].copy_from_slice(&self.chunk[self.chunk_pos..self.chunk_pos + n]);
        self.chunk_pos += n;
        Ok(n)
    }
}

impl Seek for HttpStreamReader {
    fn seek(&mut self, _pos: SeekFrom) -> std::io::Result<u64> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "live streams do not seek",
        ))
    }
}

impl MediaSource for HttpStreamReader {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        self.content_length
    }
}
