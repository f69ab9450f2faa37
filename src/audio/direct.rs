//! Direct stream path: one HTTP body decoded frame by frame.

use tracing::info;

use crate::audio::StreamContext;
use crate::audio::decode::FrameDecoder;
use crate::audio::reader::HttpStreamReader;
use crate::common::cancel::wait_cancellable;
use crate::common::errors::{EngineError, EngineResult};
use crate::net::retry_fetch;

/// Streams `url` into the session buffer until the body ends.
///
/// Runs on the producer thread; an `Ok` return is the fully-consumed
/// signal. Clean truncation of the body counts as end of stream, a
/// transport failure mid-body does not.
pub fn run(ctx: &StreamContext, url: &str) -> EngineResult<()> {
    let response = retry_fetch(&ctx.retry, &ctx.cancel, "stream open", || {
        ctx.client.open_stream(url)
    })?;

    info!(
        "direct stream opened: {} (content_length={:?})",
        url,
        response.content_length()
    );

    let reader = HttpStreamReader::new(response, ctx.cancel.clone());
    let mut decoder = match FrameDecoder::new(Box::new(reader), Some("mp3"))? {
        Some(decoder) => decoder,
        // The body ended before a single frame could be probed.
        None => return Ok(()),
    };

    loop {
        if ctx.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        while ctx.buffer.is_nearly_full() {
            if !wait_cancellable(&ctx.cancel, ctx.fill_delay) {
                return Err(EngineError::Cancelled);
            }
        }

        match decoder.next_block()? {
            Some(block) => ctx.buffer.append(block.format, &block.bytes, &ctx.cancel)?,
            None => return Ok(()),
        }
    }
}
