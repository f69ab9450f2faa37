use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audio::{self, PlaybackBuffer, StreamContext};
use crate::common::errors::{EngineError, EngineResult};
use crate::configs::Config;
use crate::net::StreamClient;

/// URLs carrying an `.m3u8` marker run the HLS pipeline; everything else
/// is streamed and decoded directly.
fn is_playlist_url(url: &str) -> bool {
    url.contains(".m3u8")
}

/// One stream's producer side: a worker thread filling the shared buffer,
/// plus the handles the controller needs to watch and stop it.
pub struct PlaySession {
    pub buffer: Arc<PlaybackBuffer>,
    cancel: CancellationToken,
    result_rx: flume::Receiver<EngineResult<()>>,
    done: bool,
    fully_consumed: Arc<AtomicBool>,
    transcoder_fallback: Arc<AtomicBool>,
    id: Uuid,
}

impl PlaySession {
    /// Starts the producer thread for `url` and returns immediately.
    /// The worker's exit status is retrieved later through `poll_result`.
    pub fn spawn(config: &Config, client: StreamClient, url: &str) -> Self {
        let buffer = PlaybackBuffer::new(config.playback.max_buffered_seconds);
        let cancel = CancellationToken::new();
        let fully_consumed = Arc::new(AtomicBool::new(false));
        let transcoder_fallback = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = flume::bounded(1);
        let id = Uuid::new_v4();

        let ctx = StreamContext {
            client,
            retry: config.retry.clone(),
            transcoder: config.transcoder.clone(),
            fill_delay: Duration::from_millis(config.playback.fill_delay_ms),
            buffer: buffer.clone(),
            cancel: cancel.clone(),
            transcoder_fallback: transcoder_fallback.clone(),
        };

        let worker_url = url.to_string();
        let consumed = fully_consumed.clone();
        let worker_tx = result_tx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("stream-{}", &id.to_string()[..8]))
            .spawn(move || {
                let result = if is_playlist_url(&worker_url) {
                    audio::hls::pipeline::run(&ctx, &worker_url)
                } else {
                    audio::direct::run(&ctx, &worker_url)
                };
                // The consumed flag must be visible before the result is.
                if result.is_ok() {
                    consumed.store(true, Ordering::Release);
                }
                let _ = worker_tx.send(result);
            });
        if let Err(e) = spawned {
            let _ = result_tx.send(Err(EngineError::Io(e)));
        }

        debug!("session {} started for {}", id, url);
        Self {
            buffer,
            cancel,
            result_rx,
            done: false,
            fully_consumed,
            transcoder_fallback,
            id,
        }
    }

    /// Non-blocking check for the worker's exit status. Yields the result
    /// exactly once; later calls return `None`.
    pub fn poll_result(&mut self) -> Option<EngineResult<()>> {
        if self.done {
            return None;
        }
        match self.result_rx.try_recv() {
            Ok(result) => {
                self.done = true;
                Some(result)
            }
            Err(flume::TryRecvError::Empty) => None,
            Err(flume::TryRecvError::Disconnected) => {
                self.done = true;
                Some(Err(EngineError::Decode(
                    "stream worker exited without a result".into(),
                )))
            }
        }
    }

    /// Whether the producer delivered the entire stream into the buffer.
    pub fn is_fully_consumed(&self) -> bool {
        self.fully_consumed.load(Ordering::Acquire)
    }

    /// Set once any segment of this stream was decoded through the
    /// external transcoder.
    pub fn transcoder_fallback_flag(&self) -> Arc<AtomicBool> {
        self.transcoder_fallback.clone()
    }

    /// Cancels the worker and waits for it to acknowledge, bounded so a
    /// wedged network call cannot stall the control surface.
    pub fn cancel_and_wait(&mut self, grace: Duration) {
        self.cancel.cancel();
        if self.done {
            return;
        }
        match self.result_rx.recv_timeout(grace) {
            Ok(result) => {
                self.done = true;
                match result {
                    Ok(()) | Err(EngineError::Cancelled) => {}
                    Err(err) => debug!("session {} ended with {} during teardown", self.id, err),
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => {
                warn!("session {} worker did not stop within {:?}", self.id, grace);
            }
            Err(flume::RecvTimeoutError::Disconnected) => {
                self.done = true;
            }
        }
    }
}

impl Drop for PlaySession {
    // Covers sessions dropped without an explicit stop; the worker sees
    // the token on its next wait and unwinds.
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
