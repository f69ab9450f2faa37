use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::events::{EventBus, PlayerEvent};
use super::queue::TrackQueue;
use super::session::PlaySession;
use super::sink::OutputSink;
use super::state::PlaybackState;
use super::volume::{PcmSource, VolumeControl, VolumeSource};
use crate::common::errors::{EngineError, EngineResult};
use crate::configs::Config;
use crate::net::StreamClient;
use crate::types::Track;

/// Bound on how long `stop` and superseding `play` calls wait for the old
/// producer to observe cancellation.
const TEARDOWN_GRACE: Duration = Duration::from_secs(2);

type SinkFactory = Box<dyn Fn() -> Box<dyn OutputSink> + Send + Sync>;

/// Sessions accept HTTP(S) URLs only; anything else is refused before a
/// producer thread is spawned.
fn validate_url(url: &str) -> EngineResult<()> {
    let lower = url.to_ascii_lowercase();
    if (lower.starts_with("http://") && url.len() > 7)
        || (lower.starts_with("https://") && url.len() > 8)
    {
        Ok(())
    } else {
        Err(EngineError::InvalidUrl(url.to_string()))
    }
}

/// The playback engine's control surface.
///
/// One `Player` owns at most one live stream session and one output device.
/// All methods are callable from any thread; a periodic tick (started with
/// [`Player::spawn_poll_task`]) drives the watermark transitions and
/// end-of-stream auto-advance.
pub struct Player {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    config: Config,
    client: StreamClient,
    state: AtomicU8,
    volume: Arc<VolumeControl>,
    events: EventBus,
    sink_factory: SinkFactory,
    core: Mutex<PlayerCore>,
}

/// State that tick and the control calls mutate under one lock.
struct PlayerCore {
    session: Option<PlaySession>,
    device: Option<Box<dyn OutputSink>>,
    queue: TrackQueue,
}

impl Player {
    /// Builds a player that paces playback on a [`super::sink::NullSink`].
    pub fn new(config: Config) -> EngineResult<Self> {
        Self::with_sink(config, || Box::new(super::sink::NullSink::new()))
    }

    /// Builds a player with a custom output device factory. The factory is
    /// invoked once per stream, at the first high-watermark crossing.
    pub fn with_sink<F>(config: Config, sink_factory: F) -> EngineResult<Self>
    where
        F: Fn() -> Box<dyn OutputSink> + Send + Sync + 'static,
    {
        let client = StreamClient::new(&config.http)?;
        Ok(Self {
            inner: Arc::new(PlayerInner {
                config,
                client,
                state: AtomicU8::new(PlaybackState::Stopped as u8),
                volume: Arc::new(VolumeControl::default()),
                events: EventBus::new(),
                sink_factory: Box::new(sink_factory),
                core: Mutex::new(PlayerCore {
                    session: None,
                    device: None,
                    queue: TrackQueue::new(),
                }),
            }),
        })
    }

    /// Starts streaming `url`, superseding any active session. The state is
    /// Buffering when this returns.
    pub fn play(&self, url: &str) -> EngineResult<()> {
        self.inner.play(url)
    }

    /// Cancels the session and releases the device. Safe to call twice.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn pause(&self) {
        self.inner.pause();
    }

    pub fn resume(&self) {
        self.inner.resume();
    }

    /// Plays the next queued track, wrapping past the end of the list.
    pub fn next(&self) -> EngineResult<()> {
        self.inner.step_queue(true)
    }

    /// Plays the previous queued track, wrapping before the start.
    pub fn previous(&self) -> EngineResult<()> {
        self.inner.step_queue(false)
    }

    /// Replaces the queue. Playback of the current session continues; the
    /// new list takes effect on the next advance.
    pub fn set_tracks(&self, tracks: Vec<Track>) {
        let mut core = self.inner.core.lock();
        info!("queue replaced: {} tracks", tracks.len());
        core.queue.set_tracks(tracks);
    }

    pub fn set_volume(&self, gain: f32) {
        self.inner.volume.set(gain);
    }

    pub fn volume(&self) -> f32 {
        self.inner.volume.get()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.state()
    }

    /// Seconds of decoded audio currently waiting in the buffer.
    pub fn buffered_seconds(&self) -> f64 {
        let core = self.inner.core.lock();
        core.session
            .as_ref()
            .map_or(0.0, |s| s.buffer.buffered_seconds())
    }

    pub fn subscribe(&self) -> flume::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }

    /// Starts the watermark poll loop on the tokio runtime. The task holds
    /// a weak handle and exits on its own once the player is dropped.
    pub fn spawn_poll_task(&self) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = Duration::from_millis(self.inner.config.playback.poll_interval_ms.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                inner.tick();
            }
        })
    }
}

impl PlayerInner {
    fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, next: PlaybackState) {
        let prev = self.state.swap(next as u8, Ordering::AcqRel);
        if prev != next as u8 {
            debug!("player state {} -> {}", PlaybackState::from_u8(prev), next);
            self.events.emit(PlayerEvent::StateChanged(next));
        }
    }

    fn play(&self, url: &str) -> EngineResult<()> {
        validate_url(url)?;
        let mut core = self.core.lock();
        let index = core.queue.position_of(url);
        self.play_locked(&mut core, url, index);
        Ok(())
    }

    fn play_locked(&self, core: &mut PlayerCore, url: &str, index: Option<usize>) {
        self.teardown_locked(core);
        core.queue.set_cursor(index);
        core.session = Some(PlaySession::spawn(&self.config, self.client.clone(), url));
        info!("playing {}", url);
        self.set_state(PlaybackState::Buffering);
        self.events.emit(PlayerEvent::TrackChanged {
            index,
            url: url.to_string(),
        });
    }

    fn stop(&self) {
        let mut core = self.core.lock();
        self.teardown_locked(&mut core);
    }

    /// Cancels the active session, clears the buffer and releases the
    /// output device. A no-op when already stopped.
    fn teardown_locked(&self, core: &mut PlayerCore) {
        if let Some(mut session) = core.session.take() {
            session.cancel_and_wait(TEARDOWN_GRACE);
            session.buffer.clear();
        }
        if let Some(mut device) = core.device.take() {
            device.stop();
            device.dispose();
        }
        self.set_state(PlaybackState::Stopped);
    }

    fn pause(&self) {
        let mut core = self.core.lock();
        match self.state() {
            PlaybackState::Playing | PlaybackState::Buffering => {
                if let Some(device) = core.device.as_mut() {
                    device.pause();
                }
                self.set_state(PlaybackState::Paused);
            }
            state => debug!("pause ignored while {}", state),
        }
    }

    /// Re-enters Buffering; the next tick starts the device again once the
    /// high watermark is met.
    fn resume(&self) {
        let _core = self.core.lock();
        if self.state() == PlaybackState::Paused {
            self.set_state(PlaybackState::Buffering);
        } else {
            debug!("resume ignored while {}", self.state());
        }
    }

    fn step_queue(&self, forward: bool) -> EngineResult<()> {
        let mut core = self.core.lock();
        let stepped = if forward {
            core.queue.next()
        } else {
            core.queue.previous()
        };
        let Some(url) = stepped.map(|t| t.url.clone()) else {
            warn!("queue navigation requested with an empty queue");
            return Ok(());
        };
        validate_url(&url)?;
        let index = core.queue.cursor();
        self.play_locked(&mut core, &url, index);
        Ok(())
    }

    /// One pass of the playback supervisor: reap the producer's exit
    /// status, apply the watermark rules, detect end-of-stream.
    fn tick(&self) {
        let mut core = self.core.lock();

        if let Some(result) = core.session.as_mut().and_then(|s| s.poll_result()) {
            match result {
                Ok(()) => debug!("stream complete, draining remaining buffer"),
                Err(EngineError::Cancelled) => {}
                Err(err) => {
                    warn!("stream failed: {}", err);
                    self.events.emit(PlayerEvent::Error {
                        message: err.to_string(),
                    });
                    if err.should_auto_advance() {
                        self.advance_locked(&mut core);
                    } else {
                        self.teardown_locked(&mut core);
                    }
                    return;
                }
            }
        }

        let Some(session) = core.session.as_ref() else {
            return;
        };
        let buffered_bytes = session.buffer.buffered_bytes();
        let buffered = session.buffer.buffered_seconds();
        let consumed = session.is_fully_consumed();
        let playback = &self.config.playback;

        match self.state() {
            PlaybackState::Buffering if buffered > playback.high_watermark_seconds => {
                self.start_output_locked(&mut core);
            }
            PlaybackState::Playing
                if buffered < playback.low_watermark_seconds && !consumed =>
            {
                info!("buffer low ({:.2}s), rebuffering", buffered);
                if let Some(device) = core.device.as_mut() {
                    device.pause();
                }
                self.set_state(PlaybackState::Buffering);
            }
            _ => {}
        }

        // A failed device start tears the session down mid-tick; the stale
        // occupancy snapshot must not drive end-of-stream handling.
        if core.session.is_none() {
            return;
        }

        if consumed && buffered_bytes == 0 {
            info!("end of stream");
            self.advance_locked(&mut core);
            return;
        }

        self.events.emit(PlayerEvent::Progress {
            buffered_seconds: buffered,
            state: self.state(),
        });
    }

    /// First crossing of the high watermark creates and starts the output
    /// device; later crossings resume the existing one.
    fn start_output_locked(&self, core: &mut PlayerCore) {
        if core.device.is_none() {
            let (format, source) = {
                let Some(session) = core.session.as_ref() else {
                    return;
                };
                let Some(format) = session.buffer.format() else {
                    return;
                };
                let source: Arc<dyn PcmSource> = Arc::new(VolumeSource::new(
                    session.buffer.clone(),
                    self.volume.clone(),
                    session.transcoder_fallback_flag(),
                ));
                (format, source)
            };
            let mut device = (self.sink_factory)();
            if let Err(err) = device.init(format, source) {
                warn!("output device init failed: {}", err);
                self.events.emit(PlayerEvent::Error {
                    message: err.to_string(),
                });
                self.teardown_locked(core);
                return;
            }
            core.device = Some(device);
        }
        if let Some(device) = core.device.as_mut() {
            device.play();
        }
        info!("high watermark reached, playback started");
        self.set_state(PlaybackState::Playing);
    }

    /// Ends the current session and, when the queue has tracks, starts the
    /// next one, wrapping past the end of the list.
    fn advance_locked(&self, core: &mut PlayerCore) {
        self.teardown_locked(core);
        let next = core.queue.next().map(|t| (t.url.clone(), t.display()));
        let Some((url, label)) = next else {
            debug!("queue empty, staying stopped");
            return;
        };
        info!("advancing to {}", label);
        if let Err(err) = validate_url(&url) {
            warn!("queued track skipped: {}", err);
            return;
        }
        let index = core.queue.cursor();
        self.play_locked(core, &url, index);
    }
}

impl Drop for PlayerInner {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        // Dropping the session cancels its worker; the device still needs
        // an explicit dispose to stop pulling from the buffer.
        core.session.take();
        if let Some(mut device) = core.device.take() {
            device.dispose();
        }
    }
}
