use parking_lot::Mutex;

use super::state::PlaybackState;

/// Notifications pushed to subscribed listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    StateChanged(PlaybackState),
    /// The cursor moved to a new track, whether through `play`, `next`,
    /// `previous` or auto-advance. `index` is `None` for URLs played
    /// directly that are not part of the queue.
    TrackChanged { index: Option<usize>, url: String },
    /// Emitted once per poll tick while a stream session is active.
    Progress {
        buffered_seconds: f64,
        state: PlaybackState,
    },
    /// One message per failed stream, raised after retries are exhausted.
    Error { message: String },
}

/// Fan-out of player events over flume channels.
///
/// Subscribers that dropped their receiver are pruned on the next emit.
#[derive(Default)]
pub struct EventBus {
    senders: Mutex<Vec<flume::Sender<PlayerEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> flume::Receiver<PlayerEvent> {
        let (tx, rx) = flume::unbounded();
        self.senders.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: PlayerEvent) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
