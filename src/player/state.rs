use std::fmt;

/// Lifecycle state of the player.
///
/// Stored as a single atomic byte on the controller so the poll task and
/// API calls can read it without taking the core lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Stopped = 0,
    /// A stream session is filling the buffer; output is held back until
    /// the high watermark is crossed.
    Buffering = 1,
    Playing = 2,
    Paused = 3,
}

impl PlaybackState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => PlaybackState::Buffering,
            2 => PlaybackState::Playing,
            3 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Stopped => "stopped",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(name)
    }
}
