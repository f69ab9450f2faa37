use thiserror::Error;

/// Engine-wide error type.
///
/// The variant decides how a failed stream is handled upstream: transient
/// network errors are retried and, once retries are exhausted, advance the
/// queue to the next track; permanent resource errors stop playback without
/// advancing; key and decrypt errors are fatal for the whole playlist.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("resource error: {0}")]
    Resource(String),
    #[error("empty playlist: {0}")]
    EmptyPlaylist(String),
    #[error("key retrieval failed: {0}")]
    Key(String),
    #[error("decrypt failed: {0}")]
    Decrypt(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("output device error: {0}")]
    Device(String),
    #[error("config error: {0}")]
    Config(String),
    /// The session's cancellation token fired mid-operation. Surfaced so
    /// blocking producers can unwind quickly; never reported to listeners.
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors worth retrying: connection failures, timeouts and
    /// 5xx responses. Everything else is treated as permanent.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Network(_))
    }

    /// Whether the controller should skip to the next track after this
    /// error ended a stream. Only exhausted transient errors advance;
    /// permanent and cryptographic failures stop the player where it is.
    pub fn should_auto_advance(&self) -> bool {
        self.is_transient()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
