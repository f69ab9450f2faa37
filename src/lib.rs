pub mod audio;
pub mod common;
pub mod configs;
pub mod net;
pub mod player;
pub mod types;

pub use common::errors::{EngineError, EngineResult};
pub use configs::Config;
pub use player::{PlaybackState, Player, PlayerEvent};
pub use types::{FileTrackProvider, Track, TrackProvider};
