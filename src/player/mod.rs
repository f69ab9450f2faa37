pub mod controller;
pub mod events;
pub mod queue;
pub mod session;
pub mod sink;
pub mod state;
pub mod volume;

pub use controller::Player;
pub use events::PlayerEvent;
pub use queue::TrackQueue;
pub use session::PlaySession;
pub use sink::{NullSink, OutputSink};
pub use state::PlaybackState;
pub use volume::{PcmSource, VolumeControl, VolumeSource};
