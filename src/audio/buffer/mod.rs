pub mod ring;
pub mod shared;

pub use ring::RingBuffer;
pub use shared::PlaybackBuffer;
