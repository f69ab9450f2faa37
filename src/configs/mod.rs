pub mod base;
pub mod playback;
pub mod stream;

pub use base::*;
pub use playback::*;
pub use stream::*;
