pub mod banner;
pub mod cancel;
pub mod errors;
pub mod logger;

pub use cancel::*;
pub use errors::*;
pub use logger::*;
