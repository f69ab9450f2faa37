pub mod client;
pub mod retry;

pub use client::{StreamClient, StreamResponse};
pub use retry::{Backoff, retry_fetch};

#[cfg(test)]
pub(crate) mod testserver;
