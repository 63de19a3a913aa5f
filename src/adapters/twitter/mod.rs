//! Twitter API v2 filtered stream adapter

pub mod stream;
pub mod types;

pub use stream::{TwitterStream, TwitterStreamConfig};
