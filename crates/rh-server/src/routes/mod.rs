//! Route handlers.

pub mod health;
pub mod hls;
pub mod media;
pub mod range;
pub mod subtitles;
pub mod transcode;
