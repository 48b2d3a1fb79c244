//! rh-core: shared error type, configuration, and media-domain enums.
//!
//! This crate is the foundational dependency for the other rh-* crates. It
//! carries no I/O beyond reading the configuration file.

pub mod config;
pub mod error;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
