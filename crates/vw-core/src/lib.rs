//! vw-core: shared types, errors, configuration, and the progress feed.
//!
//! This crate is the foundational dependency for the other vw-* crates,
//! providing the unified error type, engine configuration, the conversion
//! state machine, and the atomically-swapped progress snapshot feed.

pub mod config;
pub mod error;
pub mod progress;

// Re-export the most commonly used items at the crate root.
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use progress::{ConversionState, ProgressFeed, ProgressSnapshot};
