//! siasplit-core: shared types, errors, configuration and the progress
//! event bus.
//!
//! This crate is the foundational dependency for the other siasplit crates:
//! the unified error type, typed IDs, the quality ladder and its resolver,
//! media descriptors, application configuration, and the [`ProgressChannel`]
//! used by both orchestrators.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod quality;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::{EventBus, EventPayload, ProgressChannel, RunKind};
pub use ids::*;
pub use media::*;
pub use quality::{QualityProfile, QualityTable, Resolution, ResolvedQuality};
