//! # siasplit-av
//!
//! External tool plumbing for siasplit.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe and mc.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support and line-by-line output streaming.
//! - **Probing** ([`MediaProber`], [`FfprobeProber`]) -- container bit rate,
//!   duration and frame size of a source file.
//! - **Transcoding** ([`Transcoder`], [`FfmpegTranscoder`]) -- encode one HLS
//!   variant with progress reporting.

pub mod actions;
pub mod command;
pub mod probe;
pub mod tools;

// ---- Re-exports for convenience ----

pub use actions::{FfmpegTranscoder, HlsVariantJob, Transcoder};
pub use command::{OutputLine, ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, MediaProber};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
