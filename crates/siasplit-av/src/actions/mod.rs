//! Media processing actions.

mod hls_variant;

pub use hls_variant::{FfmpegTranscoder, HlsVariantJob, ProgressParser, Transcoder};
