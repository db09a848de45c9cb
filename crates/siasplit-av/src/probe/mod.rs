//! Media probing.
//!
//! [`MediaProber`] is the seam between the orchestrators and whatever tool
//! inspects the source file; [`FfprobeProber`] is the production backend.

mod ffprobe;

use std::path::Path;

use async_trait::async_trait;
use siasplit_core::SourceMetadata;

pub use ffprobe::{parse_ffprobe_output, FfprobeProber};

/// Extracts container-level metadata from a media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probe the file at `path`.
    ///
    /// Fields the tool does not report are left `None`; failing to run the
    /// tool or parse its output is an error ([`siasplit_core::Error::Probe`]).
    async fn probe(&self, path: &Path) -> siasplit_core::Result<SourceMetadata>;
}
