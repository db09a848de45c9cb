//! Media descriptors shared by the prober, the transcoder and the playlist
//! builder, plus the HLS file naming scheme.

use serde::{Deserialize, Serialize};

use crate::quality::Resolution;

/// File name of the master playlist inside the output directory.
pub const MASTER_PLAYLIST_NAME: &str = "video_master.m3u8";

/// Variant playlist file name for a resolution, e.g. `video_1280x720.m3u8`.
pub fn variant_playlist_name(resolution: &Resolution) -> String {
    format!("video_{resolution}.m3u8")
}

/// ffmpeg segment file pattern for a resolution, e.g. `video_1280x720_%03d.ts`.
///
/// Unique per resolution so every variant can share one output directory.
pub fn segment_file_pattern(resolution: &Resolution) -> String {
    format!("video_{resolution}_%03d.ts")
}

/// Container-level facts about a source file, as reported by a prober.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Overall container bit rate in bits per second.
    pub bit_rate: Option<u64>,
    pub duration_secs: Option<f64>,
    /// Frame width of the first video stream.
    pub width: Option<u32>,
    /// Frame height of the first video stream.
    pub height: Option<u32>,
}

/// One entry of the master playlist, produced by a successful transcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPlaylist {
    pub resolution: Resolution,
    /// Variant playlist file name, relative to the output directory.
    pub file_name: String,
    /// Advertised bandwidth in bits per second.
    pub bandwidth: u64,
}
