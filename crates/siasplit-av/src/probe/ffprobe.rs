//! FFprobe-based [`MediaProber`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`SourceMetadata`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use siasplit_core::{Error, Result, SourceMetadata};

use super::MediaProber;
use crate::command::ToolCommand;

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<SourceMetadata> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().to_string());

        let output = cmd
            .execute()
            .await
            .map_err(|e| Error::Probe(format!("{}: {e}", path.display())))?;

        parse_ffprobe_output(&output.stdout)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    bit_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Map raw ffprobe JSON into [`SourceMetadata`].
///
/// ffprobe reports numbers as strings and uses `"N/A"` for unknown values;
/// both unparsable and missing values map to `None`.
pub fn parse_ffprobe_output(json: &str) -> Result<SourceMetadata> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    Ok(SourceMetadata {
        bit_rate: ff.format.bit_rate.as_deref().and_then(|v| v.trim().parse().ok()),
        duration_secs: ff
            .format
            .duration
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0),
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
    })
}
