//! One HLS variant (a single quality) encoded with ffmpeg.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use siasplit_core::{
    segment_file_pattern, variant_playlist_name, Error, ResolvedQuality, Result,
};

use crate::command::{OutputLine, ToolCommand};

/// Everything needed to encode one quality into the shared output directory.
#[derive(Debug, Clone)]
pub struct HlsVariantJob {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub quality: ResolvedQuality,
    pub segment_duration_secs: u32,
    /// Source duration, used to turn ffmpeg's elapsed time into a percentage.
    pub source_duration_secs: Option<f64>,
}

impl HlsVariantJob {
    /// Variant playlist file name, e.g. `video_1280x720.m3u8`.
    pub fn playlist_name(&self) -> String {
        variant_playlist_name(&self.quality.resolution)
    }

    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join(self.playlist_name())
    }

    pub fn segment_pattern_path(&self) -> PathBuf {
        self.output_dir.join(segment_file_pattern(&self.quality.resolution))
    }
}

/// Encodes a single HLS variant.
///
/// `on_progress` receives the raw completion percentage as the encoder
/// reports it. It may be negative or NaN when the encoder cannot tell;
/// callers are expected to clamp.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        job: &HlsVariantJob,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<()>;
}

/// [`Transcoder`] backed by the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
    video_codec: String,
    audio_codec: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(
        ffmpeg_path: PathBuf,
        video_codec: impl Into<String>,
        audio_codec: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg_path,
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
            timeout,
        }
    }

    /// Build the ffmpeg invocation for `job`.
    pub fn command(&self, job: &HlsVariantJob) -> ToolCommand {
        let q = &job.quality;
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.timeout(self.timeout);

        // Machine-readable progress on stdout, errors only on stderr.
        cmd.args(["-hide_banner", "-y", "-nostats", "-loglevel", "error"]);
        cmd.args(["-progress", "pipe:1"]);
        cmd.arg("-i");
        cmd.arg(path_arg(&job.input));

        cmd.args(["-c:v", self.video_codec.as_str()]);
        if let Some(kbps) = q.video_bitrate_kbps {
            cmd.args(["-b:v".to_string(), format!("{kbps}k")]);
        }
        cmd.args(["-c:a", self.audio_codec.as_str()]);
        if let Some(kbps) = q.audio_bitrate_kbps {
            cmd.args(["-b:a".to_string(), format!("{kbps}k")]);
        }
        cmd.args([
            "-vf".to_string(),
            format!("scale={}:{}", q.resolution.width, q.resolution.height),
        ]);

        cmd.args(["-f", "hls"]);
        cmd.args(["-hls_time".to_string(), job.segment_duration_secs.to_string()]);
        cmd.args(["-hls_list_size", "0"]);
        cmd.arg("-hls_segment_filename");
        cmd.arg(path_arg(&job.segment_pattern_path()));
        cmd.arg(path_arg(&job.playlist_path()));
        cmd
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        job: &HlsVariantJob,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<()> {
        tracing::info!(
            "HLS variant: {:?} -> {:?} ({}, hls_time={}s)",
            job.input,
            job.playlist_path(),
            job.quality.resolution,
            job.segment_duration_secs
        );

        let mut parser = ProgressParser::new(job.source_duration_secs);
        let output = self
            .command(job)
            .execute_streaming(|line| match line {
                OutputLine::Stdout(line) => {
                    if let Some(pct) = parser.feed(line) {
                        on_progress(pct);
                    }
                }
                OutputLine::Stderr(line) => tracing::debug!("ffmpeg: {line}"),
            })
            .await?;

        if !output.status.success() {
            let detail = output.stderr.trim();
            let message = if detail.is_empty() {
                format!("exited with status {}", output.status)
            } else {
                format!("exited with status {}: {detail}", output.status)
            };
            return Err(Error::tool("ffmpeg", message));
        }

        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Accumulates ffmpeg `-progress` key/value lines into percentages.
///
/// A percentage is produced at the end of each block (`progress=...`).
/// Without a known duration the percentage is NaN.
#[derive(Debug)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
    out_time_us: Option<i64>,
}

impl ProgressParser {
    pub fn new(duration_secs: Option<f64>) -> Self {
        Self {
            duration_secs,
            out_time_us: None,
        }
    }

    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();
        if let Some(val) = line
            .strip_prefix("out_time_us=")
            .or_else(|| line.strip_prefix("out_time_ms="))
        {
            // Both keys carry microseconds.
            self.out_time_us = val.parse::<i64>().ok();
            None
        } else if let Some(state) = line.strip_prefix("progress=") {
            if state == "end" {
                return Some(100.0);
            }
            Some(match (self.out_time_us, self.duration_secs) {
                (Some(us), Some(dur)) if dur > 0.0 => us as f64 / 1_000_000.0 / dur * 100.0,
                _ => f64::NAN,
            })
        } else {
            None
        }
    }
}
