//! Sequential per-quality transcode queue.

use std::path::Path;

use siasplit_av::{HlsVariantJob, MediaProber, Transcoder};
use siasplit_core::{Error, ProgressChannel, ResolvedQuality, Result, VariantPlaylist};
use tracing::{error, info};

use super::planner::plan_segment;
use super::VideoSource;

/// Runs one transcode job per quality, strictly one at a time, in the order
/// given. The first failure aborts the remaining jobs.
pub struct TranscodeQueue<'a> {
    prober: &'a dyn MediaProber,
    transcoder: &'a dyn Transcoder,
    progress: &'a ProgressChannel,
    output_dir: &'a Path,
}

impl<'a> TranscodeQueue<'a> {
    pub fn new(
        prober: &'a dyn MediaProber,
        transcoder: &'a dyn Transcoder,
        progress: &'a ProgressChannel,
        output_dir: &'a Path,
    ) -> Self {
        Self {
            prober,
            transcoder,
            progress,
            output_dir,
        }
    }

    /// Transcode `source` into every quality and return the variant records
    /// in completion order.
    ///
    /// Already written variants stay on disk when a later job fails.
    pub async fn run(
        &self,
        source: &VideoSource,
        source_duration_secs: Option<f64>,
        qualities: &[ResolvedQuality],
    ) -> Result<Vec<VariantPlaylist>> {
        let mut variants = Vec::with_capacity(qualities.len());

        for quality in qualities {
            match self.run_one(source, source_duration_secs, quality).await {
                Ok(variant) => variants.push(variant),
                Err(e) => {
                    error!("Transcode for {} failed: {e}", quality.profile);
                    return Err(e);
                }
            }
        }

        Ok(variants)
    }

    async fn run_one(
        &self,
        source: &VideoSource,
        source_duration_secs: Option<f64>,
        quality: &ResolvedQuality,
    ) -> Result<VariantPlaylist> {
        let plan = plan_segment(quality, source, self.prober).await?;
        info!(
            "Splitting {} into {} ({}): hls_time={}s, bandwidth={}",
            source.path().display(),
            quality.profile,
            quality.resolution,
            plan.duration_secs,
            plan.bandwidth
        );

        let job = HlsVariantJob {
            input: source.path().to_path_buf(),
            output_dir: self.output_dir.to_path_buf(),
            quality: *quality,
            segment_duration_secs: plan.duration_secs,
            source_duration_secs,
        };

        self.progress
            .status(format!("Splitting video into {} 0.0%", quality.resolution));

        let progress = self.progress;
        let resolution = quality.resolution;
        let mut on_progress = move |raw: f64| {
            progress.status(format!(
                "Splitting video into {resolution} {:.1}%",
                clamp_percent(raw)
            ));
        };

        self.transcoder
            .transcode(&job, &mut on_progress)
            .await
            .map_err(|e| match e {
                Error::Tool { message, .. } => Error::transcode(quality.profile, message),
                Error::Transcode { .. } => e,
                other => Error::transcode(quality.profile, other.to_string()),
            })?;

        Ok(VariantPlaylist {
            resolution: quality.resolution,
            file_name: job.playlist_name(),
            bandwidth: plan.bandwidth,
        })
    }
}

/// Clamp a raw encoder percentage into `[0, 100]`; NaN becomes 0.
pub fn clamp_percent(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 100.0)
    }
}
