//! Segmentation orchestrator.
//!
//! Turns one source video into an HLS bundle in the output directory: one
//! variant playlist plus segments per selected quality and a master
//! playlist that references them. Qualities are transcoded one after
//! another; the first failure aborts the run.

mod planner;
mod playlist;
mod runner;

pub use planner::{
    plan_segment, segment_duration_for, SegmentPlan, MIN_CHUNK_SIZE_BITS,
    MIN_SEGMENT_DURATION_SECS,
};
pub use playlist::MasterPlaylist;
pub use runner::{clamp_percent, TranscodeQueue};

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use siasplit_av::{MediaProber, Transcoder};
use siasplit_core::quality::resolve_all;
use siasplit_core::{
    Error, EventBus, ProgressChannel, QualityProfile, QualityTable, Result, RunKind, RunId,
    SourceMetadata, VariantPlaylist,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

/// A source file whose metadata is probed lazily, at most once.
#[derive(Debug)]
pub struct VideoSource {
    path: PathBuf,
    metadata: OnceCell<SourceMetadata>,
}

impl VideoSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            metadata: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probe on first call; later calls return the cached result. A failed
    /// probe is not cached.
    pub async fn metadata(&self, prober: &dyn MediaProber) -> Result<&SourceMetadata> {
        self.metadata
            .get_or_try_init(|| prober.probe(&self.path))
            .await
    }
}

/// What to segment.
#[derive(Debug, Clone)]
pub struct SegmentationRequest {
    pub input: PathBuf,
    /// Native frame size. Probed from the source when `None`.
    pub dimensions: Option<(u32, u32)>,
    pub qualities: Vec<QualityProfile>,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct SegmentationOutcome {
    pub run_id: RunId,
    pub master_playlist: PathBuf,
    pub variants: Vec<VariantPlaylist>,
}

/// Runs segmentation jobs against one output directory.
///
/// Only one run may be active at a time; a second concurrent call is
/// rejected with [`Error::Conflict`].
pub struct Segmenter {
    prober: Arc<dyn MediaProber>,
    transcoder: Arc<dyn Transcoder>,
    table: QualityTable,
    output_dir: PathBuf,
    bus: Arc<EventBus>,
    running: Mutex<()>,
}

impl Segmenter {
    pub fn new(
        prober: Arc<dyn MediaProber>,
        transcoder: Arc<dyn Transcoder>,
        table: QualityTable,
        output_dir: PathBuf,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            prober,
            transcoder,
            table,
            output_dir,
            bus,
            running: Mutex::new(()),
        }
    }

    /// Segment `request.input` into every requested quality.
    ///
    /// Emits busy, status lines and idle on a fresh [`ProgressChannel`]. The
    /// idle event is emitted on every outcome, including errors.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`] if another run is in progress.
    /// - [`Error::Validation`] for an empty selection or an unsafe output
    ///   directory.
    /// - [`Error::Probe`] when required metadata cannot be probed.
    /// - [`Error::Transcode`] tagged with the failing quality.
    /// - [`Error::Io`] for output directory and playlist failures.
    pub async fn run(&self, request: SegmentationRequest) -> Result<SegmentationOutcome> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| Error::Conflict("a segmentation run is already in progress".into()))?;

        let progress = ProgressChannel::new(self.bus.clone(), RunKind::Segmentation);
        progress.busy(true);

        let result = self.run_inner(&request, &progress).await;
        match &result {
            Ok(outcome) => info!(
                "Segmentation of {} finished: {} variants",
                request.input.display(),
                outcome.variants.len()
            ),
            Err(e) => {
                warn!("Segmentation of {} failed: {e}", request.input.display());
                progress.status(match e {
                    Error::Transcode { quality, message } => {
                        format!("Split video failed for {quality} - {message}")
                    }
                    other => format!("Split video failed - {other}"),
                });
            }
        }

        progress.busy(false);
        result
    }

    async fn run_inner(
        &self,
        request: &SegmentationRequest,
        progress: &ProgressChannel,
    ) -> Result<SegmentationOutcome> {
        if request.qualities.is_empty() {
            return Err(Error::Validation("no qualities selected".into()));
        }

        let source = VideoSource::new(request.input.clone());
        let (width, height) = match request.dimensions {
            Some(dims) => dims,
            None => {
                let metadata = source.metadata(&*self.prober).await?;
                metadata.width.zip(metadata.height).ok_or_else(|| {
                    Error::Probe(format!(
                        "frame size of {} could not be determined",
                        request.input.display()
                    ))
                })?
            }
        };
        let qualities = resolve_all(&request.qualities, width, height, &self.table)?;

        progress.status("Creating directories");
        prepare_output_dir(&self.output_dir).await?;

        // Only used for percentages; a missing duration is not fatal.
        let duration = match source.metadata(&*self.prober).await {
            Ok(metadata) => metadata.duration_secs,
            Err(e) => {
                warn!("Could not probe duration of {}: {e}", request.input.display());
                None
            }
        };

        let queue = TranscodeQueue::new(
            &*self.prober,
            &*self.transcoder,
            progress,
            &self.output_dir,
        );
        let variants = queue.run(&source, duration, &qualities).await?;

        progress.status("Generating master playlist");
        let playlist = MasterPlaylist::new(variants);
        let master_playlist = playlist.write_to(&self.output_dir).await?;

        progress.status("Video successfully split - ready for upload");
        Ok(SegmentationOutcome {
            run_id: progress.run_id(),
            master_playlist,
            variants: playlist.variants().to_vec(),
        })
    }
}

/// Remove `dir` with everything in it, then recreate it empty.
///
/// Refuses paths that do not end in a normal component (`/`, `.`, `..`, the
/// empty path).
pub async fn prepare_output_dir(dir: &Path) -> Result<()> {
    if !matches!(dir.components().next_back(), Some(Component::Normal(_))) {
        return Err(Error::Validation(format!(
            "refusing to use {:?} as the output directory",
            dir
        )));
    }

    if tokio::fs::try_exists(dir).await? {
        info!("Removing previous output in {}", dir.display());
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}
