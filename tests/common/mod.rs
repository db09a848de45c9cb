//! Shared fakes for the orchestrator integration tests.
//!
//! The fakes stand in for ffprobe, ffmpeg and mc. [`FakeTranscoder`] writes
//! real playlist files so the master playlist step sees a realistic output
//! directory; [`FakeStorage`] records every call in order.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use siasplit::segmentation::Segmenter;
use siasplit::upload::{StorageClient, UploadOrchestrator, UploadRequest, UploadStep};
use siasplit_av::{HlsVariantJob, MediaProber, Transcoder};
use siasplit_core::{
    Error, EventBus, EventPayload, QualityProfile, QualityTable, Result, SourceMetadata,
};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// All retained events, oldest first.
pub fn events(bus: &EventBus) -> Vec<EventPayload> {
    let mut events: Vec<_> = bus
        .recent_events(usize::MAX)
        .into_iter()
        .map(|e| e.payload)
        .collect();
    events.reverse();
    events
}

/// Status messages only, oldest first.
pub fn status_lines(bus: &EventBus) -> Vec<String> {
    events(bus)
        .into_iter()
        .filter_map(|p| match p {
            EventPayload::SegmentationProgress { message, .. }
            | EventPayload::UploadProgress { message, .. } => Some(message),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Prober
// ---------------------------------------------------------------------------

pub struct FakeProber {
    pub metadata: Option<SourceMetadata>,
    pub calls: Mutex<usize>,
}

impl FakeProber {
    pub fn new(metadata: SourceMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            metadata: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> Result<SourceMetadata> {
        *self.calls.lock() += 1;
        self.metadata
            .clone()
            .ok_or_else(|| Error::Probe(format!("cannot read {}", path.display())))
    }
}

/// 1080p source, 60 s long, 2 Mbit/s.
pub fn hd_metadata() -> SourceMetadata {
    SourceMetadata {
        bit_rate: Some(2_000_000),
        duration_secs: Some(60.0),
        width: Some(1920),
        height: Some(1080),
    }
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

/// What the fake transcoder saw for one job.
#[derive(Debug, Clone)]
pub struct TranscodeCall {
    pub quality: QualityProfile,
    pub segment_duration_secs: u32,
    pub source_duration_secs: Option<f64>,
}

#[derive(Default)]
pub struct FakeTranscoder {
    pub fail_for: Option<QualityProfile>,
    pub calls: Mutex<Vec<TranscodeCall>>,
}

impl FakeTranscoder {
    pub fn failing_for(quality: QualityProfile) -> Self {
        Self {
            fail_for: Some(quality),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn qualities(&self) -> Vec<QualityProfile> {
        self.calls.lock().iter().map(|c| c.quality).collect()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        job: &HlsVariantJob,
        on_progress: &mut (dyn FnMut(f64) + Send),
    ) -> Result<()> {
        self.calls.lock().push(TranscodeCall {
            quality: job.quality.profile,
            segment_duration_secs: job.segment_duration_secs,
            source_duration_secs: job.source_duration_secs,
        });

        // A real encoder always suspends at least once.
        tokio::task::yield_now().await;

        // Raw values as an encoder might report them.
        for pct in [f64::NAN, -3.0, 50.0] {
            on_progress(pct);
        }

        if self.fail_for == Some(job.quality.profile) {
            return Err(Error::tool("ffmpeg", "Conversion failed!"));
        }

        on_progress(100.0);
        tokio::fs::write(job.playlist_path(), "#EXTM3U\n#EXT-X-ENDLIST\n").await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Segmentation harness
// ---------------------------------------------------------------------------

pub struct SegmentationHarness {
    pub bus: Arc<EventBus>,
    pub prober: Arc<FakeProber>,
    pub transcoder: Arc<FakeTranscoder>,
    pub segmenter: Segmenter,
    pub output_dir: PathBuf,
    _root: tempfile::TempDir,
}

impl SegmentationHarness {
    pub fn new(prober: FakeProber, transcoder: FakeTranscoder) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let output_dir = root.path().join("output");
        let bus = Arc::new(EventBus::default());
        let prober = Arc::new(prober);
        let transcoder = Arc::new(transcoder);

        let segmenter = Segmenter::new(
            prober.clone(),
            transcoder.clone(),
            QualityTable::standard(),
            output_dir.clone(),
            bus.clone(),
        );

        Self {
            bus,
            prober,
            transcoder,
            segmenter,
            output_dir,
            _root: root,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStorage {
    pub fail_at: Option<UploadStep>,
    pub fail_cleanup: bool,
    /// `"<operation> <args>"` for every call, in order.
    pub calls: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn failing_at(step: UploadStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, step: Option<UploadStep>, call: String) -> Result<()> {
        self.calls.lock().push(call);
        match step {
            Some(step) if self.fail_at == Some(step) => {
                Err(Error::tool("mc", format!("mc: <ERROR> {step} refused")))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StorageClient for FakeStorage {
    async fn register_alias(
        &self,
        endpoint: &str,
        access_key: &str,
        _secret_key: &str,
    ) -> Result<()> {
        self.record(
            Some(UploadStep::RegisterCredentials),
            format!("alias {endpoint} {access_key}"),
        )
    }

    async fn make_bucket(&self, remote: &str) -> Result<()> {
        self.record(Some(UploadStep::ProvisionBucket), format!("mb {remote}"))
    }

    async fn copy_recursive(
        &self,
        source: &Path,
        remote: &str,
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
    ) -> Result<()> {
        on_line("`output/video_426x240.m3u8` -> `renterd/...`");
        on_line("");
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.record(Some(UploadStep::BulkCopy), format!("cp {name} {remote}"))
    }

    async fn move_recursive(&self, source: &str, target: &str) -> Result<()> {
        self.record(Some(UploadStep::FlattenMove), format!("mv {source} {target}"))
    }

    async fn remove_bucket(&self, remote: &str) -> Result<()> {
        self.calls.lock().push(format!("rb {remote}"));
        if self.fail_cleanup {
            return Err(Error::tool("mc", "bucket is locked"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Upload harness
// ---------------------------------------------------------------------------

pub struct UploadHarness {
    pub bus: Arc<EventBus>,
    pub storage: Arc<FakeStorage>,
    pub orchestrator: UploadOrchestrator,
    pub output_dir: PathBuf,
    _root: tempfile::TempDir,
}

impl UploadHarness {
    pub fn new(storage: FakeStorage) -> Self {
        Self::with_cleanup(storage, true)
    }

    pub fn with_cleanup(storage: FakeStorage, cleanup_on_failure: bool) -> Self {
        let root = tempfile::tempdir().expect("failed to create temp dir");
        let output_dir = root.path().join("output");
        std::fs::create_dir_all(&output_dir).expect("failed to create output dir");
        std::fs::write(output_dir.join("video_master.m3u8"), "#EXTM3U")
            .expect("failed to write playlist");

        let bus = Arc::new(EventBus::default());
        let storage = Arc::new(storage);
        let orchestrator = UploadOrchestrator::new(
            storage.clone(),
            "siasplit-output",
            cleanup_on_failure,
            bus.clone(),
        );

        Self {
            bus,
            storage,
            orchestrator,
            output_dir,
            _root: root,
        }
    }

    pub fn request(&self, host_url: Option<&str>) -> UploadRequest {
        UploadRequest {
            endpoint: "http://localhost:9885".into(),
            host_url: host_url.map(Into::into),
            access_key: "access".into(),
            secret_key: "secret".into(),
            output_dir: self.output_dir.clone(),
        }
    }
}
