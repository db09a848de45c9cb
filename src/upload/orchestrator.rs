//! Staged upload of an HLS bundle into a fresh bucket.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use siasplit_core::{
    BucketId, Error, EventBus, ProgressChannel, Result, RunId, RunKind, MASTER_PLAYLIST_NAME,
};
use tracing::{error, info, warn};

use super::client::StorageClient;

/// The four upload steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    RegisterCredentials,
    ProvisionBucket,
    BulkCopy,
    FlattenMove,
}

impl UploadStep {
    pub fn name(&self) -> &'static str {
        match self {
            UploadStep::RegisterCredentials => "register-credentials",
            UploadStep::ProvisionBucket => "provision-bucket",
            UploadStep::BulkCopy => "bulk-copy",
            UploadStep::FlattenMove => "flatten-move",
        }
    }
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Endpoint, credentials and local bundle for one upload.
#[derive(Clone)]
pub struct UploadRequest {
    pub endpoint: String,
    /// Public base URL for the published link; `endpoint` when `None`.
    pub host_url: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub output_dir: PathBuf,
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("endpoint", &self.endpoint)
            .field("host_url", &self.host_url)
            .field("access_key", &"***")
            .field("secret_key", &"***")
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

/// One upload attempt: the request plus its freshly generated bucket.
#[derive(Debug, Clone)]
pub struct UploadSession {
    pub bucket_id: BucketId,
    pub request: UploadRequest,
}

impl UploadSession {
    pub fn new(request: UploadRequest) -> Self {
        Self {
            bucket_id: BucketId::new(),
            request,
        }
    }

    /// Remote path of the session bucket, relative to the alias.
    pub fn bucket_path(&self, root_bucket: &str) -> String {
        format!("{root_bucket}/{}", self.bucket_id)
    }

    /// Where the bulk copy lands: the bucket plus the local directory name.
    pub fn nested_path(&self, root_bucket: &str) -> String {
        format!(
            "{}/{}/",
            self.bucket_path(root_bucket),
            local_dir_name(&self.request.output_dir)
        )
    }

    /// `{host}/{root_bucket}/{bucket}/video_master.m3u8`, where host is the
    /// host URL override or the endpoint, without a trailing slash.
    pub fn published_url(&self, root_bucket: &str) -> String {
        let host = self
            .request
            .host_url
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(&self.request.endpoint);
        format!(
            "{}/{}/{MASTER_PLAYLIST_NAME}",
            host.trim_end_matches('/'),
            self.bucket_path(root_bucket)
        )
    }
}

fn local_dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string())
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub run_id: RunId,
    pub bucket_id: BucketId,
    pub url: String,
}

/// Runs the four upload steps strictly in sequence.
///
/// A failure stops the sequence; no later step runs. When the bucket was
/// already created, it is removed again (best effort) if
/// `cleanup_on_failure` is set.
pub struct UploadOrchestrator {
    client: Arc<dyn StorageClient>,
    root_bucket: String,
    cleanup_on_failure: bool,
    bus: Arc<EventBus>,
}

impl UploadOrchestrator {
    pub fn new(
        client: Arc<dyn StorageClient>,
        root_bucket: impl Into<String>,
        cleanup_on_failure: bool,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            client,
            root_bucket: root_bucket.into(),
            cleanup_on_failure,
            bus,
        }
    }

    /// Upload `request.output_dir` into a new bucket and return the
    /// playable URL.
    ///
    /// The idle event is emitted on every outcome; the path-ready event
    /// only on success, after the idle event.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for a missing endpoint, credentials or
    ///   output directory.
    /// - [`Error::UploadStep`] naming the step that failed.
    pub async fn run(&self, request: UploadRequest) -> Result<UploadOutcome> {
        let progress = ProgressChannel::new(self.bus.clone(), RunKind::Upload);
        progress.busy(true);

        let session = UploadSession::new(request);
        let result = self.run_steps(&session, &progress).await;

        match result {
            Ok(()) => {
                let url = session.published_url(&self.root_bucket);
                info!("Upload of bucket {} complete: {url}", session.bucket_id);
                progress.status("Upload complete");
                progress.busy(false);
                progress.path_ready(url.clone());
                Ok(UploadOutcome {
                    run_id: progress.run_id(),
                    bucket_id: session.bucket_id,
                    url,
                })
            }
            Err(e) => {
                error!("Upload of bucket {} failed: {e}", session.bucket_id);
                progress.status(format!("Upload failed - {e}"));
                progress.busy(false);
                Err(e)
            }
        }
    }

    async fn run_steps(&self, session: &UploadSession, progress: &ProgressChannel) -> Result<()> {
        validate_request(&session.request)?;

        let bucket_id = session.bucket_id;
        let bucket_path = session.bucket_path(&self.root_bucket);
        let request = &session.request;

        progress.status("Setting up storage alias");
        self.client
            .register_alias(&request.endpoint, &request.access_key, &request.secret_key)
            .await
            .map_err(step_failed(UploadStep::RegisterCredentials))?;

        progress.status(format!("Creating bucket {bucket_id}"));
        self.client
            .make_bucket(&bucket_path)
            .await
            .map_err(step_failed(UploadStep::ProvisionBucket))?;

        if let Err(e) = self.copy_and_flatten(session, &bucket_path, progress).await {
            if self.cleanup_on_failure {
                self.remove_partial_bucket(&bucket_path, progress).await;
            }
            return Err(e);
        }

        Ok(())
    }

    async fn copy_and_flatten(
        &self,
        session: &UploadSession,
        bucket_path: &str,
        progress: &ProgressChannel,
    ) -> Result<()> {
        let bucket_id = session.bucket_id;

        progress.status(format!("Uploading data to bucket {bucket_id}"));
        let mut on_line = |line: &str| {
            let line = line.trim();
            if !line.is_empty() {
                progress.status(format!("Uploading data to bucket {bucket_id} - {line}"));
            }
        };
        self.client
            .copy_recursive(&session.request.output_dir, bucket_path, &mut on_line)
            .await
            .map_err(step_failed(UploadStep::BulkCopy))?;

        progress.status(format!("Moving data to root of bucket {bucket_id}"));
        self.client
            .move_recursive(&session.nested_path(&self.root_bucket), bucket_path)
            .await
            .map_err(step_failed(UploadStep::FlattenMove))?;

        Ok(())
    }

    async fn remove_partial_bucket(&self, bucket_path: &str, progress: &ProgressChannel) {
        progress.status(format!("Removing incomplete bucket {bucket_path}"));
        match self.client.remove_bucket(bucket_path).await {
            Ok(()) => info!("Removed incomplete bucket {bucket_path}"),
            Err(e) => warn!("Failed to remove incomplete bucket {bucket_path}: {e}"),
        }
    }
}

fn validate_request(request: &UploadRequest) -> Result<()> {
    if request.endpoint.trim().is_empty() {
        return Err(Error::Validation("storage endpoint is not set".into()));
    }
    if request.access_key.is_empty() || request.secret_key.is_empty() {
        return Err(Error::Validation(
            "storage access key and secret key are required".into(),
        ));
    }
    if !request.output_dir.is_dir() {
        return Err(Error::Validation(format!(
            "output directory {} does not exist; run split first",
            request.output_dir.display()
        )));
    }
    Ok(())
}

fn step_failed(step: UploadStep) -> impl FnOnce(Error) -> Error {
    move |e| {
        let message = match e {
            Error::Tool { message, .. } => message,
            other => other.to_string(),
        };
        Error::upload_step(step, message)
    }
}
