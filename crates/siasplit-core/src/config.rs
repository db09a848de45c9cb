//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub segmentation: SegmentationConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.segmentation.output_dir.as_os_str().is_empty() {
            warnings.push("segmentation.output_dir is empty".into());
        }

        let storage = &self.storage;
        if !storage.endpoint.is_empty()
            && !(storage.endpoint.starts_with("http://") || storage.endpoint.starts_with("https://"))
        {
            warnings.push(format!(
                "storage.endpoint '{}' has no http:// or https:// scheme",
                storage.endpoint
            ));
        }
        if !storage.endpoint.is_empty()
            && (storage.access_key.is_empty() || storage.secret_key.is_empty())
        {
            warnings.push("storage.endpoint is set but access_key or secret_key is empty".into());
        }
        if storage.root_bucket.is_empty() {
            warnings.push("storage.root_bucket is empty".into());
        }
        if storage.alias.contains('/') {
            warnings.push(format!("storage.alias '{}' must not contain '/'", storage.alias));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools. Unset entries are looked up on `PATH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub mc_path: Option<PathBuf>,
}

/// Transcode and HLS output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Directory that receives playlists and segments. Wiped at the start
    /// of every segmentation run.
    pub output_dir: PathBuf,
    pub video_codec: String,
    pub audio_codec: String,
    pub transcode_timeout_secs: u64,
    pub probe_timeout_secs: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            video_codec: "h264".into(),
            audio_codec: "aac".into(),
            transcode_timeout_secs: 86_400,
            probe_timeout_secs: 60,
        }
    }
}

/// How the storage CLI's outcome is judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// Any output on stderr is a failure; the exit code is only logged.
    #[default]
    Stderr,
    /// A non-zero exit code is a failure; stderr is only logged.
    ExitCode,
}

/// Remote object store settings for the upload workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3-compatible endpoint, e.g. `http://localhost:9885`.
    pub endpoint: String,
    /// Externally reachable base URL used for the published playlist link.
    /// Falls back to `endpoint` when unset.
    pub host_url: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    /// Alias registered with the storage CLI.
    pub alias: String,
    /// Bucket under which every upload gets its own sub-bucket.
    pub root_bucket: String,
    pub success_policy: SuccessPolicy,
    /// Remove the half-written bucket when a later step fails.
    pub cleanup_on_failure: bool,
    pub step_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            host_url: None,
            access_key: String::new(),
            secret_key: String::new(),
            alias: "renterd".into(),
            root_bucket: "siasplit-output".into(),
            success_policy: SuccessPolicy::default(),
            cleanup_on_failure: true,
            step_timeout_secs: 3_600,
        }
    }
}
