//! Unified error type for siasplit.
//!
//! Every crate in the workspace funnels its failures into [`Error`]. The
//! orchestrators attach enough context (the quality label or the upload step)
//! for a caller to show a specific status message.

use std::fmt;

/// Unified error type covering all failure modes in siasplit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A quality profile could not be resolved. Indicates a programming
    /// error rather than bad user input.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The source bit rate (or other required metadata) could not be probed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The transcoder reported a failure for one quality.
    #[error("Transcode failed for {quality}: {message}")]
    Transcode {
        /// Quality label of the failed job (e.g. "720p").
        quality: String,
        /// Underlying failure description.
        message: String,
    },

    /// A local filesystem operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// One of the four upload steps failed.
    #[error("Upload step {step} failed: {message}")]
    UploadStep {
        /// Name of the step that failed.
        step: String,
        /// Underlying failure description.
        message: String,
    },

    /// An external tool (ffmpeg, ffprobe, mc) could not be run or failed.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Request or configuration data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested run conflicts with one already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Transcode`].
    pub fn transcode(quality: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::Transcode {
            quality: quality.to_string(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::UploadStep`].
    pub fn upload_step(step: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::UploadStep {
            step: step.to_string(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
