//! Upload orchestrator.
//!
//! Publishes the segmentation output directory to an S3-compatible store in
//! four dependent steps (register credentials, create a fresh bucket, copy,
//! flatten) and reports the playable URL of the master playlist.

mod client;
mod orchestrator;

pub use client::{alias_confirmation, judge_outcome, McClient, StorageClient};
pub use orchestrator::{
    UploadOrchestrator, UploadOutcome, UploadRequest, UploadSession, UploadStep,
};
