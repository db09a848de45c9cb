//! siasplit: split a video into a multi-quality HLS bundle and publish it to
//! an S3-compatible object store.
//!
//! The two orchestrators live here; shared types are in `siasplit-core` and
//! external tool plumbing in `siasplit-av`.

pub mod segmentation;
pub mod upload;

pub use segmentation::{SegmentationOutcome, SegmentationRequest, Segmenter};
pub use upload::{UploadOrchestrator, UploadOutcome, UploadRequest};
