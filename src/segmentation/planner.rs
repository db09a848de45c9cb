//! Segment duration planning.
//!
//! Every HLS segment should be large enough to be worth a separate object in
//! the store: at least [`MIN_CHUNK_SIZE_BITS`] of payload. The segment
//! duration is derived from the total bit rate of a variant and never drops
//! below [`MIN_SEGMENT_DURATION_SECS`].

use siasplit_av::MediaProber;
use siasplit_core::{Error, ResolvedQuality, Result};

use super::VideoSource;

/// Minimum object size per segment: 4 MiB, in bits.
pub const MIN_CHUNK_SIZE_BITS: u64 = 4 * 1024 * 1024 * 8;

/// Floor for the segment duration.
pub const MIN_SEGMENT_DURATION_SECS: u32 = 10;

/// Segment duration and advertised bandwidth for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    pub duration_secs: u32,
    /// Total bit rate in bits per second, also used as `BANDWIDTH`.
    pub bandwidth: u64,
}

/// `max(floor(MIN_CHUNK_SIZE_BITS / total_bitrate), MIN_SEGMENT_DURATION_SECS)`.
///
/// A zero bit rate yields the floor.
pub fn segment_duration_for(total_bitrate: u64) -> u32 {
    if total_bitrate == 0 {
        return MIN_SEGMENT_DURATION_SECS;
    }
    let candidate = MIN_CHUNK_SIZE_BITS / total_bitrate;
    u32::try_from(candidate)
        .unwrap_or(u32::MAX)
        .max(MIN_SEGMENT_DURATION_SECS)
}

/// Plan the segments of `quality`.
///
/// Qualities with explicit targets use `(video + audio) * 1000` bits per
/// second. `Source` uses the container bit rate probed from `source`; the
/// probe runs at most once per source.
///
/// # Errors
///
/// [`Error::Probe`], prefixed with the quality label, if the source bit rate
/// is needed but cannot be determined.
pub async fn plan_segment(
    quality: &ResolvedQuality,
    source: &VideoSource,
    prober: &dyn MediaProber,
) -> Result<SegmentPlan> {
    let bandwidth = match quality.explicit_bitrates() {
        Some((video_kbps, audio_kbps)) => {
            (u64::from(video_kbps) + u64::from(audio_kbps)) * 1000
        }
        None => {
            let metadata = source.metadata(prober).await.map_err(|e| match e {
                Error::Probe(message) => Error::Probe(format!("{}: {message}", quality.profile)),
                other => other,
            })?;
            metadata.bit_rate.filter(|b| *b > 0).ok_or_else(|| {
                Error::Probe(format!(
                    "{}: bit rate of {} could not be determined",
                    quality.profile,
                    source.path().display()
                ))
            })?
        }
    };

    Ok(SegmentPlan {
        duration_secs: segment_duration_for(bandwidth),
        bandwidth,
    })
}
