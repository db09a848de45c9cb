//! Quality profiles and their resolution against a source video.
//!
//! [`QualityProfile`] is a closed enumeration whose declaration order is the
//! processing order. Bitrate targets live in a [`QualityTable`] that is
//! injected into [`resolve`], so a caller can swap in a different ladder
//! without touching the resolver.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A user-selectable output quality.
///
/// Ordering follows declaration order, which is also the order in which
/// selected qualities are transcoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityProfile {
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    /// Keep the source's native resolution and bitrate.
    Source,
}

impl QualityProfile {
    /// Every profile, in processing order.
    pub const ALL: [QualityProfile; 6] = [
        QualityProfile::P240,
        QualityProfile::P360,
        QualityProfile::P480,
        QualityProfile::P720,
        QualityProfile::P1080,
        QualityProfile::Source,
    ];

    /// The label shown to users and used in status messages.
    pub fn label(&self) -> &'static str {
        match self {
            QualityProfile::P240 => "240p",
            QualityProfile::P360 => "360p",
            QualityProfile::P480 => "480p",
            QualityProfile::P720 => "720p",
            QualityProfile::P1080 => "1080p",
            QualityProfile::Source => "Source",
        }
    }
}

impl fmt::Display for QualityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        QualityProfile::ALL
            .into_iter()
            .find(|q| q.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "unknown quality '{s}' (expected one of: 240p, 360p, 480p, 720p, 1080p, Source)"
                ))
            })
    }
}

/// Sort a selection into processing order and drop duplicates.
pub fn normalize_selection(selection: &[QualityProfile]) -> Vec<QualityProfile> {
    let mut qualities = selection.to_vec();
    qualities.sort();
    qualities.dedup();
    qualities
}

/// Target height and bitrates for one non-source quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySpec {
    pub height: u32,
    /// Video bitrate in kbit/s.
    pub video_bitrate_kbps: u32,
    /// Audio bitrate in kbit/s.
    pub audio_bitrate_kbps: u32,
}

impl QualitySpec {
    const fn new(height: u32, video_bitrate_kbps: u32, audio_bitrate_kbps: u32) -> Self {
        Self {
            height,
            video_bitrate_kbps,
            audio_bitrate_kbps,
        }
    }
}

/// Lookup table from quality to target height and bitrates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityTable {
    entries: BTreeMap<QualityProfile, QualitySpec>,
}

impl QualityTable {
    /// Build a table from explicit entries. `Source` entries are ignored.
    pub fn new(entries: impl IntoIterator<Item = (QualityProfile, QualitySpec)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .filter(|(q, _)| *q != QualityProfile::Source)
                .collect(),
        }
    }

    /// The built-in bitrate ladder.
    pub fn standard() -> Self {
        Self::new(
            QualityProfile::ALL
                .into_iter()
                .filter_map(|q| standard_spec(q).map(|spec| (q, spec))),
        )
    }

    pub fn get(&self, quality: QualityProfile) -> Option<&QualitySpec> {
        self.entries.get(&quality)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QualityProfile, &QualitySpec)> {
        self.entries.iter()
    }
}

impl Default for QualityTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_spec(quality: QualityProfile) -> Option<QualitySpec> {
    match quality {
        QualityProfile::P240 => Some(QualitySpec::new(240, 500, 64)),
        QualityProfile::P360 => Some(QualitySpec::new(360, 800, 90)),
        QualityProfile::P480 => Some(QualitySpec::new(480, 1000, 128)),
        QualityProfile::P720 => Some(QualitySpec::new(720, 2500, 192)),
        QualityProfile::P1080 => Some(QualitySpec::new(1080, 4500, 300)),
        QualityProfile::Source => None,
    }
}

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A quality bound to a concrete output resolution for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedQuality {
    pub profile: QualityProfile,
    pub resolution: Resolution,
    /// Explicit video bitrate in kbit/s; `None` for `Source`.
    pub video_bitrate_kbps: Option<u32>,
    /// Explicit audio bitrate in kbit/s; `None` for `Source`.
    pub audio_bitrate_kbps: Option<u32>,
}

impl ResolvedQuality {
    /// Both bitrates, if the quality carries explicit targets.
    pub fn explicit_bitrates(&self) -> Option<(u32, u32)> {
        self.video_bitrate_kbps.zip(self.audio_bitrate_kbps)
    }
}

/// Resolve a quality against the source's native frame size.
///
/// Width is `round(target_height * native_width / native_height)`, bumped to
/// the next even number when odd. `Source` keeps the native size (width also
/// forced even) and carries no explicit bitrates.
///
/// # Errors
///
/// - [`Error::Validation`] if either native dimension is zero.
/// - [`Error::Configuration`] if a non-source quality is missing from `table`.
pub fn resolve(
    quality: QualityProfile,
    native_width: u32,
    native_height: u32,
    table: &QualityTable,
) -> Result<ResolvedQuality> {
    if native_width == 0 || native_height == 0 {
        return Err(Error::Validation(format!(
            "source dimensions must be non-zero, got {native_width}x{native_height}"
        )));
    }

    if quality == QualityProfile::Source {
        return Ok(ResolvedQuality {
            profile: quality,
            resolution: Resolution {
                width: force_even(native_width),
                height: native_height,
            },
            video_bitrate_kbps: None,
            audio_bitrate_kbps: None,
        });
    }

    let spec = table.get(quality).ok_or_else(|| {
        Error::Configuration(format!("quality table has no entry for {quality}"))
    })?;

    let aspect_ratio = f64::from(native_width) / f64::from(native_height);
    let width = (f64::from(spec.height) * aspect_ratio).round() as u32;

    Ok(ResolvedQuality {
        profile: quality,
        resolution: Resolution {
            width: force_even(width),
            height: spec.height,
        },
        video_bitrate_kbps: Some(spec.video_bitrate_kbps),
        audio_bitrate_kbps: Some(spec.audio_bitrate_kbps),
    })
}

/// Normalize `selection` and resolve every entry in processing order.
pub fn resolve_all(
    selection: &[QualityProfile],
    native_width: u32,
    native_height: u32,
    table: &QualityTable,
) -> Result<Vec<ResolvedQuality>> {
    normalize_selection(selection)
        .into_iter()
        .map(|q| resolve(q, native_width, native_height, table))
        .collect()
}

fn force_even(width: u32) -> u32 {
    if width % 2 == 0 {
        width
    } else {
        width.saturating_add(1) & !1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_480p_from_1080p_source() {
        let table = QualityTable::standard();
        let q = resolve(QualityProfile::P480, 1920, 1080, &table).unwrap();
        // 480 * 16/9 = 853.33 -> 853 -> 854
        assert_eq!(q.resolution.to_string(), "854x480");
        assert_eq!(q.explicit_bitrates(), Some((1000, 128)));
    }

    #[test]
    fn resolves_720p_exact() {
        let q = resolve(QualityProfile::P720, 1920, 1080, &QualityTable::standard()).unwrap();
        assert_eq!(q.resolution, Resolution { width: 1280, height: 720 });
    }

    #[test]
    fn odd_width_is_bumped() {
        // 240 * 1210/800 = 363 -> 364
        let q = resolve(QualityProfile::P240, 1210, 800, &QualityTable::standard()).unwrap();
        assert_eq!(q.resolution.width, 364);
    }

    #[test]
    fn width_is_always_even() {
        let table = QualityTable::standard();
        for (w, h) in [(1920, 1080), (1280, 536), (853, 480), (1000, 999), (7, 3), (640, 1138)] {
            for q in QualityProfile::ALL {
                let r = resolve(q, w, h, &table).unwrap();
                assert_eq!(r.resolution.width % 2, 0, "{q} from {w}x{h} gave {}", r.resolution);
            }
        }
    }

    #[test]
    fn extreme_widths_stay_even_without_overflow() {
        let table = QualityTable::standard();
        let source = resolve(QualityProfile::Source, u32::MAX, 1, &table).unwrap();
        assert_eq!(source.resolution.width, u32::MAX - 1);

        // 240 * u32::MAX saturates the cast.
        let scaled = resolve(QualityProfile::P240, u32::MAX, 1, &table).unwrap();
        assert_eq!(scaled.resolution.width, u32::MAX - 1);
    }

    #[test]
    fn width_matches_rounding_rule() {
        let table = QualityTable::standard();
        for (w, h) in [(1920, 1080), (1280, 536), (1080, 1920), (720, 576)] {
            for q in &QualityProfile::ALL[..5] {
                let spec = table.get(*q).unwrap();
                let expected = (f64::from(spec.height) * f64::from(w) / f64::from(h)).round() as u32;
                let expected = if expected % 2 == 1 { expected + 1 } else { expected };
                let r = resolve(*q, w, h, &table).unwrap();
                assert_eq!(r.resolution.width, expected);
                assert_eq!(r.resolution.height, spec.height);
            }
        }
    }

    #[test]
    fn source_passes_native_size_through() {
        let q = resolve(QualityProfile::Source, 1920, 1080, &QualityTable::standard()).unwrap();
        assert_eq!(q.resolution.to_string(), "1920x1080");
        assert_eq!(q.explicit_bitrates(), None);
    }

    #[test]
    fn missing_table_entry_is_configuration_error() {
        let table = QualityTable::new([(QualityProfile::P240, QualitySpec::new(240, 500, 64))]);
        let err = resolve(QualityProfile::P720, 1920, 1080, &table).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn zero_dimensions_rejected() {
        let err = resolve(QualityProfile::P240, 1920, 0, &QualityTable::standard()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn selection_is_sorted_and_deduplicated() {
        let selection = [
            QualityProfile::Source,
            QualityProfile::P720,
            QualityProfile::P240,
            QualityProfile::P720,
        ];
        assert_eq!(
            normalize_selection(&selection),
            vec![QualityProfile::P240, QualityProfile::P720, QualityProfile::Source]
        );
    }

    #[test]
    fn parse_labels() {
        assert_eq!("720p".parse::<QualityProfile>().unwrap(), QualityProfile::P720);
        assert_eq!("source".parse::<QualityProfile>().unwrap(), QualityProfile::Source);
        assert!("900p".parse::<QualityProfile>().is_err());
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&QualityProfile::P1080).unwrap();
        assert_eq!(json, "\"1080p\"");
        let back: QualityProfile = serde_json::from_str("\"240p\"").unwrap();
        assert_eq!(back, QualityProfile::P240);
    }
}
