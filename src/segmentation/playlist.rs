//! HLS master playlist.

use std::path::{Path, PathBuf};

use siasplit_core::{Result, VariantPlaylist, MASTER_PLAYLIST_NAME};

/// Master playlist referencing every successfully produced variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterPlaylist {
    variants: Vec<VariantPlaylist>,
}

impl MasterPlaylist {
    /// Entries are rendered in the given order.
    pub fn new(variants: Vec<VariantPlaylist>) -> Self {
        Self { variants }
    }

    pub fn variants(&self) -> &[VariantPlaylist] {
        &self.variants
    }

    /// `#EXTM3U` followed by one `#EXT-X-STREAM-INF` line plus file name per
    /// variant, newline-separated with no trailing newline.
    pub fn render(&self) -> String {
        let mut lines = vec!["#EXTM3U".to_string()];
        for variant in &self.variants {
            lines.push(format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
                variant.bandwidth, variant.resolution
            ));
            lines.push(variant.file_name.clone());
        }
        lines.join("\n")
    }

    /// Write `video_master.m3u8` into `output_dir` and return its path.
    ///
    /// Every referenced variant playlist must already exist in `output_dir`.
    ///
    /// # Errors
    ///
    /// [`siasplit_core::Error::Io`] when a referenced variant is missing or
    /// the file cannot be written.
    pub async fn write_to(&self, output_dir: &Path) -> Result<PathBuf> {
        for variant in &self.variants {
            let variant_path = output_dir.join(&variant.file_name);
            if !tokio::fs::try_exists(&variant_path).await? {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("variant playlist {} is missing", variant_path.display()),
                )
                .into());
            }
        }

        let path = output_dir.join(MASTER_PLAYLIST_NAME);
        tokio::fs::write(&path, self.render()).await?;
        tracing::info!(
            "Wrote master playlist {} ({} variants)",
            path.display(),
            self.variants.len()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use siasplit_core::{Error, Resolution};

    fn variant(width: u32, height: u32, bandwidth: u64) -> VariantPlaylist {
        let resolution = Resolution { width, height };
        VariantPlaylist {
            file_name: siasplit_core::variant_playlist_name(&resolution),
            resolution,
            bandwidth,
        }
    }

    #[test]
    fn renders_entries_in_order_without_trailing_newline() {
        let playlist = MasterPlaylist::new(vec![
            variant(426, 240, 564_000),
            variant(1280, 720, 2_692_000),
        ]);

        assert_eq!(
            playlist.render(),
            "#EXTM3U\n\
             #EXT-X-STREAM-INF:BANDWIDTH=564000,RESOLUTION=426x240\n\
             video_426x240.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2692000,RESOLUTION=1280x720\n\
             video_1280x720.m3u8"
        );
    }

    #[test]
    fn empty_playlist_is_header_only() {
        assert_eq!(MasterPlaylist::default().render(), "#EXTM3U");
    }

    #[tokio::test]
    async fn write_to_creates_master_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("video_426x240.m3u8"), "#EXTM3U")
            .await
            .unwrap();

        let playlist = MasterPlaylist::new(vec![variant(426, 240, 564_000)]);
        let path = playlist.write_to(dir.path()).await.unwrap();

        assert_eq!(path, dir.path().join(MASTER_PLAYLIST_NAME));
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, playlist.render());
    }

    #[tokio::test]
    async fn write_to_rejects_missing_variant() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = MasterPlaylist::new(vec![variant(426, 240, 564_000)]);

        let err = playlist.write_to(dir.path()).await.unwrap_err();
        assert_matches!(&err, Error::Io { source } if source.kind() == std::io::ErrorKind::NotFound);
        assert!(!dir.path().join(MASTER_PLAYLIST_NAME).exists());
    }
}
