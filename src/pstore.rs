//! Persistent thumbnail store.
//!
//! Thumbnails are kept as PNG files in a tree that mirrors the absolute path
//! of the source image, e.g. `~/.cache/imgshelf/home/me/pics/cat.jpg.00c811`.
//! The suffix encodes tile size (4 hex digits), fill flag and AA mode so that
//! thumbnails made with different settings never collide.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::{ImageFormat, ImageReader, RgbaImage};

use crate::entry::is_pseudo_source;
use crate::error::StoreError;
use crate::thumbnail::ThumbParams;

#[derive(Debug, Clone)]
pub struct ThumbStore {
    root: PathBuf,
}

impl ThumbStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<user cache dir>/<app>`, falling back to `~/.cache/<app>`.
    pub fn in_cache_dir(app: &str) -> Option<Self> {
        let base = dirs::cache_dir().or_else(|| dirs::home_dir().map(|home| home.join(".cache")))?;
        Some(Self::new(base.join(app)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the cached thumbnail, `None` for sources without a stable path.
    pub fn path(&self, source: &str, params: &ThumbParams) -> Option<PathBuf> {
        if is_pseudo_source(source) || !source.starts_with('/') {
            return None;
        }
        let mut path = self.root.clone();
        let mut pushed = false;
        for component in Path::new(source).components() {
            if let Component::Normal(part) = component {
                path.push(part);
                pushed = true;
            }
        }
        if !pushed {
            return None;
        }
        let mut name: OsString = path.file_name()?.to_os_string();
        name.push(suffix(params));
        path.set_file_name(name);
        Some(path)
    }

    /// Writes the thumbnail, creating intermediate directories.
    pub fn save(&self, source: &str, thumb: &RgbaImage, params: &ThumbParams) -> Result<(), StoreError> {
        let path = self.path(source, params).ok_or(StoreError::NoPath)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_name = path.file_name().map(OsString::from).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);
        thumb.save_with_format(&tmp_path, ImageFormat::Png)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Loads a cached thumbnail if one exists and is not older than the source.
    pub fn load(&self, source: &str, params: &ThumbParams) -> Option<RgbaImage> {
        let path = self.path(source, params)?;
        let source_time = mtime_secs(Path::new(source))?;
        let cache_time = mtime_secs(&path)?;
        if source_time > cache_time {
            log::debug!("stale thumbnail {}", path.display());
            return None;
        }
        let decoded = ImageReader::open(&path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(image::ImageError::from)
            .and_then(|reader| reader.decode());
        match decoded {
            Ok(image) => Some(image.to_rgba8()),
            Err(err) => {
                log::debug!("unreadable thumbnail {}: {err}", path.display());
                None
            }
        }
    }
}

fn suffix(params: &ThumbParams) -> String {
    format!(
        ".{:04x}{}{}",
        params.size as u16,
        u8::from(params.fill),
        params.aa.digit()
    )
}

fn mtime_secs(path: &Path) -> Option<u64> {
    let modified: SystemTime = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    )
}
