//! A single image source and everything derived from it.

use std::fs::Metadata;
use std::time::SystemTime;

use image::RgbaImage;

use crate::decoder::{self, DecoderRegistry};
use crate::error::LoadError;

/// Source of the image data read from standard input.
pub const SRC_STDIN: &str = "stdin://";
/// Prefix of sources produced by an external command (`exec://<cmd>`).
pub const SRC_EXEC: &str = "exec://";

/// One decoded raster frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixmap: RgbaImage,
    /// Display time for animations, zero for still images.
    pub duration_ms: u32,
}

impl Frame {
    pub fn still(pixmap: RgbaImage) -> Self {
        Self {
            pixmap,
            duration_ms: 0,
        }
    }
}

/// Key/value pair of image meta info (format, EXIF tags, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Default)]
pub struct ImageEntry {
    source: String,
    pub(crate) index: usize,
    file_size: Option<u64>,
    file_time: Option<SystemTime>,
    name: Option<String>,
    parent_dir: Option<String>,
    format: Option<String>,
    frames: Vec<Frame>,
    thumbnail: Option<RgbaImage>,
    alpha: bool,
    meta: Vec<MetaInfo>,
}

impl ImageEntry {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_stat(source: impl Into<String>, size: u64, time: SystemTime) -> Self {
        Self {
            file_size: Some(size),
            file_time: Some(time),
            ..Self::new(source)
        }
    }

    pub fn from_metadata(source: impl Into<String>, meta: &Metadata) -> Self {
        Self {
            file_size: Some(meta.len()),
            file_time: meta.modified().ok(),
            ..Self::new(source)
        }
    }

    /// Detached copy carrying only the identity of this entry.
    pub fn detached(&self) -> Self {
        Self {
            file_size: self.file_size,
            file_time: self.file_time,
            ..Self::new(self.source.clone())
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-based position in the list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn file_size(&self) -> Option<u64> {
        self.file_size
    }

    pub fn file_time(&self) -> Option<SystemTime> {
        self.file_time
    }

    /// Standard input or external command output.
    pub fn is_pseudo(&self) -> bool {
        is_pseudo_source(&self.source)
    }

    /// Everything up to (not including) the last `/` of the source.
    pub fn dir_prefix(&self) -> &str {
        match self.source.rfind('/') {
            Some(pos) => &self.source[..pos],
            None => "",
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent_dir(&self) -> Option<&str> {
        self.parent_dir.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn meta(&self) -> &[MetaInfo] {
        &self.meta
    }

    pub fn add_meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.meta.push(MetaInfo {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn alpha(&self) -> bool {
        self.alpha
    }

    pub fn has_frames(&self) -> bool {
        !self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn set_frames(&mut self, frames: Vec<Frame>, alpha: bool) {
        self.frames = frames;
        self.alpha = alpha;
    }

    pub fn free_frames(&mut self) {
        self.frames = Vec::new();
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }

    pub fn thumbnail(&self) -> Option<&RgbaImage> {
        self.thumbnail.as_ref()
    }

    pub fn set_thumbnail(&mut self, thumb: RgbaImage) {
        self.thumbnail = Some(thumb);
    }

    /// Installs a thumbnail read back from the persistent store.
    ///
    /// The stored pixels keep their alpha channel, so they are composited.
    pub fn restore_thumbnail(&mut self, thumb: RgbaImage) {
        self.thumbnail = Some(thumb);
        self.alpha = true;
    }

    pub fn free_thumbnail(&mut self) {
        self.thumbnail = None;
    }

    /// Decodes the source into frames, replacing previous image data.
    pub fn load(&mut self, decoders: &DecoderRegistry) -> Result<(), LoadError> {
        self.free_frames();
        self.free_thumbnail();

        let data = decoder::read_source(&self.source)?;
        let image = decoders.decode(&data)?;
        if self.is_pseudo() {
            self.file_size = Some(data.len() as u64);
        }
        self.frames = image.frames;
        self.alpha = image.alpha;
        self.format = Some(image.format);
        self.meta.extend(image.meta);
        self.derive_names();
        Ok(())
    }

    /// Takes decoded data from `other`, keeping this entry's identity and position.
    ///
    /// Meta info is appended during a single decode; a merged decode
    /// supersedes the meta info of an earlier one instead of stacking on it.
    pub fn update(&mut self, other: ImageEntry) {
        self.frames = other.frames;
        self.thumbnail = other.thumbnail;
        self.alpha = other.alpha;
        if other.format.is_some() {
            self.format = other.format;
        }
        if other.name.is_some() {
            self.name = other.name;
            self.parent_dir = other.parent_dir;
        }
        if !other.meta.is_empty() {
            self.meta = other.meta;
        }
    }

    fn derive_names(&mut self) {
        if self.is_pseudo() {
            self.name = Some(self.source.clone());
            self.parent_dir = Some(String::new());
            return;
        }
        let mut parts = self.source.rsplit('/');
        let name = parts.next().unwrap_or_default();
        let parent = parts.next().unwrap_or_default();
        self.name = Some(name.to_string());
        self.parent_dir = Some(parent.to_string());
    }
}

pub fn is_pseudo_source(source: &str) -> bool {
    source == SRC_STDIN || source.starts_with(SRC_EXEC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_copy_has_no_image_data() {
        let mut entry = ImageEntry::new("/pics/a.png");
        entry.index = 7;
        entry.set_thumbnail(RgbaImage::new(2, 2));
        entry.add_meta("Format", "PNG");
        let copy = entry.detached();
        assert_eq!(copy.source(), "/pics/a.png");
        assert_eq!(copy.index(), 0);
        assert!(!copy.has_thumbnail());
        assert!(copy.meta().is_empty());
    }

    #[test]
    fn update_moves_image_data_only() {
        let mut origin = ImageEntry::new("/pics/a.png");
        origin.index = 3;
        let mut loaded = origin.detached();
        loaded.set_frames(vec![Frame::still(RgbaImage::new(4, 4))], true);
        loaded.set_thumbnail(RgbaImage::new(1, 1));

        origin.update(loaded);
        assert_eq!(origin.index(), 3);
        assert!(origin.has_frames());
        assert!(origin.has_thumbnail());
        assert!(origin.alpha());
    }

    #[test]
    fn names_from_path() {
        let mut entry = ImageEntry::new("/home/user/pics/cat.jpg");
        entry.derive_names();
        assert_eq!(entry.name(), Some("cat.jpg"));
        assert_eq!(entry.parent_dir(), Some("pics"));
        assert_eq!(entry.dir_prefix(), "/home/user/pics");

        let mut piped = ImageEntry::new(SRC_STDIN);
        piped.derive_names();
        assert_eq!(piped.name(), Some(SRC_STDIN));
        assert_eq!(piped.parent_dir(), Some(""));
        assert!(piped.is_pseudo());
    }

    #[test]
    fn merged_decode_supersedes_meta() {
        let mut origin = ImageEntry::new("/pics/a.jpg");
        origin.add_meta("Model", "old");

        let mut first = origin.detached();
        first.add_meta("Model", "X100");
        first.add_meta("ISOSpeedRatings", "200");
        origin.update(first);
        assert_eq!(origin.meta().len(), 2);
        assert_eq!(origin.meta()[0].value, "X100");

        // a thumbnail-only merge keeps what is there
        let mut thumb_only = origin.detached();
        thumb_only.set_thumbnail(RgbaImage::new(1, 1));
        origin.update(thumb_only);
        assert_eq!(origin.meta().len(), 2);
    }
}
