//! Configuration read from a TOML file.
//!
//! ```toml
//! [gallery]
//! size = 200
//! antialiasing = "lanczos"
//! select = "#404040ff"
//!
//! [list]
//! order = "numeric"
//! loop = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use image::Rgba;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::order::Order;
use crate::pixmap::{parse_color, AaMode};
use crate::thumbnail::ThumbParams;

/// Largest accepted tile size.
pub const MAX_THUMB_SIZE: u32 = 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gallery: GalleryConfig,
    pub list: ListConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Tile edge in pixels.
    pub size: u32,
    /// Max number of thumbnails kept in memory outside of the visible tiles.
    pub cache: usize,
    /// Queue thumbnails of tiles adjacent to the visible window.
    pub preload: bool,
    #[serde(deserialize_with = "de_aa")]
    pub antialiasing: AaMode,
    pub fill: bool,
    /// Persist thumbnails on disk.
    pub pstore: bool,
    #[serde(deserialize_with = "de_color")]
    pub window: Rgba<u8>,
    #[serde(deserialize_with = "de_color")]
    pub background: Rgba<u8>,
    #[serde(deserialize_with = "de_color")]
    pub select: Rgba<u8>,
    #[serde(deserialize_with = "de_color")]
    pub border: Rgba<u8>,
    #[serde(deserialize_with = "de_color")]
    pub shadow: Rgba<u8>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            size: 200,
            cache: 100,
            preload: false,
            antialiasing: AaMode::Lanczos,
            fill: true,
            pstore: false,
            window: Rgba([0, 0, 0, 0]),
            background: Rgba([0x20, 0x20, 0x20, 0xff]),
            select: Rgba([0x40, 0x40, 0x40, 0xff]),
            border: Rgba([0, 0, 0, 0xff]),
            shadow: Rgba([0, 0, 0, 0xff]),
        }
    }
}

impl GalleryConfig {
    pub fn thumb_params(&self) -> ThumbParams {
        ThumbParams {
            size: self.size,
            fill: self.fill,
            aa: self.antialiasing,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListConfig {
    pub order: Order,
    pub reverse: bool,
    #[serde(rename = "loop")]
    pub loop_mode: bool,
    pub recursive: bool,
    /// Open all files from the directory of a single file source.
    pub all: bool,
    /// Sources are text files listing the real sources.
    pub fromfile: bool,
    /// Watch the filesystem for changes.
    pub fsmon: bool,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            order: Order::Alpha,
            reverse: false,
            loop_mode: true,
            recursive: false,
            all: false,
            fromfile: false,
            fsmon: true,
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// First existing `imgshelf/config.toml` under the user config dir or
    /// `~/.config`.
    pub fn default_path() -> Option<PathBuf> {
        let fallback = dirs::home_dir().map(|home| home.join(".config"));
        [dirs::config_dir(), fallback]
            .into_iter()
            .flatten()
            .map(|base| base.join("imgshelf").join("config.toml"))
            .find(|path| path.is_file())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gallery.size == 0 || self.gallery.size > MAX_THUMB_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "gallery.size",
                value: self.gallery.size.to_string(),
            });
        }
        Ok(())
    }
}

fn de_color<'de, D>(deserializer: D) -> Result<Rgba<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_color(&text).ok_or_else(|| serde::de::Error::custom(format!("invalid color `{text}`")))
}

fn de_aa<'de, D>(deserializer: D) -> Result<AaMode, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_points_at_app_config() {
        if let Some(path) = Config::default_path() {
            assert!(path.ends_with("imgshelf/config.toml"));
            assert!(path.is_file());
        }
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.gallery.size, 200);
        assert_eq!(config.list.order, Order::Alpha);
        assert!(config.list.loop_mode);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r##"
            [gallery]
            size = 64
            fill = false
            antialiasing = "bicubic"
            shadow = "#11223344"

            [list]
            order = "numeric"
            loop = false
            reverse = true
            "##,
        )
        .unwrap();
        assert_eq!(config.gallery.size, 64);
        assert!(!config.gallery.fill);
        assert_eq!(config.gallery.antialiasing, AaMode::Bicubic);
        assert_eq!(config.gallery.shadow, Rgba([0x11, 0x22, 0x33, 0x44]));
        assert_eq!(config.list.order, Order::Numeric);
        assert!(!config.list.loop_mode);
        assert!(config.list.reverse);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::parse("[gallery]\nsize = 0\n").is_err());
        assert!(Config::parse("[gallery]\nsize = 5000\n").is_err());
        assert!(Config::parse("[gallery]\nborder = \"blue\"\n").is_err());
        assert!(Config::parse("[list]\norder = \"sideways\"\n").is_err());
        assert!(Config::parse("[list]\nunknown = 1\n").is_err());
    }
}
