use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Why an image source could not be turned into frames.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported image format")]
    Unsupported,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("command `{command}` exited with status {status}")]
    Exec { command: String, status: i32 },
}

/// Failures of the persistent thumbnail store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("source has no persistent identity")]
    NoPath,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("filesystem monitor: {0}")]
    Notify(#[from] notify::Error),
}
