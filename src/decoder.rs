//! Format decoders tried in priority order.
//!
//! Each decoder recognises its own format and answers
//! [`LoadError::Unsupported`] for anything else, which hands the data to the
//! next decoder in the registry.

use std::io::{Cursor, Read};
use std::process::Command;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};

use crate::entry::{Frame, MetaInfo, SRC_EXEC, SRC_STDIN};
use crate::error::LoadError;

/// Result of a successful decode.
#[derive(Debug)]
pub struct DecodedImage {
    pub frames: Vec<Frame>,
    pub alpha: bool,
    pub format: String,
    pub meta: Vec<MetaInfo>,
}

pub trait Decoder: Send + Sync {
    fn name(&self) -> &str;

    /// Decodes `data`, or returns [`LoadError::Unsupported`] if the data is
    /// not in this decoder's format.
    fn decode(&self, data: &[u8]) -> Result<DecodedImage, LoadError>;
}

/// Priority-ordered list of decoders.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn Decoder>>,
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// All formats the `image` crate handles; TGA has no signature and goes last.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(GifFrames));
        for format in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Bmp,
            ImageFormat::Pnm,
            ImageFormat::Qoi,
            ImageFormat::Farbfeld,
            ImageFormat::WebP,
            ImageFormat::Tiff,
            ImageFormat::Ico,
        ] {
            registry.register(Box::new(RasterDecoder::new(format)));
        }
        registry.register(Box::new(RasterDecoder::without_signature(ImageFormat::Tga)));
        registry
    }

    pub fn register(&mut self, decoder: Box<dyn Decoder>) {
        self.decoders.push(decoder);
    }

    pub fn names(&self) -> Vec<&str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    pub fn decode(&self, data: &[u8]) -> Result<DecodedImage, LoadError> {
        for decoder in &self.decoders {
            match decoder.decode(data) {
                Err(LoadError::Unsupported) => continue,
                other => return other,
            }
        }
        Err(LoadError::Unsupported)
    }
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("decoders", &self.names())
            .finish()
    }
}

/// Reads the raw bytes behind a source string.
pub fn read_source(source: &str) -> Result<Vec<u8>, LoadError> {
    if source == SRC_STDIN {
        let mut data = Vec::new();
        std::io::stdin().lock().read_to_end(&mut data)?;
        return Ok(data);
    }
    if let Some(cmd) = source.strip_prefix(SRC_EXEC) {
        let output = Command::new("sh").arg("-c").arg(cmd).output()?;
        if !output.status.success() {
            return Err(LoadError::Exec {
                command: cmd.to_string(),
                status: output.status.code().unwrap_or(-1),
            });
        }
        return Ok(output.stdout);
    }
    Ok(std::fs::read(source)?)
}

/// Single-frame decoder for one `image` crate format.
pub struct RasterDecoder {
    format: ImageFormat,
    name: String,
    check_signature: bool,
}

impl RasterDecoder {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            name: format_name(format),
            check_signature: true,
        }
    }

    /// For formats without a magic number: try decoding anything.
    pub fn without_signature(format: ImageFormat) -> Self {
        Self {
            check_signature: false,
            ..Self::new(format)
        }
    }
}

impl Decoder for RasterDecoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedImage, LoadError> {
        if self.check_signature && image::guess_format(data).ok() != Some(self.format) {
            return Err(LoadError::Unsupported);
        }
        let image = match image::load_from_memory_with_format(data, self.format) {
            Ok(image) => image,
            Err(_) if !self.check_signature => return Err(LoadError::Unsupported),
            Err(err) => return Err(LoadError::Decode(err.to_string())),
        };
        let mut meta = Vec::new();
        let mut image = image;
        if matches!(self.format, ImageFormat::Jpeg | ImageFormat::Tiff) {
            if let Ok(exif) = rexif::parse_buffer_quiet(data).0 {
                image = apply_exif(image, &exif, &mut meta);
            }
        }
        let alpha = image.color().has_alpha();
        Ok(DecodedImage {
            frames: vec![Frame::still(image.to_rgba8())],
            alpha,
            format: format!("{} {}x{}", self.name, image.width(), image.height()),
            meta,
        })
    }
}

/// Animated GIF: every frame is kept with its delay.
pub struct GifFrames;

impl Decoder for GifFrames {
    fn name(&self) -> &str {
        "GIF"
    }

    fn decode(&self, data: &[u8]) -> Result<DecodedImage, LoadError> {
        if image::guess_format(data).ok() != Some(ImageFormat::Gif) {
            return Err(LoadError::Unsupported);
        }
        let decoder =
            GifDecoder::new(Cursor::new(data)).map_err(|e| LoadError::Decode(e.to_string()))?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(|e| LoadError::Decode(e.to_string()))?;
        let frames: Vec<Frame> = frames
            .into_iter()
            .map(|frame| {
                let (num, den) = frame.delay().numer_denom_ms();
                Frame {
                    duration_ms: if den == 0 { 0 } else { num / den },
                    pixmap: frame.into_buffer(),
                }
            })
            .collect();
        let Some(first) = frames.first() else {
            return Err(LoadError::Decode("no frames".to_string()));
        };
        let format = format!(
            "GIF {}x{}, {} frame(s)",
            first.pixmap.width(),
            first.pixmap.height(),
            frames.len()
        );
        Ok(DecodedImage {
            frames,
            alpha: true,
            format,
            meta: Vec::new(),
        })
    }
}

fn format_name(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|ext| ext.to_ascii_uppercase())
        .unwrap_or_else(|| format!("{format:?}"))
}

/// Records EXIF tags as meta info and applies the orientation tag.
fn apply_exif(image: DynamicImage, exif: &rexif::ExifData, meta: &mut Vec<MetaInfo>) -> DynamicImage {
    let mut oriented = image;
    for entry in &exif.entries {
        if entry.tag == rexif::ExifTag::Orientation {
            if let Some(code) = orientation_from_tag_value(&entry.value) {
                oriented = match code {
                    2 => oriented.fliph(),
                    3 => oriented.rotate180(),
                    4 => oriented.flipv(),
                    5 => oriented.rotate90().fliph(),
                    6 => oriented.rotate90(),
                    7 => oriented.rotate270().fliph(),
                    8 => oriented.rotate270(),
                    _ => oriented,
                };
            }
            continue;
        }
        if matches!(
            entry.tag,
            rexif::ExifTag::Make
                | rexif::ExifTag::Model
                | rexif::ExifTag::DateTimeOriginal
                | rexif::ExifTag::ExposureTime
                | rexif::ExifTag::FNumber
                | rexif::ExifTag::ISOSpeedRatings
                | rexif::ExifTag::FocalLength
        ) {
            meta.push(MetaInfo {
                key: entry.tag.to_string(),
                value: entry.value_more_readable.to_string(),
            });
        }
    }
    oriented
}

fn orientation_from_tag_value(value: &rexif::TagValue) -> Option<u16> {
    let raw = match value {
        rexif::TagValue::U16(vals) => vals.first().copied(),
        rexif::TagValue::I16(vals) => vals.first().and_then(|v| u16::try_from(*v).ok()),
        rexif::TagValue::U8(vals) => vals.first().map(|&v| v as u16),
        rexif::TagValue::U32(vals) => vals.first().and_then(|v| u16::try_from(*v).ok()),
        rexif::TagValue::I32(vals) => vals.first().and_then(|v| u16::try_from(*v).ok()),
        _ => None,
    }?;
    (1..=8).contains(&raw).then_some(raw)
}
