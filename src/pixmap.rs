//! Raster helpers over `image::RgbaImage`.
//!
//! Every drawing routine clips against the destination, so callers may pass
//! rectangles that are partially (or entirely) outside of it.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

use crate::error::ConfigError;

/// Anti-aliasing method used when scaling pixmaps.
///
/// The discriminant is the digit written into persistent-store file names,
/// so the order of variants is part of the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AaMode {
    Nearest = 0,
    Bilinear = 1,
    Bicubic = 2,
    Gaussian = 3,
    #[default]
    Lanczos = 4,
}

impl AaMode {
    pub const ALL: [AaMode; 5] = [
        AaMode::Nearest,
        AaMode::Bilinear,
        AaMode::Bicubic,
        AaMode::Gaussian,
        AaMode::Lanczos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AaMode::Nearest => "nearest",
            AaMode::Bilinear => "bilinear",
            AaMode::Bicubic => "bicubic",
            AaMode::Gaussian => "gaussian",
            AaMode::Lanczos => "lanczos",
        }
    }

    pub fn digit(self) -> u8 {
        self as u8
    }

    /// Next mode in the cycle, wrapping after the last one.
    pub fn next(self) -> AaMode {
        let pos = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(pos + 1) % Self::ALL.len()]
    }

    pub fn filter(self) -> FilterType {
        match self {
            AaMode::Nearest => FilterType::Nearest,
            AaMode::Bilinear => FilterType::Triangle,
            AaMode::Bicubic => FilterType::CatmullRom,
            AaMode::Gaussian => FilterType::Gaussian,
            AaMode::Lanczos => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for AaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AaMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "antialiasing",
                value: s.to_string(),
            })
    }
}

/// Parses `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
pub fn parse_color(s: &str) -> Option<Rgba<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 0xff])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// Visible part of a rectangle: `(x0, y0, x1, y1)` in destination space.
/// `copy` leaves clipping to `imageops`, lines and fills go through here.
fn clip(dst: &RgbaImage, x: i64, y: i64, w: i64, h: i64) -> Option<(u32, u32, u32, u32)> {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + w).min(dst.width() as i64);
    let y1 = (y + h).min(dst.height() as i64);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// Fills a rectangle, replacing the destination pixels.
pub fn fill(dst: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>) {
    if let Some((x0, y0, x1, y1)) = clip(dst, x, y, w as i64, h as i64) {
        for py in y0..y1 {
            for px in x0..x1 {
                dst.put_pixel(px, py, color);
            }
        }
    }
}

/// Copies `src` to `dst` at `(x, y)`, blending when `alpha` is set.
pub fn copy(src: &RgbaImage, dst: &mut RgbaImage, x: i64, y: i64, alpha: bool) {
    if alpha {
        imageops::overlay(dst, src, x, y);
    } else {
        imageops::replace(dst, src, x, y);
    }
}

/// Scales `src` by `scale` with the given filter and copies it to `(x, y)`.
pub fn scale(
    aa: AaMode,
    src: &RgbaImage,
    dst: &mut RgbaImage,
    x: i64,
    y: i64,
    scale: f32,
    alpha: bool,
) {
    let w = ((src.width() as f32 * scale) as u32).max(1);
    let h = ((src.height() as f32 * scale) as u32).max(1);
    if w == src.width() && h == src.height() {
        copy(src, dst, x, y, alpha);
        return;
    }
    let scaled = imageops::resize(src, w, h, aa.filter());
    copy(&scaled, dst, x, y, alpha);
}

/// Vertical line of `len` pixels starting at `(x, y)`, blended.
pub fn vline(dst: &mut RgbaImage, x: i64, y: i64, len: u32, color: Rgba<u8>) {
    if let Some((x0, y0, _, y1)) = clip(dst, x, y, 1, len as i64) {
        for py in y0..y1 {
            dst.get_pixel_mut(x0, py).blend(&color);
        }
    }
}

/// Horizontal line of `len` pixels starting at `(x, y)`, blended.
pub fn hline(dst: &mut RgbaImage, x: i64, y: i64, len: u32, color: Rgba<u8>) {
    if let Some((x0, y0, x1, _)) = clip(dst, x, y, len as i64, 1) {
        for px in x0..x1 {
            dst.get_pixel_mut(px, y0).blend(&color);
        }
    }
}

/// One pixel wide rectangle outline.
pub fn rect(dst: &mut RgbaImage, x: i64, y: i64, w: u32, h: u32, color: Rgba<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    hline(dst, x, y, w, color);
    hline(dst, x, y + h as i64 - 1, w, color);
    if h > 2 {
        vline(dst, x, y + 1, h - 2, color);
        vline(dst, x + w as i64 - 1, y + 1, h - 2, color);
    }
}
