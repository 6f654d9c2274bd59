use image::imageops;
use image::RgbaImage;

use crate::entry::ImageEntry;
use crate::pixmap::AaMode;

/// Settings a thumbnail is generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbParams {
    /// Tile edge in pixels.
    pub size: u32,
    /// Fill the whole tile (cropping) instead of fitting inside it.
    pub fill: bool,
    pub aa: AaMode,
}

/// Scales `full` down to a thumbnail.
///
/// In fit mode the result keeps the aspect ratio and fits inside the tile;
/// in fill mode the result is exactly `size x size`, centre-cropped.
pub fn derive(full: &RgbaImage, params: &ThumbParams) -> Option<RgbaImage> {
    let (width, height) = full.dimensions();
    if width == 0 || height == 0 || params.size == 0 {
        return None;
    }
    let size = params.size as f32;
    let scale_w = size / width as f32;
    let scale_h = size / height as f32;
    let scale = if params.fill {
        scale_w.max(scale_h)
    } else {
        scale_w.min(scale_h)
    };
    let thumb_w = ((width as f32 * scale) as u32).max(1);
    let thumb_h = ((height as f32 * scale) as u32).max(1);
    let scaled = imageops::resize(full, thumb_w, thumb_h, params.aa.filter());
    if !params.fill {
        return Some(scaled);
    }
    let side = params.size;
    let crop_x = thumb_w.saturating_sub(side) / 2;
    let crop_y = thumb_h.saturating_sub(side) / 2;
    let cropped = imageops::crop_imm(
        &scaled,
        crop_x,
        crop_y,
        side.min(thumb_w),
        side.min(thumb_h),
    )
    .to_image();
    if cropped.dimensions() == (side, side) {
        return Some(cropped);
    }
    // rounding left a thin strip: pad to the full tile
    let mut tile = RgbaImage::new(side, side);
    imageops::replace(
        &mut tile,
        &cropped,
        ((side - cropped.width()) / 2) as i64,
        ((side - cropped.height()) / 2) as i64,
    );
    Some(tile)
}

/// Creates the entry's thumbnail from its first resident frame.
///
/// Returns `false` if the entry has no decoded frames.
pub fn create(entry: &mut ImageEntry, params: &ThumbParams) -> bool {
    let Some(frame) = entry.frames().first() else {
        return false;
    };
    match derive(&frame.pixmap, params) {
        Some(thumb) => {
            entry.set_thumbnail(thumb);
            true
        }
        None => false,
    }
}
