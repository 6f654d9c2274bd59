//! Rendering of the thumbnail grid into an RGBA frame.

use image::{Rgba, RgbaImage};

use crate::config::GalleryConfig;
use crate::entry::ImageEntry;
use crate::grid::{ThumbnailGrid, Tile};
use crate::list::ImageList;
use crate::pixmap::{self, AaMode};

/// Enlargement of the selected tile.
pub const SELECTED_SCALE: f32 = 1.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStyle {
    pub size: u32,
    pub aa: AaMode,
    pub window: Rgba<u8>,
    pub background: Rgba<u8>,
    pub select: Rgba<u8>,
    pub border: Rgba<u8>,
    pub shadow: Rgba<u8>,
}

impl From<&GalleryConfig> for TileStyle {
    fn from(cfg: &GalleryConfig) -> Self {
        Self {
            size: cfg.size,
            aa: cfg.antialiasing,
            window: cfg.window,
            background: cfg.background,
            select: cfg.select,
            border: cfg.border,
            shadow: cfg.shadow,
        }
    }
}

/// Draws the whole grid, selected tile last. Returns `true` if every
/// visible tile already has its thumbnail.
pub fn draw_grid(frame: &mut RgbaImage, style: &TileStyle, grid: &ThumbnailGrid, list: &ImageList) -> bool {
    let (w, h) = frame.dimensions();
    pixmap::fill(frame, 0, 0, w, h, style.window);

    let mut all_loaded = true;
    let current = grid.current();
    for tile in grid.tiles() {
        let Some(entry) = list.get(tile.id) else {
            continue;
        };
        all_loaded &= entry.has_thumbnail();
        if Some(tile.id) != current {
            draw_tile(frame, style, tile, entry);
        }
    }
    if let Some(tile) = grid.current_tile() {
        if let Some(entry) = list.get(tile.id) {
            draw_selected(frame, style, tile, entry);
        }
    }
    all_loaded
}

/// Plain tile: background square with the thumbnail centred on it.
pub fn draw_tile(frame: &mut RgbaImage, style: &TileStyle, tile: &Tile, entry: &ImageEntry) {
    let size = style.size;
    pixmap::fill(frame, tile.x, tile.y, size, size, style.background);
    if let Some(thumb) = entry.thumbnail() {
        let x = tile.x + (size / 2) as i64 - (thumb.width() / 2) as i64;
        let y = tile.y + (size / 2) as i64 - (thumb.height() / 2) as i64;
        pixmap::copy(thumb, frame, x, y, entry.alpha());
    }
}

/// Selected tile: enlarged, kept inside the frame horizontally, with a drop
/// shadow along the right and bottom edges and an optional border.
pub fn draw_selected(frame: &mut RgbaImage, style: &TileStyle, tile: &Tile, entry: &ImageEntry) {
    let size = (SELECTED_SCALE * style.size as f32) as u32;
    let offset = ((size - style.size) / 2) as i64;
    let frame_w = frame.width() as i64;

    let mut x = (tile.x - offset).max(0);
    let y = (tile.y - offset).max(0);
    if x + size as i64 >= frame_w {
        x = frame_w - size as i64;
    }

    pixmap::fill(frame, x, y, size, size, style.select);

    if let Some(thumb) = entry.thumbnail() {
        let thumb_w = (thumb.width() as f32 * SELECTED_SCALE) as u32;
        let thumb_h = (thumb.height() as f32 * SELECTED_SCALE) as u32;
        let tx = x + (size / 2) as i64 - (thumb_w / 2) as i64;
        let ty = y + (size / 2) as i64 - (thumb_h / 2) as i64;
        pixmap::scale(style.aa, thumb, frame, tx, ty, SELECTED_SCALE, entry.alpha());
    }

    let alpha = style.shadow[3];
    if alpha > 0 {
        let width = ((size as f64 / 15.0 * (alpha as f64 / 255.0)) as u32).max(1);
        let step = alpha as u32 / width;
        for i in 0..width {
            let color = shadow_color(style.shadow, alpha as u32 - i * step);
            let fade = width - i;
            pixmap::vline(
                frame,
                x + (size + i) as i64,
                y + width as i64,
                size.saturating_sub(fade),
                color,
            );
            pixmap::hline(
                frame,
                x + width as i64,
                y + (size + i) as i64,
                size.saturating_sub(fade) + 1,
                color,
            );
        }
    }

    if style.border[3] > 0 {
        pixmap::rect(frame, x, y, size, size, style.border);
    }
}

fn shadow_color(base: Rgba<u8>, alpha: u32) -> Rgba<u8> {
    Rgba([base[0], base[1], base[2], alpha.min(255) as u8])
}
