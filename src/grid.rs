use std::collections::HashSet;

use crate::entry::ImageEntry;
use crate::list::{EntryId, ImageList};

/// Navigation request in the thumbnail grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    First,
    Last,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
}

/// One visible thumbnail slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub id: EntryId,
    /// Top left corner in window coordinates.
    pub x: i64,
    pub y: i64,
}

/// Grid geometry and selection.
///
/// Holds only handles into the [`ImageList`]; every method that takes the
/// list expects the caller to hold the list lock for the whole call.
#[derive(Debug, Clone)]
pub struct ThumbnailGrid {
    thumb_size: u32,
    gap: u32,
    width: u32,
    height: u32,
    cols: usize,
    rows: usize,
    /// 0-based list position of the first visible tile, a multiple of `cols`.
    top: usize,
    current: Option<EntryId>,
    /// 1-based index of `current` when last seen, used after it vanishes.
    current_index: usize,
    tiles: Vec<Tile>,
}

impl ThumbnailGrid {
    pub fn new(thumb_size: u32) -> Self {
        Self {
            thumb_size,
            gap: (thumb_size / 10).max(1),
            width: 0,
            height: 0,
            cols: 1,
            rows: 1,
            top: 0,
            current: None,
            current_index: 0,
            tiles: Vec::new(),
        }
    }

    pub fn thumb_size(&self) -> u32 {
        self.thumb_size
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn current(&self) -> Option<EntryId> {
        self.current
    }

    pub fn current_tile(&self) -> Option<&Tile> {
        let current = self.current?;
        self.tiles.iter().find(|t| t.id == current)
    }

    pub fn is_visible(&self, id: EntryId) -> bool {
        self.tiles.iter().any(|t| t.id == id)
    }

    /// Moves the selection to `id` and rebuilds the tiles.
    pub fn set_current(&mut self, list: &ImageList, id: EntryId) {
        if let Some(entry) = list.get(id) {
            self.current = Some(id);
            self.current_index = entry.index();
        }
        self.update(list);
    }

    /// Recomputes the number of rows and columns for a new window size.
    pub fn resize(&mut self, list: &ImageList, width: u32, height: u32) {
        let cell = self.cell();
        self.width = width;
        self.height = height;
        self.cols = (width.saturating_sub(self.gap) / cell).max(1) as usize;
        self.rows = (height.saturating_sub(self.gap) / cell).max(1) as usize;
        self.top -= self.top % self.cols;
        self.update(list);
    }

    /// Revalidates the selection and rebuilds the visible tiles.
    pub fn update(&mut self, list: &ImageList) {
        self.tiles.clear();

        self.current = self
            .current
            .filter(|&id| list.contains(id))
            .or_else(|| {
                let fallback = self.current_index.clamp(1, list.len().max(1));
                list.at_index(fallback)
            });
        let Some(current) = self.current else {
            self.current_index = 0;
            self.top = 0;
            return;
        };
        let Some(pos) = list.get(current).map(|e| e.index() - 1) else {
            return;
        };
        self.current_index = pos + 1;

        // scroll just enough to keep the selection on screen
        let page = self.page();
        let row_start = pos - pos % self.cols;
        if row_start < self.top {
            self.top = row_start;
        } else if pos >= self.top + page {
            self.top = row_start + self.cols - page;
        }
        // no empty rows at the bottom if the list allows it
        let last_row_start = list.len().saturating_sub(1) / self.cols * self.cols;
        let max_top = (last_row_start + self.cols).saturating_sub(page);
        self.top = self.top.min(max_top);

        let cell = self.cell() as i64;
        let grid_w = self.cols as i64 * cell - self.gap as i64;
        let margin_x = ((self.width as i64 - grid_w) / 2).max(0);
        let margin_y = self.gap as i64;

        let mut cursor = list.at_index(self.top + 1);
        for slot in 0..page {
            let Some(id) = cursor else {
                break;
            };
            let (col, row) = ((slot % self.cols) as i64, (slot / self.cols) as i64);
            self.tiles.push(Tile {
                id,
                x: margin_x + col * cell,
                y: margin_y + row * cell,
            });
            cursor = list.next(id);
        }
    }

    /// Applies a navigation request; `true` if the selection changed.
    pub fn select(&mut self, list: &ImageList, direction: Direction) -> bool {
        self.update(list);
        let Some(current) = self.current else {
            return false;
        };
        let cols = self.cols as isize;
        let page = self.page() as isize;

        let target = match direction {
            Direction::First => list.first(),
            Direction::Last => list.last(),
            Direction::Left => list.prev_file(current),
            Direction::Right => list.next_file(current),
            Direction::Up => list.jump(current, -cols),
            Direction::Down => list.jump(current, cols).or_else(|| {
                // step into a shorter last row
                let pos = list.get(current)?.index() - 1;
                let last_row = (list.len() - 1) / self.cols;
                (pos / self.cols < last_row).then(|| list.last()).flatten()
            }),
            Direction::PageUp => list.jump(current, -page).or_else(|| list.first()),
            Direction::PageDown => list.jump(current, page).or_else(|| list.last()),
        };

        match target {
            Some(id) if id != current => {
                if matches!(direction, Direction::PageUp | Direction::PageDown) {
                    self.scroll_page(list, direction);
                }
                self.set_current(list, id);
                true
            }
            _ => false,
        }
    }

    /// Detached copies of entries that need a thumbnail: the selection,
    /// then visible tiles, then (with `preload`) up to `cache` neighbours
    /// outside the window, nearest first.
    pub fn load_queue(&mut self, list: &ImageList, cache: usize, preload: bool) -> Vec<ImageEntry> {
        self.update(list);
        let mut queue = Vec::new();
        let mut push = |id: EntryId| {
            if let Some(entry) = list.get(id).filter(|e| !e.has_thumbnail()) {
                queue.push(entry.detached());
            }
        };

        if let Some(current) = self.current {
            push(current);
        }
        for tile in &self.tiles {
            if Some(tile.id) != self.current {
                push(tile.id);
            }
        }

        if preload {
            let mut after = self.tiles.last().and_then(|t| list.next(t.id));
            let mut before = self.tiles.first().and_then(|t| list.prev(t.id));
            let mut budget = cache;
            while budget > 0 && (after.is_some() || before.is_some()) {
                if let Some(id) = after {
                    push(id);
                    budget -= 1;
                    after = list.next(id);
                }
                if budget == 0 {
                    break;
                }
                if let Some(id) = before {
                    push(id);
                    budget -= 1;
                    before = list.prev(id);
                }
            }
        }

        queue
    }

    /// Frees thumbnails outside the visible window, farthest first, until
    /// at most `cache` of them remain.
    pub fn clear(&mut self, list: &mut ImageList, cache: usize) {
        self.update(list);
        let keep: HashSet<EntryId> = self.tiles.iter().map(|t| t.id).chain(self.current).collect();
        let (first, last) = match (self.tiles.first(), self.tiles.last()) {
            (Some(f), Some(l)) => (
                list.get(f.id).map_or(0, |e| e.index()),
                list.get(l.id).map_or(0, |e| e.index()),
            ),
            _ => (0, 0),
        };

        let mut cached: Vec<(usize, EntryId)> = list
            .iter()
            .filter(|(id, e)| e.has_thumbnail() && !keep.contains(id))
            .map(|(id, e)| {
                let index = e.index();
                let distance = if index < first {
                    first - index
                } else {
                    index.saturating_sub(last)
                };
                (distance, id)
            })
            .collect();
        if cached.len() <= cache {
            return;
        }

        cached.sort_by(|a, b| b.0.cmp(&a.0));
        let excess = cached.len() - cache;
        for (_, id) in cached.into_iter().take(excess) {
            if let Some(entry) = list.get_mut(id) {
                entry.free_thumbnail();
            }
        }
    }

    fn cell(&self) -> u32 {
        self.thumb_size + self.gap
    }

    fn page(&self) -> usize {
        self.cols * self.rows
    }

    fn scroll_page(&mut self, list: &ImageList, direction: Direction) {
        let page = self.page();
        match direction {
            Direction::PageUp => self.top = self.top.saturating_sub(page),
            Direction::PageDown => {
                let limit = list.len().saturating_sub(1) / self.cols * self.cols;
                self.top = (self.top + page).min(limit);
            }
            _ => {}
        }
    }
}
