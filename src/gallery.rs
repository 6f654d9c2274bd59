//! Gallery mode: the thumbnail grid, its loader and the reactions to user
//! requests and list changes.
//!
//! All methods run on the UI thread. The list lock is only held for short
//! sections and never while starting or joining the loader thread.

use std::sync::Arc;

use image::RgbaImage;

use crate::config::GalleryConfig;
use crate::decoder::DecoderRegistry;
use crate::draw::{self, TileStyle};
use crate::entry::ImageEntry;
use crate::event::EventSink;
use crate::grid::{Direction, ThumbnailGrid};
use crate::list::{EntryId, ImageList, ListChange, SharedList};
use crate::loader::{LoaderSettings, ThumbLoader};
use crate::pixmap::AaMode;
use crate::pstore::ThumbStore;
use crate::thumbnail::{self, ThumbParams};
use crate::watch::FsEventKind;

#[derive(Debug)]
pub struct Gallery {
    cfg: GalleryConfig,
    list: SharedList,
    events: EventSink,
    grid: ThumbnailGrid,
    loader: ThumbLoader,
    store: Option<ThumbStore>,
    info: InfoText,
}

impl Gallery {
    pub fn new(
        cfg: GalleryConfig,
        list: SharedList,
        decoders: Arc<DecoderRegistry>,
        events: EventSink,
        store: Option<ThumbStore>,
    ) -> Self {
        let loader = ThumbLoader::new(list.clone(), decoders, events.clone());
        Self {
            grid: ThumbnailGrid::new(cfg.size),
            cfg,
            list,
            events,
            loader,
            store,
            info: InfoText::default(),
        }
    }

    pub fn params(&self) -> ThumbParams {
        self.cfg.thumb_params()
    }

    pub fn aa(&self) -> AaMode {
        self.cfg.antialiasing
    }

    pub fn grid(&self) -> &ThumbnailGrid {
        &self.grid
    }

    pub fn current(&self) -> Option<EntryId> {
        self.grid.current()
    }

    /// Title line: `[index/total] name` or the last status change.
    pub fn info(&self) -> &str {
        &self.info.title
    }

    /// Format, file size and meta info of the selected entry.
    pub fn details(&self) -> &[String] {
        &self.info.details
    }

    pub fn loader_active(&self) -> bool {
        self.loader.is_active()
    }

    fn settings(&self) -> LoaderSettings {
        LoaderSettings {
            params: self.params(),
            store: self.store.clone().filter(|_| self.cfg.pstore),
        }
    }

    /// Enters the gallery with `id` selected.
    pub fn activate(&mut self, id: EntryId, width: u32, height: u32) {
        let params = self.params();
        let mut list = self.list.lock();
        self.grid.set_current(&list, id);
        self.grid.resize(&list, width, height);
        if let Some(entry) = list.get_mut(id) {
            if !entry.has_thumbnail() {
                thumbnail::create(entry, &params);
            }
        }
        self.info.describe(&list, self.grid.current());
    }

    /// Leaves the gallery, returning the selected entry.
    pub fn deactivate(&mut self) -> Option<EntryId> {
        self.loader.stop();
        self.grid.current()
    }

    /// Moves the selection; `true` if it changed.
    pub fn select(&mut self, direction: Direction) -> bool {
        let queue = {
            let list = self.list.lock();
            if !self.grid.select(&list, direction) {
                return false;
            }
            self.info.describe(&list, self.grid.current());
            self.grid.load_queue(&list, self.cfg.cache, self.cfg.preload)
        };
        if !queue.is_empty() {
            self.restart_loader(queue);
        }
        self.events.request_redraw();
        true
    }

    /// Selects a neighbour of the current entry, optionally removing the
    /// entry from the list. Exits when nothing is left to show.
    pub fn skip_current(&mut self, remove: bool) {
        let mut list = self.list.lock();
        let Some(skip) = self.grid.current() else {
            self.events.request_exit(0);
            return;
        };
        let moved = self.grid.select(&list, Direction::Right) || self.grid.select(&list, Direction::Left);
        if !moved {
            log::info!("no more images to view, exit");
            self.events.request_exit(0);
            return;
        }
        if remove {
            list.remove(skip);
            self.grid.update(&list);
        }
        self.info.describe(&list, self.grid.current());
        self.events.request_redraw();
    }

    /// Drops every thumbnail; the next redraw queues them again.
    pub fn reload(&mut self) {
        self.loader.stop();
        self.list.lock().clear_thumbnails();
        self.events.request_redraw();
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.loader.stop();
        let list = self.list.lock();
        self.grid.resize(&list, width, height);
    }

    /// Cycles the anti-aliasing mode and regenerates thumbnails with it.
    pub fn switch_aa(&mut self) -> AaMode {
        self.cfg.antialiasing = self.cfg.antialiasing.next();
        self.info.status(format!("Anti-aliasing: {}", self.cfg.antialiasing));
        self.reload();
        self.cfg.antialiasing
    }

    /// Reacts to a change already applied to the list.
    pub fn on_list_change(&mut self, change: &ListChange) {
        let is_current = self.grid.current() == Some(change.id);
        match change.kind {
            FsEventKind::Modify if is_current => self.reload(),
            FsEventKind::Remove if is_current => {
                // the handle is stale by now: fall back to the same position
                let list = self.list.lock();
                self.grid.update(&list);
                if list.is_empty() {
                    log::info!("no more images to view, exit");
                    self.events.request_exit(0);
                }
                self.info.describe(&list, self.grid.current());
            }
            _ => {
                let list = self.list.lock();
                self.grid.update(&list);
                self.info.follow(&list, self.grid.current());
            }
        }
        self.events.request_redraw();
    }

    /// Renders the grid. Starts the loader if some visible tiles still lack
    /// a thumbnail and nothing is loading them.
    pub fn redraw(&mut self, frame: &mut RgbaImage) {
        let style = TileStyle::from(&self.cfg);
        let queue = {
            let list = self.list.lock();
            self.grid.update(&list);
            self.info.follow(&list, self.grid.current());
            let all_loaded = draw::draw_grid(frame, &style, &self.grid, &list);
            if all_loaded || self.loader.is_active() {
                Vec::new()
            } else {
                self.grid.load_queue(&list, self.cfg.cache, self.cfg.preload)
            }
        };
        if !queue.is_empty() {
            self.restart_loader(queue);
        }
    }

    /// Evicts distant thumbnails once a worker has drained its queue.
    pub fn on_loader_finished(&mut self, stopped: bool) {
        if stopped || self.cfg.cache == 0 {
            return;
        }
        let mut list = self.list.lock();
        self.grid.clear(&mut list, self.cfg.cache);
    }

    fn restart_loader(&mut self, queue: Vec<ImageEntry>) {
        let settings = self.settings();
        if let Err(err) = self.loader.restart(queue, &settings) {
            log::error!("unable to start thumbnail loader: {err}");
        }
    }
}

impl Drop for Gallery {
    fn drop(&mut self) {
        self.loader.stop();
    }
}

/// Selection, its position, list size and whether it has been decoded.
type InfoKey = (EntryId, usize, usize, bool);

/// Overlay text for the selected entry or the last status change.
#[derive(Debug, Default)]
struct InfoText {
    title: String,
    details: Vec<String>,
    shown: Option<InfoKey>,
}

impl InfoText {
    fn status(&mut self, text: String) {
        self.title = text;
        self.details.clear();
    }

    fn describe(&mut self, list: &ImageList, id: Option<EntryId>) {
        self.shown = info_key(list, id);
        self.details.clear();
        let Some(entry) = id.and_then(|id| list.get(id)) else {
            self.title.clear();
            return;
        };
        let name = entry
            .name()
            .unwrap_or_else(|| entry.source().rsplit('/').next().unwrap_or_default());
        self.title = format!("[{}/{}] {}", entry.index(), list.len(), name);

        if let Some(format) = entry.format() {
            self.details.push(format!("Format: {format}"));
        }
        if let Some(size) = entry.file_size() {
            self.details.push(format!("File size: {}", human_size(size)));
        }
        for meta in entry.meta() {
            self.details.push(format!("{}: {}", meta.key, meta.value));
        }
    }

    /// Describes the selection again once it moved, shifted or got decoded.
    fn follow(&mut self, list: &ImageList, id: Option<EntryId>) {
        if info_key(list, id) != self.shown {
            self.describe(list, id);
        }
    }
}

fn info_key(list: &ImageList, id: Option<EntryId>) -> Option<InfoKey> {
    let id = id?;
    let entry = list.get(id)?;
    Some((id, entry.index(), list.len(), entry.format().is_some()))
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{self, AppEvent};
    use crate::list::ListOptions;
    use crate::order::Order;
    use crate::watch::FsEvent;
    use crossbeam_channel::Receiver;

    fn gallery(count: usize) -> (Gallery, SharedList, Vec<EntryId>, Receiver<AppEvent>) {
        let mut list = ImageList::new(ListOptions {
            order: Order::None,
            loop_mode: false,
            ..ListOptions::default()
        });
        let ids: Vec<EntryId> = (0..count).map(|i| list.add(format!("/pics/{i:02}.png"))).collect();
        let shared = SharedList::new(list);
        let (sink, rx) = event::channel();
        let cfg = GalleryConfig {
            size: 10,
            ..GalleryConfig::default()
        };
        let mut gallery = Gallery::new(
            cfg,
            shared.clone(),
            Arc::new(DecoderRegistry::empty()),
            sink,
            None,
        );
        gallery.activate(ids[0], 50, 30);
        (gallery, shared, ids, rx)
    }

    /// Keeps redraws from starting the loader.
    fn fill_thumbnails(list: &SharedList) {
        let mut guard = list.lock();
        let ids: Vec<EntryId> = guard.iter().map(|(id, _)| id).collect();
        for id in ids {
            guard.get_mut(id).unwrap().set_thumbnail(RgbaImage::new(1, 1));
        }
    }

    fn drain(rx: &Receiver<AppEvent>) -> Vec<AppEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn activation_describes_selection() {
        let (gallery, _list, ids, _rx) = gallery(3);
        assert_eq!(gallery.current(), Some(ids[0]));
        assert_eq!(gallery.info(), "[1/3] 00.png");
    }

    #[test]
    fn skip_with_remove_selects_neighbour() {
        let (mut gallery, list, ids, rx) = gallery(3);
        gallery.skip_current(true);
        assert_eq!(gallery.current(), Some(ids[1]));
        assert_eq!(list.lock().len(), 2);
        assert!(!list.lock().contains(ids[0]));
        assert!(drain(&rx).contains(&AppEvent::Redraw));
    }

    #[test]
    fn skipping_the_last_entry_exits() {
        let (mut gallery, list, _ids, rx) = gallery(1);
        gallery.skip_current(true);
        assert_eq!(list.lock().len(), 1);
        assert!(drain(&rx).contains(&AppEvent::Exit(0)));
    }

    #[test]
    fn removal_of_current_falls_back() {
        let (mut gallery, list, ids, rx) = gallery(3);
        let change = list
            .lock()
            .apply_fs_event(&FsEvent::new(FsEventKind::Remove, "/pics/00.png"))
            .unwrap();
        gallery.on_list_change(&change);
        assert_eq!(gallery.current(), Some(ids[1]));
        assert!(!drain(&rx).contains(&AppEvent::Exit(0)));
    }

    #[test]
    fn removing_everything_exits() {
        let (mut gallery, list, _ids, rx) = gallery(1);
        let change = list
            .lock()
            .apply_fs_event(&FsEvent::new(FsEventKind::Remove, "/pics/00.png"))
            .unwrap();
        gallery.on_list_change(&change);
        assert!(drain(&rx).contains(&AppEvent::Exit(0)));
    }

    #[test]
    fn modify_of_current_reloads() {
        let (mut gallery, list, ids, _rx) = gallery(2);
        {
            let mut guard = list.lock();
            for id in &ids {
                guard.get_mut(*id).unwrap().set_thumbnail(RgbaImage::new(2, 2));
            }
        }
        let change = list
            .lock()
            .apply_fs_event(&FsEvent::new(FsEventKind::Modify, "/pics/01.png"))
            .unwrap();
        gallery.on_list_change(&change);
        assert!(list.lock().get(ids[0]).unwrap().has_thumbnail());

        let change = list
            .lock()
            .apply_fs_event(&FsEvent::new(FsEventKind::Modify, "/pics/00.png"))
            .unwrap();
        gallery.on_list_change(&change);
        assert!(ids.iter().all(|&id| !list.lock().get(id).unwrap().has_thumbnail()));
    }

    #[test]
    fn switch_aa_cycles_and_reports() {
        let (mut gallery, _list, _ids, _rx) = gallery(1);
        assert_eq!(gallery.aa(), AaMode::Lanczos);
        assert_eq!(gallery.switch_aa(), AaMode::Nearest);
        assert_eq!(gallery.params().aa, AaMode::Nearest);
        assert_eq!(gallery.info(), "Anti-aliasing: nearest");
    }

    #[test]
    fn select_updates_info() {
        let (mut gallery, _list, ids, rx) = gallery(3);
        assert!(gallery.select(Direction::Last));
        assert_eq!(gallery.current(), Some(ids[2]));
        assert_eq!(gallery.info(), "[3/3] 02.png");
        assert!(!gallery.select(Direction::Right));
        gallery.deactivate();
        assert!(drain(&rx).contains(&AppEvent::Redraw));
    }

    #[test]
    fn finished_loader_evicts_distant_thumbnails() {
        let (mut gallery, list, ids, _rx) = {
            let (mut g, l, i, r) = gallery(30);
            g.cfg.cache = 2;
            (g, l, i, r)
        };
        {
            let mut guard = list.lock();
            for id in &ids {
                guard.get_mut(*id).unwrap().set_thumbnail(RgbaImage::new(1, 1));
            }
        }
        gallery.on_loader_finished(true);
        assert!(ids.iter().all(|&id| list.lock().get(id).unwrap().has_thumbnail()));

        gallery.on_loader_finished(false);
        let kept = ids
            .iter()
            .filter(|&&id| list.lock().get(id).unwrap().has_thumbnail())
            .count();
        assert_eq!(kept, 8 + 2);
    }

    #[test]
    fn redraw_follows_selection_removed_elsewhere() {
        let (mut gallery, list, ids, _rx) = gallery(3);
        assert_eq!(gallery.info(), "[1/3] 00.png");
        list.lock().remove(ids[0]);
        fill_thumbnails(&list);

        let mut frame = RgbaImage::new(50, 30);
        gallery.redraw(&mut frame);
        assert_eq!(gallery.current(), Some(ids[1]));
        assert_eq!(gallery.info(), "[1/2] 01.png");
    }

    #[test]
    fn status_survives_until_selection_moves() {
        let (mut gallery, list, _ids, _rx) = gallery(3);
        gallery.switch_aa();
        fill_thumbnails(&list);
        let mut frame = RgbaImage::new(50, 30);
        gallery.redraw(&mut frame);
        assert_eq!(gallery.info(), "Anti-aliasing: nearest");
        gallery.select(Direction::Right);
        assert_eq!(gallery.info(), "[2/3] 01.png");
    }

    #[test]
    fn details_list_meta_info() {
        let (mut gallery, list, ids, _rx) = gallery(2);
        fill_thumbnails(&list);
        list.lock().get_mut(ids[1]).unwrap().add_meta("Model", "X100");
        gallery.select(Direction::Right);
        assert_eq!(gallery.details(), ["Model: X100"]);
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(3 * 1024 * 1024 + 512 * 1024), "3.5 MiB");
    }
}
