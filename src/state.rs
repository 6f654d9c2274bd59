//! Application context: owns the shared list, the gallery and the UI side of
//! the event channel.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use image::RgbaImage;

use crate::config::Config;
use crate::decoder::DecoderRegistry;
use crate::event::{self, AppEvent, EventSink};
use crate::gallery::Gallery;
use crate::list::{EntryId, ImageList, ListOptions, SharedList};
use crate::pstore::ThumbStore;
use crate::watch::{FsEvent, FsMonitor};

pub const APP_NAME: &str = "imgshelf";

#[derive(Debug)]
pub struct Context {
    list: SharedList,
    events: EventSink,
    rx: Receiver<AppEvent>,
    gallery: Gallery,
    frame: RgbaImage,
    exit_code: Option<i32>,
}

impl Context {
    pub fn init(config: Config) -> Self {
        let (events, rx) = event::channel();

        let mut list = ImageList::new(ListOptions::from(&config.list));
        if config.list.fsmon {
            match FsMonitor::new(events.clone()) {
                Ok(monitor) => list.set_monitor(Box::new(monitor)),
                Err(err) => log::warn!("filesystem monitoring disabled: {err}"),
            }
        }
        let list = SharedList::new(list);

        let store = if config.gallery.pstore {
            let store = ThumbStore::in_cache_dir(APP_NAME);
            match &store {
                Some(store) => log::debug!("thumbnail store at {}", store.root().display()),
                None => log::warn!("no cache directory, thumbnail store disabled"),
            }
            store
        } else {
            None
        };

        let decoders = Arc::new(DecoderRegistry::with_defaults());
        log::debug!("decoders: {}", decoders.names().join(", "));

        let gallery = Gallery::new(config.gallery, list.clone(), decoders, events.clone(), store);

        Self {
            list,
            events,
            rx,
            gallery,
            frame: RgbaImage::new(0, 0),
            exit_code: None,
        }
    }

    pub fn list(&self) -> &SharedList {
        &self.list
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn gallery_mut(&mut self) -> &mut Gallery {
        &mut self.gallery
    }

    /// Last rendered frame.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Builds the image list; returns the entry to show first.
    pub fn load(&mut self, sources: &[String]) -> Option<EntryId> {
        self.list.lock().load(sources)
    }

    /// Opens the gallery on `id` with a `width x height` frame.
    pub fn activate(&mut self, id: EntryId, width: u32, height: u32) {
        self.frame = RgbaImage::new(width, height);
        self.gallery.activate(id, width, height);
        self.events.request_redraw();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame = RgbaImage::new(width, height);
        self.gallery.on_resize(width, height);
        self.events.request_redraw();
    }

    /// Handles one event from the channel.
    pub fn dispatch(&mut self, event: AppEvent) {
        match event {
            AppEvent::Redraw => self.gallery.redraw(&mut self.frame),
            AppEvent::Exit(code) => self.exit_code = Some(code),
            AppEvent::Fs(fs_event) => self.on_fs_event(&fs_event),
            AppEvent::LoaderFinished { stopped } => self.gallery.on_loader_finished(stopped),
        }
    }

    fn on_fs_event(&mut self, event: &FsEvent) {
        log::debug!("fs event {:?} {}", event.kind, event.path);
        let change = self.list.lock().apply_fs_event(event);
        if let Some(change) = change {
            self.gallery.on_list_change(&change);
        }
    }

    /// Processes events until nothing arrives for `idle` while the loader is
    /// not running, or until an exit is requested. Redraw requests queued
    /// together are rendered once.
    pub fn pump(&mut self, idle: Duration) -> Option<i32> {
        while self.exit_code.is_none() {
            let event = match self.rx.recv_timeout(idle) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) if self.gallery.loader_active() => continue,
                Err(_) => break,
            };
            let mut redraw = false;
            for event in std::iter::once(event).chain(self.rx.try_iter().collect::<Vec<_>>()) {
                if event == AppEvent::Redraw {
                    redraw = true;
                } else {
                    self.dispatch(event);
                }
            }
            if redraw {
                self.dispatch(AppEvent::Redraw);
            }
        }
        self.exit_code
    }

    /// Stops background work and releases the list.
    pub fn shutdown(mut self) -> Option<i32> {
        self.gallery.deactivate();
        self.list.lock().clear_thumbnails();
        self.exit_code
    }
}
