//! Background thumbnail loader.
//!
//! At most one worker thread runs at a time. It walks a queue of detached
//! entry copies, produces a thumbnail for each (persistent store first, then
//! a full decode) and merges the result back into the live list. Stopping is
//! cooperative: the worker checks its token at the top of every iteration
//! and right before merging, and [`ThumbLoader::stop`] joins the thread.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::decoder::DecoderRegistry;
use crate::entry::ImageEntry;
use crate::event::{AppEvent, EventSink};
use crate::list::SharedList;
use crate::pstore::ThumbStore;
use crate::thumbnail::{self, ThumbParams};

/// Settings a queue is processed with.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub params: ThumbParams,
    /// Persistent store, `None` when disabled.
    pub store: Option<ThumbStore>,
}

#[derive(Debug)]
pub struct ThumbLoader {
    list: SharedList,
    decoders: Arc<DecoderRegistry>,
    events: EventSink,
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ThumbLoader {
    pub fn new(list: SharedList, decoders: Arc<DecoderRegistry>, events: EventSink) -> Self {
        Self {
            list,
            decoders,
            events,
            worker: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops the current worker, then starts a new one for `queue`.
    ///
    /// An empty queue only stops the worker. Must not be called while
    /// holding the list lock: the old worker may need it to finish.
    pub fn restart(&mut self, queue: Vec<ImageEntry>, settings: &LoaderSettings) -> io::Result<()> {
        self.stop();
        if queue.is_empty() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            list: self.list.clone(),
            decoders: Arc::clone(&self.decoders),
            events: self.events.clone(),
            settings: settings.clone(),
            stop: Arc::clone(&stop),
        };
        log::debug!("thumbnail loader started, {} queued", queue.len());
        let handle = thread::Builder::new()
            .name("thumb-loader".to_string())
            .spawn(move || worker.run(queue))?;
        self.stop = stop;
        self.worker = Some(handle);
        Ok(())
    }

    /// Requests the worker to stop and waits for it. Returns `true` if a
    /// worker was running.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.worker.take() else {
            return false;
        };
        self.stop.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            log::error!("thumbnail loader panicked");
        }
        true
    }

    /// Whether a worker is still processing its queue.
    pub fn is_active(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ThumbLoader {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    list: SharedList,
    decoders: Arc<DecoderRegistry>,
    events: EventSink,
    settings: LoaderSettings,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn run(self, queue: Vec<ImageEntry>) {
        let mut stopped = false;

        for mut item in queue {
            // take the cheap way out if possible
            {
                let mut list = self.list.lock();
                if self.stopped() {
                    stopped = true;
                    break;
                }
                let Some(origin) = list.find(item.source()).and_then(|id| list.get_mut(id)) else {
                    continue;
                };
                if origin.has_thumbnail() {
                    continue;
                }
                if thumbnail::create(origin, &self.settings.params) {
                    drop(list);
                    self.events.request_redraw();
                    continue;
                }
            }

            self.produce(&mut item);

            {
                let mut list = self.list.lock();
                if self.stopped() {
                    stopped = true;
                    break;
                }
                if let Some(id) = list.find(item.source()) {
                    if item.has_thumbnail() {
                        if let Some(origin) = list.get_mut(id) {
                            origin.update(item);
                        }
                    } else {
                        log::info!("remove undisplayable image {}", item.source());
                        list.remove(id);
                    }
                }
            }
            self.events.request_redraw();
        }

        log::debug!("thumbnail loader finished (stopped: {stopped})");
        self.events.send(AppEvent::LoaderFinished { stopped });
    }

    /// Fills `item` with a thumbnail, leaving it without one on failure.
    fn produce(&self, item: &mut ImageEntry) {
        let params = &self.settings.params;
        let store = self.settings.store.as_ref();

        if let Some(thumb) = store.and_then(|s| s.load(item.source(), params)) {
            item.restore_thumbnail(thumb);
            return;
        }

        if let Err(err) = item.load(&self.decoders) {
            log::warn!("unable to load {}: {err}", item.source());
            return;
        }
        if thumbnail::create(item, params) {
            let larger = item
                .frames()
                .first()
                .map(|f| f.pixmap.width() > params.size && f.pixmap.height() > params.size)
                .unwrap_or(false);
            if let (Some(store), Some(thumb), true) = (store, item.thumbnail(), larger) {
                if let Err(err) = store.save(item.source(), thumb, params) {
                    log::debug!("thumbnail of {} not persisted: {err}", item.source());
                }
            }
        }
        item.free_frames();
    }
}
