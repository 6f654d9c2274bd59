//! Ordered image list.
//!
//! Entries live in a generational arena and are chained in display order by
//! handle links. [`EntryId`] handles stay valid until the entry is removed;
//! a removed slot is recycled with a new generation, so stale handles held by
//! the layout are detected instead of aliasing a different entry.
//!
//! The list itself is not synchronised. It is shared between the UI thread
//! and the thumbnail loader as [`SharedList`], and every sequence of calls
//! that must observe a consistent snapshot has to hold the lock throughout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use rand::Rng;

use crate::config::ListConfig;
use crate::entry::ImageEntry;
use crate::order::{goes_before, Order};
use crate::watch::{FsEvent, FsEventKind, Monitor};

/// Handle of an entry in the [`ImageList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId {
    slot: u32,
    generation: u32,
}

#[derive(Debug)]
struct Node {
    entry: ImageEntry,
    prev: Option<EntryId>,
    next: Option<EntryId>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Options that shape list construction and navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub order: Order,
    pub reverse: bool,
    pub loop_mode: bool,
    pub recursive: bool,
    pub all_files: bool,
    pub from_file: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self::from(&ListConfig::default())
    }
}

impl From<&ListConfig> for ListOptions {
    fn from(cfg: &ListConfig) -> Self {
        Self {
            order: cfg.order,
            reverse: cfg.reverse,
            loop_mode: cfg.loop_mode,
            recursive: cfg.recursive,
            all_files: cfg.all,
            from_file: cfg.fromfile,
        }
    }
}

/// Structural change caused by a filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChange {
    pub kind: FsEventKind,
    pub id: EntryId,
    pub source: String,
    /// Position the entry had (remove) or has (create, modify).
    pub index: usize,
}

pub struct ImageList {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<EntryId>,
    tail: Option<EntryId>,
    size: usize,
    pub(crate) opts: ListOptions,
    pub(crate) monitor: Option<Box<dyn Monitor>>,
}

impl std::fmt::Debug for ImageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageList")
            .field("size", &self.size)
            .field("opts", &self.opts)
            .field("monitored", &self.monitor.is_some())
            .finish()
    }
}

impl ImageList {
    pub fn new(opts: ListOptions) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            size: 0,
            opts,
            monitor: None,
        }
    }

    pub fn set_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.monitor = Some(monitor);
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn node(&self, id: EntryId) -> Option<&Node> {
        self.slots
            .get(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: EntryId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Whether the handle still refers to a live entry.
    pub fn contains(&self, id: EntryId) -> bool {
        self.node(id).is_some()
    }

    pub fn get(&self, id: EntryId) -> Option<&ImageEntry> {
        self.node(id).map(|n| &n.entry)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut ImageEntry> {
        self.node_mut(id).map(|n| &mut n.entry)
    }

    /// Exact source match.
    pub fn find(&self, source: &str) -> Option<EntryId> {
        self.iter()
            .find(|(_, entry)| entry.source() == source)
            .map(|(id, _)| id)
    }

    /// Entry at the 1-based position `index`.
    pub fn at_index(&self, index: usize) -> Option<EntryId> {
        if index == 0 || index > self.size {
            return None;
        }
        self.jump(self.head?, index as isize - 1)
    }

    /// Entries in list order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Adds an entry at its ordered position.
    ///
    /// If an entry with the same source exists, that entry is returned and
    /// `entry` is dropped.
    pub fn insert(&mut self, entry: ImageEntry) -> EntryId {
        if let Some(existing) = self.find(entry.source()) {
            return existing;
        }
        let before = self.ordered_position(&entry);
        let id = self.alloc(Node {
            entry,
            prev: None,
            next: None,
        });
        match before {
            Some(pos) => self.link_before(id, pos),
            None => self.link_tail(id),
        }
        self.size += 1;
        self.reindex();
        id
    }

    /// Shortcut for inserting a bare source without stat data.
    pub fn add(&mut self, source: impl Into<String>) -> EntryId {
        self.insert(ImageEntry::new(source))
    }

    /// Unlinks and returns the entry; the handle becomes stale.
    pub fn remove(&mut self, id: EntryId) -> Option<ImageEntry> {
        let (prev, next) = {
            let node = self.node(id)?;
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.set_next(p, next),
            None => self.head = next,
        }
        match next {
            Some(n) => self.set_prev(n, prev),
            None => self.tail = prev,
        }
        let slot = &mut self.slots[id.slot as usize];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.size -= 1;
        self.reindex();
        Some(node.entry)
    }

    /// Recomputes the 1-based `index` of every entry in link order.
    pub fn reindex(&mut self) {
        let mut cursor = self.head;
        let mut index = 0;
        while let Some(node) = cursor.and_then(|id| self.node_mut(id)) {
            index += 1;
            node.entry.index = index;
            cursor = node.next;
        }
        self.size = index;
    }

    pub fn first(&self) -> Option<EntryId> {
        self.head
    }

    pub fn last(&self) -> Option<EntryId> {
        self.tail
    }

    pub fn next(&self, id: EntryId) -> Option<EntryId> {
        self.node(id)?.next
    }

    pub fn prev(&self, id: EntryId) -> Option<EntryId> {
        self.node(id)?.prev
    }

    /// Next entry, wrapping to the first one in loop mode.
    pub fn next_file(&self, id: EntryId) -> Option<EntryId> {
        if !self.contains(id) {
            return None;
        }
        match self.next(id) {
            Some(next) => Some(next),
            None if self.opts.loop_mode => self.head.filter(|&first| first != id),
            None => None,
        }
    }

    /// Previous entry, wrapping to the last one in loop mode.
    pub fn prev_file(&self, id: EntryId) -> Option<EntryId> {
        if !self.contains(id) {
            return None;
        }
        match self.prev(id) {
            Some(prev) => Some(prev),
            None if self.opts.loop_mode => self.tail.filter(|&last| last != id),
            None => None,
        }
    }

    /// First entry forward whose parent directory differs.
    pub fn next_dir(&self, id: EntryId) -> Option<EntryId> {
        self.next_parent(id, true)
    }

    /// First entry backward whose parent directory differs.
    pub fn prev_dir(&self, id: EntryId) -> Option<EntryId> {
        self.next_parent(id, false)
    }

    fn next_parent(&self, start: EntryId, forward: bool) -> Option<EntryId> {
        let current = self.get(start)?.dir_prefix();
        let mut cursor = start;
        loop {
            let step = if forward {
                self.next(cursor)
            } else {
                self.prev(cursor)
            };
            let step = match step {
                Some(id) => id,
                None if self.opts.loop_mode => {
                    if forward {
                        self.head?
                    } else {
                        self.tail?
                    }
                }
                None => return None,
            };
            if step == start {
                return None;
            }
            if self.get(step)?.dir_prefix() != current {
                return Some(step);
            }
            cursor = step;
        }
    }

    /// Uniformly chosen entry other than `id`.
    pub fn rand(&self, id: EntryId) -> Option<EntryId> {
        if self.size < 2 || !self.contains(id) {
            return None;
        }
        let offset = rand::rng().random_range(1..self.size);
        let mut cursor = id;
        for _ in 0..offset {
            cursor = self.next(cursor).or(self.head)?;
        }
        Some(cursor)
    }

    /// Entry `distance` links away; `None` if that runs past either end.
    pub fn jump(&self, id: EntryId, distance: isize) -> Option<EntryId> {
        if !self.contains(id) {
            return None;
        }
        let mut cursor = id;
        for _ in 0..distance.unsigned_abs() {
            cursor = if distance > 0 {
                self.next(cursor)?
            } else {
                self.prev(cursor)?
            };
        }
        Some(cursor)
    }

    /// Signed number of links from `start` to `end`.
    pub fn distance(&self, start: EntryId, end: EntryId) -> isize {
        let (Some(a), Some(b)) = (self.get(start), self.get(end)) else {
            return 0;
        };
        b.index() as isize - a.index() as isize
    }

    /// Drops every in-memory thumbnail.
    pub fn clear_thumbnails(&mut self) {
        for slot in &mut self.slots {
            if let Some(node) = slot.node.as_mut() {
                node.entry.free_thumbnail();
            }
        }
    }

    /// Applies a filesystem event, returning what changed.
    pub fn apply_fs_event(&mut self, event: &FsEvent) -> Option<ListChange> {
        let change = match (event.kind, event.is_dir()) {
            (FsEventKind::Create, true) => {
                if !self.opts.recursive {
                    return None;
                }
                let id = self.add_dir(&event.path)?;
                self.change(FsEventKind::Create, id)
            }
            (FsEventKind::Create, false) => {
                let meta = std::fs::metadata(&event.path).ok()?;
                if !meta.is_file() {
                    return None;
                }
                let id = self.insert(ImageEntry::from_metadata(event.path.clone(), &meta));
                self.change(FsEventKind::Create, id)
            }
            (FsEventKind::Modify, false) => {
                let id = self.find(&event.path)?;
                self.change(FsEventKind::Modify, id)
            }
            (FsEventKind::Remove, false) => {
                let id = self.find(&event.path)?;
                let change = self.change(FsEventKind::Remove, id);
                self.remove(id);
                change
            }
            (FsEventKind::Modify | FsEventKind::Remove, true) => None,
        };
        self.reindex();
        change
    }

    fn change(&self, kind: FsEventKind, id: EntryId) -> Option<ListChange> {
        let entry = self.get(id)?;
        Some(ListChange {
            kind,
            id,
            source: entry.source().to_string(),
            index: entry.index(),
        })
    }

    /// Entry the new one should be linked in front of; `None` appends.
    fn ordered_position(&self, entry: &ImageEntry) -> Option<EntryId> {
        match self.opts.order {
            Order::Random => {
                let pick = rand::rng().random_range(0..=self.size);
                self.iter().nth(pick).map(|(id, _)| id)
            }
            order if order.is_sorted() => self
                .iter()
                .find(|(_, it)| goes_before(order, self.opts.reverse, entry, it))
                .map(|(id, _)| id),
            _ => None,
        }
    }

    fn alloc(&mut self, node: Node) -> EntryId {
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.node = Some(node);
            return EntryId {
                slot,
                generation: entry.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        EntryId {
            slot: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn set_next(&mut self, id: EntryId, next: Option<EntryId>) {
        if let Some(node) = self.node_mut(id) {
            node.next = next;
        }
    }

    fn set_prev(&mut self, id: EntryId, prev: Option<EntryId>) {
        if let Some(node) = self.node_mut(id) {
            node.prev = prev;
        }
    }

    fn link_tail(&mut self, id: EntryId) {
        let old_tail = self.tail;
        if let Some(node) = self.node_mut(id) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(tail) => self.set_next(tail, Some(id)),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn link_before(&mut self, id: EntryId, pos: EntryId) {
        let prev = self.prev(pos);
        if let Some(node) = self.node_mut(id) {
            node.prev = prev;
            node.next = Some(pos);
        }
        self.set_prev(pos, Some(id));
        match prev {
            Some(p) => self.set_next(p, Some(id)),
            None => self.head = Some(id),
        }
    }
}

impl Drop for ImageList {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.as_mut() {
            monitor.unregister_all();
        }
    }
}

pub struct Iter<'a> {
    list: &'a ImageList,
    cursor: Option<EntryId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (EntryId, &'a ImageEntry);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = self.list.node(id)?;
        self.cursor = node.next;
        Some((id, &node.entry))
    }
}

/// The image list shared between the UI thread and the loader thread.
#[derive(Debug, Clone)]
pub struct SharedList {
    inner: Arc<Mutex<ImageList>>,
}

impl SharedList {
    pub fn new(list: ImageList) -> Self {
        Self {
            inner: Arc::new(Mutex::new(list)),
        }
    }

    /// Blocks until the list is available. Not reentrant.
    pub fn lock(&self) -> MutexGuard<'_, ImageList> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Diagnostic probe; never use it to coordinate.
    pub fn is_locked(&self) -> bool {
        matches!(self.inner.try_lock(), Err(TryLockError::WouldBlock))
    }
}
