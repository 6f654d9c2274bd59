//! Filesystem monitoring.
//!
//! Notifications arrive on the `notify` backend thread and are forwarded as
//! [`AppEvent::Fs`] messages; the UI thread applies them to the image list.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::WatchError;
use crate::event::{AppEvent, EventSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Modify,
    Remove,
}

/// Filesystem change; directory paths end with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: String,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.path.ends_with('/')
    }
}

/// Registration side of a filesystem watch.
pub trait Monitor: Send {
    /// Watch a file, or a directory (non-recursively).
    fn register(&mut self, path: &str);
    fn unregister_all(&mut self);
}

/// [`Monitor`] backed by the platform's recommended `notify` watcher.
pub struct FsMonitor {
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl FsMonitor {
    pub fn new(sink: EventSink) -> Result<Self, WatchError> {
        let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            match result {
                Ok(event) => {
                    for fs_event in translate(&event) {
                        sink.send(AppEvent::Fs(fs_event));
                    }
                }
                Err(err) => log::warn!("filesystem monitor error: {err}"),
            }
        })?;
        Ok(Self {
            watcher,
            watched: Vec::new(),
        })
    }
}

impl Monitor for FsMonitor {
    fn register(&mut self, path: &str) {
        let path = PathBuf::from(path.trim_end_matches('/'));
        if self.watched.contains(&path) {
            return;
        }
        match self.watcher.watch(&path, RecursiveMode::NonRecursive) {
            Ok(()) => self.watched.push(path),
            Err(err) => log::warn!("unable to watch {}: {err}", path.display()),
        }
    }

    fn unregister_all(&mut self) {
        for path in self.watched.drain(..) {
            let _ = self.watcher.unwatch(&path);
        }
    }
}

impl Drop for FsMonitor {
    fn drop(&mut self) {
        self.unregister_all();
    }
}

impl std::fmt::Debug for FsMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsMonitor")
            .field("watched", &self.watched)
            .finish()
    }
}

/// Maps a backend event to zero or more list-level events.
fn translate(event: &notify::Event) -> Vec<FsEvent> {
    let with_kind = |kind: FsEventKind, path: &Path, is_dir: bool| FsEvent::new(kind, path_string(path, is_dir));
    let first = event.paths.first();
    match event.kind {
        EventKind::Create(kind) => event
            .paths
            .iter()
            .map(|p| with_kind(FsEventKind::Create, p, kind == CreateKind::Folder || p.is_dir()))
            .collect(),
        EventKind::Remove(kind) => event
            .paths
            .iter()
            .map(|p| with_kind(FsEventKind::Remove, p, kind == RemoveKind::Folder))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => first
            .map(|p| vec![with_kind(FsEventKind::Remove, p, false)])
            .unwrap_or_default(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => first
            .map(|p| vec![with_kind(FsEventKind::Create, p, p.is_dir())])
            .unwrap_or_default(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => vec![
            with_kind(FsEventKind::Remove, &event.paths[0], false),
            with_kind(FsEventKind::Create, &event.paths[1], event.paths[1].is_dir()),
        ],
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| with_kind(FsEventKind::Modify, p, false))
            .collect(),
        _ => Vec::new(),
    }
}

fn path_string(path: &Path, is_dir: bool) -> String {
    let mut text = path.to_string_lossy().into_owned();
    if is_dir && !text.ends_with('/') {
        text.push('/');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::DataChange;

    #[test]
    fn folder_events_get_trailing_slash() {
        let event = notify::Event::new(EventKind::Remove(RemoveKind::Folder))
            .add_path(PathBuf::from("/tmp/shots"));
        assert_eq!(
            translate(&event),
            vec![FsEvent::new(FsEventKind::Remove, "/tmp/shots/")]
        );
        assert!(translate(&event)[0].is_dir());
    }

    #[test]
    fn rename_becomes_remove_and_create() {
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/nonexistent/a.png"))
            .add_path(PathBuf::from("/nonexistent/b.png"));
        assert_eq!(
            translate(&event),
            vec![
                FsEvent::new(FsEventKind::Remove, "/nonexistent/a.png"),
                FsEvent::new(FsEventKind::Create, "/nonexistent/b.png"),
            ]
        );
    }

    #[test]
    fn data_change_is_modify() {
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/nonexistent/a.png"));
        assert_eq!(
            translate(&event),
            vec![FsEvent::new(FsEventKind::Modify, "/nonexistent/a.png")]
        );
        let access = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/nonexistent/a.png"));
        assert!(translate(&access).is_empty());
    }
}
