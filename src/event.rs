use crossbeam_channel::{Receiver, Sender};

use crate::watch::FsEvent;

/// Messages delivered to the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Something visible changed.
    Redraw,
    /// Leave the event loop with the given process exit code.
    Exit(i32),
    /// Filesystem change reported by the monitor.
    Fs(FsEvent),
    /// The thumbnail loader thread ran out of work or was stopped.
    LoaderFinished { stopped: bool },
}

/// Cloneable sending half handed to background threads.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<AppEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<AppEvent>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: AppEvent) {
        // the receiver is gone only during teardown
        let _ = self.tx.send(event);
    }

    pub fn request_redraw(&self) {
        self.send(AppEvent::Redraw);
    }

    pub fn request_exit(&self, code: i32) {
        self.send(AppEvent::Exit(code));
    }
}

pub fn channel() -> (EventSink, Receiver<AppEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (EventSink::new(tx), rx)
}
