//! Ordered image collection with an asynchronous, persistently cached
//! thumbnail gallery.

pub mod config;
pub mod decoder;
pub mod draw;
pub mod entry;
pub mod error;
pub mod event;
pub mod gallery;
pub mod grid;
pub mod list;
pub mod loader;
pub mod order;
pub mod pixmap;
pub mod pstore;
pub mod source;
pub mod state;
pub mod thumbnail;
pub mod watch;

pub use config::Config;
pub use entry::ImageEntry;
pub use list::{EntryId, ImageList, SharedList};
pub use state::Context;
