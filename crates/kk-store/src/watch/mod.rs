//! Change notification for object directories.

pub mod event;
pub mod watcher;

pub use event::{EventType, WatchEvent, INITIAL_EVENTS_END_ANNOTATION};
pub use watcher::{FileWatcher, WatcherConfig, DEFAULT_CHANNEL_CAPACITY};
