//! File-backed versioned object store with filesystem change notification.
//!
//! Objects are kept as one YAML file each under a runtime directory. Every
//! mutation advances a per-collection revision counter which is stamped into
//! the object's `resourceVersion`, giving registries optimistic concurrency
//! without an external database. Watch sessions follow the directory through
//! OS file-change events.
//!
//! # Components
//!
//! - [`FileStore`] -- the [`Storage`] implementation over a directory tree
//! - [`FileWatcher`] -- a [`WatchInterface`] turning file events into
//!   [`WatchEvent`]s
//! - [`FileRestOptionsGetter`] -- per-resource wiring for a registry
//!
//! # Design Rules
//!
//! 1. Files are written to a temporary and renamed into place; readers never
//!    see a partial object.
//! 2. Create never overwrites: the final rename refuses to clobber.
//! 3. Delete renames the object to a tombstone; a watcher reports and purges it.
//! 4. Each mutating call consumes exactly one revision.
//! 5. The library logs through `tracing` and never installs a subscriber.

pub mod config;
pub mod continuation;
pub mod error;
pub mod factory;
pub mod file;
pub mod layout;
pub mod options;
pub mod revision;
pub mod traits;
pub mod versioner;
pub mod watch;

// Re-export primary types at crate root for ergonomic imports.
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use factory::{
    file_storage_decorator, FileRestOptionsGetter, IndexerFunc, Indexers, KeyFunc, NewListFunc,
    ResourceKeys, RestOptions, StorageConfig, StorageDecorator, TriggerFuncs,
};
pub use file::{FileStore, FileStoreOptions, NewFunc};
pub use layout::{AtomicWriter, ObjectFile};
pub use options::{
    default_attrs, AttrFunc, GetOptions, ListOptions, Preconditions, ResourceVersionMatch,
    SelectionPredicate,
};
pub use revision::{RevisionCounter, INITIAL_REVISION};
pub use traits::{validate_all, DestroyFn, Storage, UpdateFn, ValidateFn, WatchInterface};
pub use versioner::{ApiObjectVersioner, Versioner};
pub use watch::{EventType, FileWatcher, WatchEvent, WatcherConfig};
