use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use kk_codec::Codec;
use kk_types::Object;

use crate::error::{StoreError, StoreResult};
use crate::layout::ObjectFile;
use crate::traits::WatchInterface;
use crate::versioner::Versioner;
use crate::watch::event::{WatchEvent, INITIAL_EVENTS_END_ANNOTATION};

/// Default capacity of the event channel handed to consumers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// How often the worker checks for a stop request while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Everything a [`FileWatcher`] needs to know about the directory it watches.
pub struct WatcherConfig<T> {
    /// Directory holding object files.
    pub path: PathBuf,
    /// `path` is the prefix of a namespaced resource: object files live one
    /// level down, in per-namespace directories that come and go.
    pub namespaced_root: bool,
    pub codec: Arc<dyn Codec<T>>,
    pub versioner: Arc<dyn Versioner>,
    pub channel_capacity: usize,
    /// Replay existing objects as `Added`, then emit a bookmark.
    pub send_initial_events: bool,
    /// Revision stamped into the initial-events bookmark.
    pub initial_revision: u64,
}

struct Shared {
    notifier: Mutex<Option<RecommendedWatcher>>,
    stopped: AtomicBool,
}

/// Watch session over one object directory.
///
/// A dedicated thread turns raw filesystem notifications into
/// [`WatchEvent`]s. Creating or overwriting a live file yields `Added` or
/// `Modified`; a tombstone appearing yields `Deleted` and is then purged.
/// Rewrites that leave a file's bytes unchanged are not reported.
///
/// The event channel is closed when the session ends, whether through
/// [`stop`](WatchInterface::stop), drop, or a notifier failure (reported as a
/// final [`WatchEvent::Error`]).
pub struct FileWatcher<T> {
    events: mpsc::Receiver<WatchEvent<T>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Object> FileWatcher<T> {
    pub fn start(config: WatcherConfig<T>) -> StoreResult<Self> {
        fs::create_dir_all(&config.path)?;

        let (raw_tx, raw_rx) = std_mpsc::channel();
        let mut notifier = notify::recommended_watcher(raw_tx)?;
        notifier.watch(&config.path, RecursiveMode::NonRecursive)?;

        let shared = Arc::new(Shared {
            notifier: Mutex::new(Some(notifier)),
            stopped: AtomicBool::new(false),
        });
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));

        let mut worker = Worker {
            root: config.path.clone(),
            namespaced_root: config.namespaced_root,
            codec: config.codec,
            shared: Arc::clone(&shared),
            tx,
            known: HashMap::new(),
            departed: HashMap::new(),
            namespace_watches: BTreeSet::new(),
        };
        let existing = worker.seed()?;

        let replay = config.send_initial_events.then(|| {
            let mut bookmark = T::default();
            config
                .versioner
                .update_object(bookmark.metadata_mut(), config.initial_revision);
            bookmark
                .metadata_mut()
                .annotations
                .insert(INITIAL_EVENTS_END_ANNOTATION.to_string(), "true".to_string());
            (existing, bookmark)
        });

        info!(
            path = %config.path.display(),
            namespaced = config.namespaced_root,
            known = worker.known.len(),
            "watch started"
        );

        let handle = thread::Builder::new()
            .name("kk-watch".into())
            .spawn(move || worker.run(raw_rx, replay))?;

        Ok(Self {
            events: rx,
            shared,
            worker: Some(handle),
        })
    }
}

impl<T: Object> WatchInterface<T> for FileWatcher<T> {
    fn result_chan(&mut self) -> &mut mpsc::Receiver<WatchEvent<T>> {
        &mut self.events
    }

    /// Ends the session and waits for the worker thread, which can take up
    /// to one poll interval. Buffered events stay readable.
    fn stop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("watch worker panicked");
            }
        }
    }
}

impl<T> FileWatcher<T> {
    fn shutdown(&mut self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared
            .notifier
            .lock()
            .expect("notifier lock poisoned")
            .take();
        // Unblocks a worker waiting on a full channel.
        self.events.close();
        debug!("watch stopped");
    }
}

/// Dropping does not wait for the worker; it exits on its next poll.
impl<T> Drop for FileWatcher<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Tracked<T> {
    hash: blake3::Hash,
    object: T,
}

enum Snapshot<T> {
    Gone,
    Unreadable,
    Object(blake3::Hash, T),
}

struct Worker<T> {
    root: PathBuf,
    namespaced_root: bool,
    codec: Arc<dyn Codec<T>>,
    shared: Arc<Shared>,
    tx: mpsc::Sender<WatchEvent<T>>,
    /// Live files already reported, with the content hash last seen.
    known: HashMap<PathBuf, Tracked<T>>,
    /// Live files that disappeared; used to report a deletion whose
    /// tombstone another watcher purged first.
    departed: HashMap<PathBuf, T>,
    namespace_watches: BTreeSet<PathBuf>,
}

impl<T: Object> Worker<T> {
    /// Watch existing namespace directories and record the live objects
    /// present at start. Returns them in path order.
    fn seed(&mut self) -> StoreResult<Vec<T>> {
        let depth = if self.namespaced_root { 2 } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_vanished(&e) => continue,
                Err(e) => return Err(io::Error::from(e).into()),
            };
            if entry.file_type().is_dir() {
                if self.namespaced_root && entry.depth() == 1 {
                    self.add_namespace_watch(entry.path())?;
                }
            } else if matches!(ObjectFile::parse(entry.path()), Some(ObjectFile::Live(_))) {
                files.push(entry.into_path());
            }
        }

        let mut existing = Vec::with_capacity(files.len());
        for path in files {
            if let Snapshot::Object(hash, object) = self.snapshot(&path) {
                existing.push(object.clone());
                self.known.insert(path, Tracked { hash, object });
            }
        }
        Ok(existing)
    }

    fn run(
        mut self,
        raw: std_mpsc::Receiver<notify::Result<Event>>,
        replay: Option<(Vec<T>, T)>,
    ) {
        if let Some((existing, bookmark)) = replay {
            for object in existing {
                if !self.emit(WatchEvent::Added(object)) {
                    return;
                }
            }
            if !self.emit(WatchEvent::Bookmark(bookmark)) {
                return;
            }
        }

        while !self.shared.stopped.load(Ordering::Acquire) {
            match raw.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(event)) => {
                    if !self.handle(event) {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    warn!(path = %self.root.display(), error = %e, "notifier failed");
                    self.emit(WatchEvent::Error(e.to_string()));
                    break;
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!(path = %self.root.display(), "watch worker exiting");
    }

    /// Returns `false` once the consumer is gone.
    fn handle(&mut self, event: Event) -> bool {
        if !is_relevant(&event.kind) {
            return true;
        }
        for path in &event.paths {
            if !self.handle_path(path) {
                return false;
            }
        }
        true
    }

    fn handle_path(&mut self, path: &Path) -> bool {
        if self.is_namespace_dir(path) {
            return self.reconcile_namespace(path);
        }
        match ObjectFile::parse(path) {
            Some(ObjectFile::Live(_)) => self.reconcile_live(path),
            Some(ObjectFile::Tombstoned(name)) => {
                let live = path.with_file_name(ObjectFile::Live(name).file_name());
                self.reconcile_tombstone(path, &live)
            }
            None => true,
        }
    }

    fn is_namespace_dir(&self, path: &Path) -> bool {
        self.namespaced_root
            && path.parent() == Some(self.root.as_path())
            && (path.is_dir() || self.namespace_watches.contains(path))
    }

    fn reconcile_namespace(&mut self, dir: &Path) -> bool {
        if dir.is_dir() {
            if self.namespace_watches.contains(dir) {
                return true;
            }
            if let Err(e) = self.add_namespace_watch(dir) {
                warn!(path = %dir.display(), error = %e, "cannot watch namespace");
                return true;
            }
            debug!(path = %dir.display(), "watching new namespace");
            // Files may have landed before the watch was in place.
            let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
                Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "namespace vanished during scan");
                    return true;
                }
            };
            files.sort();
            for path in files {
                if !self.handle_path(&path) {
                    return false;
                }
            }
        } else if self.namespace_watches.remove(dir) {
            if let Some(notifier) = self
                .shared
                .notifier
                .lock()
                .expect("notifier lock poisoned")
                .as_mut()
            {
                if let Err(e) = notifier.unwatch(dir) {
                    debug!(path = %dir.display(), error = %e, "cannot unwatch namespace");
                }
            }
            self.known.retain(|path, _| !path.starts_with(dir));
            self.departed.retain(|path, _| !path.starts_with(dir));
            debug!(path = %dir.display(), "namespace removed");
        }
        true
    }

    fn add_namespace_watch(&mut self, dir: &Path) -> StoreResult<()> {
        let mut guard = self.shared.notifier.lock().expect("notifier lock poisoned");
        let notifier = guard
            .as_mut()
            .ok_or_else(|| StoreError::Watch("watch stopped".into()))?;
        notifier.watch(dir, RecursiveMode::NonRecursive)?;
        self.namespace_watches.insert(dir.to_path_buf());
        Ok(())
    }

    fn reconcile_live(&mut self, path: &Path) -> bool {
        match self.snapshot(path) {
            Snapshot::Gone => {
                if let Some(tracked) = self.known.remove(path) {
                    self.departed.insert(path.to_path_buf(), tracked.object);
                }
                true
            }
            Snapshot::Unreadable => true,
            Snapshot::Object(hash, object) => {
                self.departed.remove(path);
                let modified = match self.known.get(path) {
                    Some(tracked) if tracked.hash == hash => return true,
                    Some(_) => true,
                    None => false,
                };
                self.known.insert(
                    path.to_path_buf(),
                    Tracked {
                        hash,
                        object: object.clone(),
                    },
                );
                if modified {
                    self.emit(WatchEvent::Modified(object))
                } else {
                    self.emit(WatchEvent::Added(object))
                }
            }
        }
    }

    fn reconcile_tombstone(&mut self, path: &Path, live: &Path) -> bool {
        let mut last_known = self.departed.remove(live);
        if !live.exists() {
            if let Some(tracked) = self.known.remove(live) {
                last_known.get_or_insert(tracked.object);
            }
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            // Already purged by another watcher.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return match last_known {
                    Some(object) => self.emit(WatchEvent::Deleted(object)),
                    None => true,
                };
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read tombstone");
                self.keep_departed(live, last_known);
                return true;
            }
        };

        let object = match self.codec.decode(&bytes) {
            Ok(object) if !object.metadata().is_anonymous() => object,
            // Usually a tombstone caught mid-write; the closing event follows.
            Ok(_) => {
                debug!(path = %path.display(), "tombstone without a name, waiting");
                self.keep_departed(live, last_known);
                return true;
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "undecodable tombstone, waiting");
                self.keep_departed(live, last_known);
                return true;
            }
        };

        // The tombstone stays on disk until a consumer has the deletion.
        if !self.emit(WatchEvent::Deleted(object)) {
            return false;
        }
        purge(path);
        true
    }

    fn keep_departed(&mut self, live: &Path, last_known: Option<T>) {
        if let Some(object) = last_known {
            self.departed.insert(live.to_path_buf(), object);
        }
    }

    fn snapshot(&self, path: &Path) -> Snapshot<T> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Snapshot::Gone,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read object file");
                return Snapshot::Unreadable;
            }
        };
        let hash = blake3::hash(&bytes);
        match self.codec.decode(&bytes) {
            Ok(object) if object.metadata().is_anonymous() => {
                debug!(path = %path.display(), "skipping object without a name");
                Snapshot::Unreadable
            }
            Ok(object) => Snapshot::Object(hash, object),
            // Usually a file caught mid-write; the closing event follows.
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping undecodable object file");
                Snapshot::Unreadable
            }
        }
    }

    fn emit(&self, event: WatchEvent<T>) -> bool {
        self.tx.blocking_send(event).is_ok()
    }
}

fn purge(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "purged tombstone"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot purge tombstone"),
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        // Reported separately as `From` and `To`.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => false,
        EventKind::Modify(ModifyKind::Name(_))
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Any) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}

/// A directory entry removed between listing and stat.
pub(crate) fn is_vanished(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}
