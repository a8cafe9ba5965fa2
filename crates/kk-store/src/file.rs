use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};
use walkdir::WalkDir;

use kk_codec::{Codec, YamlCodec};
use kk_types::{GroupResource, Object, ObjectList};

use crate::config::StoreConfig;
use crate::continuation::{decode_continue, encode_continue};
use crate::error::{StoreError, StoreResult};
use crate::layout::{live_path, tombstone_path, AtomicWriter, ObjectFile, REVISION_FILE};
use crate::options::{
    default_attrs, AttrFunc, GetOptions, ListOptions, Preconditions, ResourceVersionMatch,
};
use crate::revision::RevisionCounter;
use crate::traits::{DestroyFn, Storage, UpdateFn, ValidateFn, WatchInterface};
use crate::versioner::{ApiObjectVersioner, Versioner};
use crate::watch::watcher::is_vanished;
use crate::watch::{FileWatcher, WatcherConfig, DEFAULT_CHANNEL_CAPACITY};

/// Constructs the zero value returned by reads that tolerate a missing key.
pub type NewFunc<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Construction parameters for a [`FileStore`].
pub struct FileStoreOptions<T> {
    /// Directory every key is joined onto.
    pub root_dir: PathBuf,
    /// Collection prefix (`configmaps`, `apps/deployments`). Locates the
    /// revision file and decides when a list spans namespaces.
    pub resource_prefix: String,
    pub resource: GroupResource,
    pub cluster_scoped: bool,
    pub codec: Arc<dyn Codec<T>>,
    pub versioner: Arc<dyn Versioner>,
    pub new_fn: NewFunc<T>,
    pub attr_fn: AttrFunc<T>,
    pub writer: AtomicWriter,
    pub watch_channel_capacity: usize,
}

impl<T: Object> FileStoreOptions<T> {
    /// Options with the YAML codec, decimal resource versions and the
    /// default attribute function.
    pub fn new(
        root_dir: impl Into<PathBuf>,
        resource_prefix: impl Into<String>,
        resource: GroupResource,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            resource_prefix: resource_prefix.into(),
            resource,
            cluster_scoped: false,
            codec: Arc::new(YamlCodec),
            versioner: Arc::new(ApiObjectVersioner),
            new_fn: Arc::new(T::default),
            attr_fn: default_attrs(),
            writer: AtomicWriter::default(),
            watch_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn cluster_scoped(mut self, cluster_scoped: bool) -> Self {
        self.cluster_scoped = cluster_scoped;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec<T>>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_new_fn(mut self, new_fn: NewFunc<T>) -> Self {
        self.new_fn = new_fn;
        self
    }

    pub fn with_attr_fn(mut self, attr_fn: AttrFunc<T>) -> Self {
        self.attr_fn = attr_fn;
        self
    }

    /// Apply the writer and watch settings of a [`StoreConfig`].
    pub fn with_config(mut self, config: &StoreConfig) -> Self {
        self.writer = config.writer();
        self.watch_channel_capacity = config.watch_channel_capacity;
        self
    }
}

/// Object store backed by one YAML file per object.
///
/// Keys are joined onto the root directory as-is (see
/// [`prepare_key`](FileStore::prepare_key)); the object file is the joined
/// path plus `.yaml`. Deletion renames the file to a tombstone which a
/// [`FileWatcher`] reports and purges. Every mutation advances the
/// collection's [`RevisionCounter`] exactly once.
pub struct FileStore<T> {
    root_dir: PathBuf,
    resource_prefix: String,
    resource: GroupResource,
    cluster_scoped: bool,
    codec: Arc<dyn Codec<T>>,
    versioner: Arc<dyn Versioner>,
    new_fn: NewFunc<T>,
    attr_fn: AttrFunc<T>,
    writer: AtomicWriter,
    watch_channel_capacity: usize,
    revision: RevisionCounter,
}

impl<T: Object> FileStore<T> {
    /// Open the store, loading the collection's revision counter.
    ///
    /// The returned [`DestroyFn`] releases nothing but is part of the
    /// registry contract.
    pub fn open(options: FileStoreOptions<T>) -> StoreResult<(Self, DestroyFn)> {
        let prefix = options.resource_prefix.trim_matches('/').to_string();
        let revision = RevisionCounter::load(
            options.root_dir.join(&prefix).join(REVISION_FILE),
            options.writer,
        )?;
        info!(
            resource = %options.resource,
            root = %options.root_dir.display(),
            revision = revision.current(),
            "file store opened"
        );

        let resource = options.resource.clone();
        let destroy: DestroyFn =
            Box::new(move || debug!(resource = %resource, "file store destroyed"));
        let store = Self {
            root_dir: options.root_dir,
            resource_prefix: prefix,
            resource: options.resource,
            cluster_scoped: options.cluster_scoped,
            codec: options.codec,
            versioner: options.versioner,
            new_fn: options.new_fn,
            attr_fn: options.attr_fn,
            writer: options.writer,
            watch_channel_capacity: options.watch_channel_capacity,
            revision,
        };
        Ok((store, destroy))
    }

    /// Filesystem path for a key: the root directory joined with the key.
    /// No other transformation is applied.
    pub fn prepare_key(&self, key: &str) -> PathBuf {
        self.root_dir.join(key.trim_start_matches('/'))
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn resource_prefix(&self) -> &str {
        &self.resource_prefix
    }

    pub fn resource(&self) -> &GroupResource {
        &self.resource
    }

    fn collection_dir(&self) -> PathBuf {
        self.root_dir.join(&self.resource_prefix)
    }

    /// Lists of a namespaced collection root span namespace directories.
    fn list_depth(&self, key: &str) -> usize {
        if !self.cluster_scoped && key.trim_matches('/') == self.resource_prefix {
            2
        } else {
            1
        }
    }

    /// Live object files under `dir`, sorted by path. A missing directory
    /// has none.
    fn live_files(&self, dir: &Path, depth: usize) -> StoreResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_vanished(&e) => continue,
                Err(e) => return Err(io::Error::from(e).into()),
            };
            if entry.file_type().is_file()
                && matches!(ObjectFile::parse(entry.path()), Some(ObjectFile::Live(_)))
            {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Read and decode an object file; `None` if it does not exist.
    fn read_object(&self, path: &Path) -> StoreResult<Option<T>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_filter(&self, opts: &ListOptions) -> StoreResult<Option<(ResourceVersionMatch, u64)>> {
        let rv = opts.resource_version.as_deref().unwrap_or_default();
        match opts.resource_version_match {
            None => {
                // Unconstrained, but still a well-formed version.
                self.versioner.parse_resource_version(rv)?;
                Ok(None)
            }
            Some(_) if rv.is_empty() => Err(StoreError::InvalidArgument(
                "resourceVersionMatch is forbidden unless resourceVersion is provided".into(),
            )),
            Some(m) => Ok(Some((m, self.versioner.parse_resource_version(rv)?))),
        }
    }

    fn list_matches(
        &self,
        obj: &T,
        opts: &ListOptions,
        rv_filter: Option<(ResourceVersionMatch, u64)>,
    ) -> bool {
        if let Some((rule, wanted)) = rv_filter {
            let rv = match self.versioner.object_resource_version(obj.metadata()) {
                Ok(rv) => rv,
                Err(e) => {
                    debug!(name = obj.name(), error = %e, "skipping object with bad version");
                    return false;
                }
            };
            let keep = match rule {
                ResourceVersionMatch::NotOlderThan => rv >= wanted,
                ResourceVersionMatch::Exact => rv == wanted,
            };
            if !keep {
                return false;
            }
        }
        opts.predicate.matches(obj, &self.attr_fn)
    }
}

impl<T: Object> Storage<T> for FileStore<T> {
    fn versioner(&self) -> &dyn Versioner {
        self.versioner.as_ref()
    }

    fn create(&self, key: &str, mut obj: T, ttl: u64) -> StoreResult<T> {
        check_object_key(key)?;
        if ttl != 0 {
            return Err(StoreError::InvalidArgument(
                "ttl is not supported by the file store".into(),
            ));
        }
        if !obj.resource_version().is_empty() {
            return Err(StoreError::InvalidArgument(
                "resourceVersion should not be set on objects to be created".into(),
            ));
        }

        let path = live_path(&self.prepare_key(key));
        if path.exists() {
            return Err(StoreError::already_exists(key));
        }

        let revision = self.revision.advance()?;
        self.versioner.update_object(obj.metadata_mut(), revision);
        let data = self.codec.encode(&obj)?;
        self.writer.create_new(&path, &data).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                StoreError::already_exists(key)
            } else {
                e.into()
            }
        })?;
        debug!(key, revision, "created object");
        Ok(self.codec.decode(&data)?)
    }

    fn delete(
        &self,
        key: &str,
        preconditions: &Preconditions,
        validate: ValidateFn<'_, T>,
        _cached_existing: Option<T>,
    ) -> StoreResult<T> {
        check_object_key(key)?;
        let key_path = self.prepare_key(key);
        let live = live_path(&key_path);
        let mut current = self
            .read_object(&live)?
            .ok_or_else(|| StoreError::not_found(key))?;
        preconditions.check(key, &current)?;
        validate(&current)?;

        let revision = self.revision.advance()?;
        fs::rename(&live, tombstone_path(&key_path)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::not_found(key)
            } else {
                e.into()
            }
        })?;
        self.versioner.update_object(current.metadata_mut(), revision);
        debug!(key, revision, "deleted object");
        Ok(current)
    }

    fn watch(&self, key: &str, opts: &ListOptions) -> StoreResult<Box<dyn WatchInterface<T>>> {
        check_key(key)?;
        let path = self.prepare_key(key);
        let namespaced_root = !self.cluster_scoped && path == self.collection_dir();
        let watcher = FileWatcher::start(WatcherConfig {
            path,
            namespaced_root,
            codec: Arc::clone(&self.codec),
            versioner: Arc::clone(&self.versioner),
            channel_capacity: self.watch_channel_capacity,
            send_initial_events: opts.send_initial_events == Some(true),
            initial_revision: self.revision.current(),
        })?;
        Ok(Box::new(watcher))
    }

    fn get(&self, key: &str, opts: &GetOptions) -> StoreResult<T> {
        check_object_key(key)?;
        if let Some(rv) = opts.resource_version.as_deref() {
            let requested = self.versioner.parse_resource_version(rv)?;
            let current = self.revision.current();
            if requested > current {
                return Err(StoreError::TooLargeResourceVersion { requested, current });
            }
        }

        match self.read_object(&live_path(&self.prepare_key(key)))? {
            Some(obj) => Ok(obj),
            None if opts.ignore_not_found => Ok((self.new_fn)()),
            None => Err(StoreError::not_found(key)),
        }
    }

    fn get_list(&self, key: &str, opts: &ListOptions) -> StoreResult<ObjectList<T>> {
        check_key(key)?;
        let rv_filter = self.list_filter(opts)?;
        let revision = self.revision.current();
        let dir = self.prepare_key(key);
        let mut paths = self.live_files(&dir, self.list_depth(key))?;

        if let Some(token) = opts.predicate.continue_token.as_deref().filter(|t| !t.is_empty()) {
            if opts.resource_version.as_deref().is_some_and(|rv| !rv.is_empty()) {
                return Err(StoreError::InvalidArgument(
                    "specifying resource version is not allowed when using continue".into(),
                ));
            }
            let (start, _) = decode_continue(token)?;
            let start = dir.join(start);
            let resume = paths.partition_point(|p| *p <= start);
            paths.drain(..resume);
        }

        let limit = usize::try_from(opts.predicate.limit).unwrap_or(usize::MAX);
        let mut list = ObjectList::new();
        let mut next_key = None;
        for (i, path) in paths.iter().enumerate() {
            // Deleted between listing and reading.
            let Some(obj) = self.read_object(path)? else {
                continue;
            };
            if !self.list_matches(&obj, opts, rv_filter) {
                continue;
            }
            list.items.push(obj);
            if limit != 0 && list.items.len() == limit {
                if i + 1 < paths.len() {
                    next_key = Some(encode_continue(&relative_key(&dir, path), revision)?);
                }
                break;
            }
        }

        self.versioner
            .update_list(&mut list.metadata, revision, next_key, None);
        debug!(key, items = list.items.len(), revision, "listed objects");
        Ok(list)
    }

    fn guaranteed_update(
        &self,
        key: &str,
        ignore_not_found: bool,
        preconditions: &Preconditions,
        try_update: UpdateFn<'_, T>,
        _cached_existing: Option<T>,
    ) -> StoreResult<T> {
        check_object_key(key)?;
        let live = live_path(&self.prepare_key(key));
        let (current, exists) = match self.read_object(&live)? {
            Some(obj) => (obj, true),
            None if ignore_not_found => ((self.new_fn)(), false),
            None => return Err(StoreError::not_found(key)),
        };
        if exists {
            preconditions.check(key, &current)?;
        }

        let mut updated = try_update(current.clone())?;
        if exists && self.same_stored_form(&current, &updated)? {
            debug!(key, "update is a no-op");
            return Ok(current);
        }

        let revision = self.revision.advance()?;
        self.versioner.update_object(updated.metadata_mut(), revision);
        let data = self.codec.encode(&updated)?;
        if exists {
            self.writer.replace(&live, &data)?;
        } else {
            self.writer.create_new(&live, &data).map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    StoreError::Conflict {
                        key: key.to_string(),
                        reason: "object was created concurrently".into(),
                    }
                } else {
                    e.into()
                }
            })?;
        }
        debug!(key, revision, created = !exists, "updated object");
        Ok(self.codec.decode(&data)?)
    }

    fn count(&self, key: &str) -> StoreResult<u64> {
        check_key(key)?;
        let files = self.live_files(&self.prepare_key(key), self.list_depth(key))?;
        Ok(files.len() as u64)
    }

    fn current_resource_version(&self) -> u64 {
        self.revision.current()
    }

    fn readiness_check(&self) -> StoreResult<()> {
        let dir = self.collection_dir();
        fs::create_dir_all(&dir)?;
        if !fs::metadata(&dir)?.is_dir() {
            return Err(StoreError::Io(io::Error::other(format!(
                "{} is not a directory",
                dir.display()
            ))));
        }
        Ok(())
    }
}

impl<T: Object> FileStore<T> {
    fn same_stored_form(&self, a: &T, b: &T) -> StoreResult<bool> {
        let (mut a, mut b) = (a.clone(), b.clone());
        self.versioner.prepare_object_for_storage(a.metadata_mut());
        self.versioner.prepare_object_for_storage(b.metadata_mut());
        Ok(self.codec.encode(&a)? == self.codec.encode(&b)?)
    }
}

impl<T> fmt::Debug for FileStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("root_dir", &self.root_dir)
            .field("resource_prefix", &self.resource_prefix)
            .field("resource", &self.resource)
            .field("cluster_scoped", &self.cluster_scoped)
            .finish_non_exhaustive()
    }
}

/// Reject keys that would escape the root directory.
fn check_key(key: &str) -> StoreResult<()> {
    if key.split('/').any(|segment| segment == "..") {
        return Err(StoreError::InvalidArgument(format!(
            "key {key:?} must not contain '..'"
        )));
    }
    Ok(())
}

fn check_object_key(key: &str) -> StoreResult<()> {
    check_key(key)?;
    if key.trim_matches('/').is_empty() || key.ends_with('/') {
        return Err(StoreError::InvalidArgument(format!(
            "key {key:?} does not name an object"
        )));
    }
    Ok(())
}

/// `path` relative to `dir`, slash separated.
fn relative_key(dir: &Path, path: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
