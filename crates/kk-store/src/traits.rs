use tokio::sync::mpsc;

use kk_types::{Object, ObjectList};

use crate::error::StoreResult;
use crate::options::{GetOptions, ListOptions, Preconditions};
use crate::versioner::Versioner;
use crate::watch::WatchEvent;

/// Teardown returned alongside a constructed store.
pub type DestroyFn = Box<dyn FnOnce() + Send>;

/// Validation run against the current object before it is deleted.
pub type ValidateFn<'a, T> = &'a dyn Fn(&T) -> StoreResult<()>;

/// Computes the new object from the current one inside `guaranteed_update`.
pub type UpdateFn<'a, T> = &'a mut dyn FnMut(T) -> StoreResult<T>;

/// Validation that accepts every object.
pub fn validate_all<T>(_: &T) -> StoreResult<()> {
    Ok(())
}

/// A live watch session.
pub trait WatchInterface<T>: Send {
    /// Stream of events. Yields `None` once the session has ended.
    fn result_chan(&mut self) -> &mut mpsc::Receiver<WatchEvent<T>>;

    /// End the session. Idempotent.
    fn stop(&mut self);
}

/// Generic object storage contract consumed by resource registries.
///
/// Keys are slash-separated logical paths (`/<prefix>/<namespace>/<name>`).
/// Every mutating call advances the store's revision by exactly one and
/// stamps it into the affected object's `resourceVersion`.
pub trait Storage<T: Object>: Send + Sync {
    /// The versioner used to stamp and parse resource versions.
    fn versioner(&self) -> &dyn Versioner;

    /// Create a new object at `key`. Fails with `AlreadyExists` if a live
    /// object is already present; never overwrites.
    fn create(&self, key: &str, obj: T, ttl: u64) -> StoreResult<T>;

    /// Mark the object at `key` deleted and return its last state.
    fn delete(
        &self,
        key: &str,
        preconditions: &Preconditions,
        validate: ValidateFn<'_, T>,
        cached_existing: Option<T>,
    ) -> StoreResult<T>;

    /// Start a watch session on `key` (a collection or a namespace).
    fn watch(&self, key: &str, opts: &ListOptions) -> StoreResult<Box<dyn WatchInterface<T>>>;

    fn get(&self, key: &str, opts: &GetOptions) -> StoreResult<T>;

    fn get_list(&self, key: &str, opts: &ListOptions) -> StoreResult<ObjectList<T>>;

    /// Read-modify-write of the object at `key`.
    fn guaranteed_update(
        &self,
        key: &str,
        ignore_not_found: bool,
        preconditions: &Preconditions,
        try_update: UpdateFn<'_, T>,
        cached_existing: Option<T>,
    ) -> StoreResult<T>;

    /// Number of live objects under `key`.
    fn count(&self, key: &str) -> StoreResult<u64>;

    /// Revision of the most recent mutation served by this store.
    fn current_resource_version(&self) -> u64;

    fn readiness_check(&self) -> StoreResult<()>;

    /// Ask active watch sessions to report progress. Sessions here follow the
    /// filesystem directly, so there is nothing to request by default.
    fn request_watch_progress(&self) -> StoreResult<()> {
        Ok(())
    }
}
