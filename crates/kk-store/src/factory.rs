//! Per-resource storage wiring for a generic resource registry.
//!
//! A registry asks [`FileRestOptionsGetter::get_rest_options`] for each
//! resource it serves, then calls the returned decorator to build the
//! [`Storage`] instance. Every store shares one runtime directory; each
//! resource keeps its own revision counter under its prefix.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use kk_types::{GroupResource, GroupVersion, Object, ObjectList};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::file::{FileStore, FileStoreOptions, NewFunc};
use crate::options::{default_attrs, AttrFunc};
use crate::traits::{DestroyFn, Storage};

/// Computes the registry key of an object.
pub type KeyFunc<T> = Arc<dyn Fn(&T) -> StoreResult<String> + Send + Sync>;

pub type NewListFunc<T> = Arc<dyn Fn() -> ObjectList<T> + Send + Sync>;

/// Extracts index values from an object.
pub type IndexerFunc<T> = Arc<dyn Fn(&T) -> StoreResult<Vec<String>> + Send + Sync>;

/// Named indexers. The file store keeps no secondary indexes; these are
/// accepted for interface compatibility.
pub type Indexers<T> = BTreeMap<String, IndexerFunc<T>>;

/// Named trigger functions for watch fan-out. Unused by the file store.
pub type TriggerFuncs<T> = BTreeMap<String, IndexerFunc<T>>;

/// Builds the storage for one resource.
#[allow(clippy::type_complexity)]
pub type StorageDecorator<T> = Arc<
    dyn Fn(
            &StorageConfig,
            &str,
            KeyFunc<T>,
            NewFunc<T>,
            NewListFunc<T>,
            AttrFunc<T>,
            &TriggerFuncs<T>,
            &Indexers<T>,
        ) -> StoreResult<(Arc<dyn Storage<T>>, DestroyFn)>
        + Send
        + Sync,
>;

/// Backend settings for one resource.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub store: StoreConfig,
    pub group_version: GroupVersion,
    pub group_resource: GroupResource,
    pub cluster_scoped: bool,
}

/// Everything a registry needs to serve one resource.
pub struct RestOptions<T> {
    pub storage_config: StorageConfig,
    pub decorator: StorageDecorator<T>,
    /// `<group>/<resource>`, or `<resource>` for the core group.
    pub resource_prefix: String,
    /// Always `false`: the file store does no garbage collection.
    pub enable_garbage_collection: bool,
    pub delete_collection_workers: usize,
    /// Always zero: object counts are not tracked as metrics.
    pub count_metric_poll_period: Duration,
}

impl<T: Object> RestOptions<T> {
    /// Run the decorator with standard key, constructor and attribute
    /// functions and no indexers.
    pub fn build_storage(&self) -> StoreResult<(Arc<dyn Storage<T>>, DestroyFn)> {
        let keys = ResourceKeys::new(&self.resource_prefix, self.storage_config.cluster_scoped);
        (self.decorator)(
            &self.storage_config,
            &self.resource_prefix,
            keys.key_fn(),
            Arc::new(T::default),
            Arc::new(ObjectList::<T>::new),
            default_attrs(),
            &TriggerFuncs::new(),
            &Indexers::new(),
        )
    }
}

impl<T> fmt::Debug for RestOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestOptions")
            .field("storage_config", &self.storage_config)
            .field("resource_prefix", &self.resource_prefix)
            .field("enable_garbage_collection", &self.enable_garbage_collection)
            .field("delete_collection_workers", &self.delete_collection_workers)
            .field("count_metric_poll_period", &self.count_metric_poll_period)
            .finish_non_exhaustive()
    }
}

/// Hands out file-backed [`RestOptions`] for the resources of one API group
/// version.
#[derive(Clone, Debug)]
pub struct FileRestOptionsGetter {
    config: StoreConfig,
    group_version: GroupVersion,
    cluster_scoped: bool,
}

impl FileRestOptionsGetter {
    pub fn new(
        runtime_dir: impl Into<PathBuf>,
        group_version: GroupVersion,
        cluster_scoped: bool,
    ) -> Self {
        Self::with_config(
            StoreConfig::default().with_runtime_dir(runtime_dir),
            group_version,
            cluster_scoped,
        )
    }

    pub fn with_config(
        config: StoreConfig,
        group_version: GroupVersion,
        cluster_scoped: bool,
    ) -> Self {
        Self {
            config,
            group_version,
            cluster_scoped,
        }
    }

    pub fn get_rest_options<T: Object>(
        &self,
        resource: GroupResource,
    ) -> StoreResult<RestOptions<T>> {
        if resource.resource.is_empty() {
            return Err(StoreError::InvalidArgument("resource name is empty".into()));
        }
        self.config.validate()?;

        let resource_prefix = if resource.group.is_empty() {
            resource.resource.clone()
        } else {
            format!("{}/{}", resource.group, resource.resource)
        };
        debug!(resource = %resource, prefix = %resource_prefix, "rest options");

        Ok(RestOptions {
            storage_config: StorageConfig {
                store: self.config.clone(),
                group_version: self.group_version.clone(),
                group_resource: resource,
                cluster_scoped: self.cluster_scoped,
            },
            decorator: file_storage_decorator(),
            resource_prefix,
            enable_garbage_collection: false,
            delete_collection_workers: 1,
            count_metric_poll_period: Duration::ZERO,
        })
    }
}

/// Decorator that opens a [`FileStore`] rooted at the configured runtime
/// directory.
pub fn file_storage_decorator<T: Object>() -> StorageDecorator<T> {
    Arc::new(
        |config: &StorageConfig,
         resource_prefix: &str,
         _key_fn: KeyFunc<T>,
         new_fn: NewFunc<T>,
         _new_list_fn: NewListFunc<T>,
         attr_fn: AttrFunc<T>,
         _triggers: &TriggerFuncs<T>,
         _indexers: &Indexers<T>|
         -> StoreResult<(Arc<dyn Storage<T>>, DestroyFn)> {
            let options = FileStoreOptions::new(
                &config.store.runtime_dir,
                resource_prefix,
                config.group_resource.clone(),
            )
            .cluster_scoped(config.cluster_scoped)
            .with_new_fn(new_fn)
            .with_attr_fn(attr_fn)
            .with_config(&config.store);
            let (store, destroy) = FileStore::open(options)?;
            let store: Arc<dyn Storage<T>> = Arc::new(store);
            Ok((store, destroy))
        },
    )
}

/// Registry key layout for one resource: `/<prefix>/<namespace>/<name>`, or
/// `/<prefix>/<name>` when cluster scoped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceKeys {
    prefix: String,
    cluster_scoped: bool,
}

impl ResourceKeys {
    pub fn new(prefix: impl Into<String>, cluster_scoped: bool) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
            cluster_scoped,
        }
    }

    /// Key of the whole collection.
    pub fn root(&self) -> String {
        format!("/{}", self.prefix)
    }

    /// Key of one namespace of the collection.
    pub fn namespace(&self, namespace: &str) -> StoreResult<String> {
        check_segment("namespace", namespace)?;
        Ok(format!("/{}/{namespace}", self.prefix))
    }

    pub fn object(&self, namespace: &str, name: &str) -> StoreResult<String> {
        check_segment("name", name)?;
        if self.cluster_scoped {
            if !namespace.is_empty() {
                return Err(StoreError::InvalidArgument(format!(
                    "cluster-scoped object {name:?} must not have a namespace"
                )));
            }
            return Ok(format!("/{}/{name}", self.prefix));
        }
        if namespace.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "namespaced object {name:?} requires a namespace"
            )));
        }
        Ok(format!("{}/{name}", self.namespace(namespace)?))
    }

    pub fn key_for<T: Object>(&self, obj: &T) -> StoreResult<String> {
        self.object(obj.namespace(), obj.name())
    }

    pub fn key_fn<T: Object>(&self) -> KeyFunc<T> {
        let keys = self.clone();
        Arc::new(move |obj: &T| keys.key_for(obj))
    }
}

fn check_segment(what: &str, segment: &str) -> StoreResult<()> {
    if segment.is_empty() {
        return Err(StoreError::InvalidArgument(format!("{what} is empty")));
    }
    if segment == "." || segment == ".." || segment.contains(['/', '%']) {
        return Err(StoreError::InvalidArgument(format!(
            "{what} {segment:?} may not be '.', '..' or contain '/' or '%'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{GetOptions, ListOptions};
    use kk_types::{DynamicObject, ObjectMeta, TypeMeta};

    fn getter(dir: &std::path::Path, cluster_scoped: bool) -> FileRestOptionsGetter {
        let gv = GroupVersion::new("kubekey.kubesphere.io", "v1");
        FileRestOptionsGetter::new(dir, gv, cluster_scoped)
    }

    #[test]
    fn resource_prefix_includes_group() {
        let dir = tempfile::tempdir().unwrap();
        let g = getter(dir.path(), false);

        let pipelines = GroupResource::new("kubekey.kubesphere.io", "pipelines");
        let opts = g.get_rest_options::<DynamicObject>(pipelines).unwrap();
        assert_eq!(opts.resource_prefix, "kubekey.kubesphere.io/pipelines");
        assert!(!opts.enable_garbage_collection);
        assert_eq!(opts.delete_collection_workers, 1);
        assert_eq!(opts.count_metric_poll_period, Duration::ZERO);
        assert_eq!(opts.storage_config.store.runtime_dir, dir.path());

        let core = g
            .get_rest_options::<DynamicObject>(GroupResource::new("", "configmaps"))
            .unwrap();
        assert_eq!(core.resource_prefix, "configmaps");

        assert!(g
            .get_rest_options::<DynamicObject>(GroupResource::new("", ""))
            .is_err());
    }

    #[test]
    fn decorator_builds_working_store() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let opts = getter(dir.path(), false)
            .get_rest_options::<DynamicObject>(GroupResource::new("", "configmaps"))?;
        let (store, destroy) = opts.build_storage()?;

        let keys = ResourceKeys::new(&opts.resource_prefix, false);
        let obj = DynamicObject::new(
            TypeMeta::new("v1", "ConfigMap"),
            ObjectMeta::namespaced("default", "settings"),
        );
        let key = keys.key_for(&obj)?;
        assert_eq!(key, "/configmaps/default/settings");

        store.create(&key, obj, 0)?;
        assert!(dir.path().join("configmaps/default/settings.yaml").is_file());
        assert_eq!(store.get(&key, &GetOptions::default())?.name(), "settings");
        assert_eq!(store.get_list(&keys.root(), &ListOptions::default())?.len(), 1);
        destroy();
        Ok(())
    }

    #[test]
    fn cluster_scoped_store_lists_one_level() {
        let dir = tempfile::tempdir().unwrap();
        let inventories = GroupResource::new("kubekey.kubesphere.io", "inventories");
        let opts = getter(dir.path(), true)
            .get_rest_options::<DynamicObject>(inventories)
            .unwrap();
        let (store, _destroy) = opts.build_storage().unwrap();
        let keys = ResourceKeys::new(&opts.resource_prefix, true);

        for name in ["a", "b"] {
            let obj =
                DynamicObject::new(TypeMeta::new("v1", "Inventory"), ObjectMeta::cluster(name));
            store.create(&keys.key_for(&obj).unwrap(), obj, 0).unwrap();
        }
        assert_eq!(store.count(&keys.root()).unwrap(), 2);
        assert!(dir
            .path()
            .join("kubekey.kubesphere.io/inventories/a.yaml")
            .is_file());
    }

    #[test]
    fn key_layout() {
        let ns = ResourceKeys::new("/configmaps/", false);
        assert_eq!(ns.root(), "/configmaps");
        assert_eq!(ns.namespace("default").unwrap(), "/configmaps/default");
        assert_eq!(ns.object("default", "a").unwrap(), "/configmaps/default/a");
        assert!(ns.object("", "a").is_err());
        assert!(ns.object("default", "").is_err());
        assert!(ns.object("default", "..").is_err());
        assert!(ns.object("default", "a/b").is_err());

        let cluster = ResourceKeys::new("nodes", true);
        assert_eq!(cluster.object("", "n1").unwrap(), "/nodes/n1");
        assert!(cluster.object("default", "n1").is_err());

        let key_fn = cluster.key_fn::<DynamicObject>();
        let node = DynamicObject::new(TypeMeta::new("v1", "Node"), ObjectMeta::cluster("n2"));
        assert_eq!(key_fn(&node).unwrap(), "/nodes/n2");
    }
}
