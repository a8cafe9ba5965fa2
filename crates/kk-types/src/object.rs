use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::meta::{ListMeta, ObjectMeta, TypeMeta};

/// A storable resource.
///
/// Implementations expose their [`ObjectMeta`]; everything else about the
/// type is opaque to the store and only passes through the codec.
/// `Default` provides the "construct empty object" factory used when a read
/// tolerates a missing key.
pub trait Object: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Convenience accessor for `metadata.name`.
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Convenience accessor for `metadata.namespace`.
    fn namespace(&self) -> &str {
        &self.metadata().namespace
    }

    /// Convenience accessor for `metadata.resourceVersion`.
    fn resource_version(&self) -> &str {
        &self.metadata().resource_version
    }
}

/// A typed list of objects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectList<T> {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> ObjectList<T> {
    pub fn new() -> Self {
        Self {
            types: TypeMeta::default(),
            metadata: ListMeta::default(),
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for ObjectList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Schema-less object: type and object metadata plus arbitrary top-level
/// fields (`spec`, `status`, `data`, ...).
///
/// Used for resources that have no dedicated Rust type, the way an
/// unstructured object is used by generic clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl DynamicObject {
    pub fn new(types: TypeMeta, metadata: ObjectMeta) -> Self {
        Self {
            types,
            metadata,
            fields: BTreeMap::new(),
        }
    }

    /// Set a top-level field, builder style.
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }
}

impl Object for DynamicObject {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
