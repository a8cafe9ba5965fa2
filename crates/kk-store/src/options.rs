use std::sync::Arc;

use serde::{Deserialize, Serialize};

use kk_types::{Fields, Labels, Object, Selector};

use crate::error::{StoreError, StoreResult};

/// Options for [`Storage::get`](crate::Storage::get).
#[derive(Clone, Debug, Default)]
pub struct GetOptions {
    /// Return an empty object instead of `NotFound`.
    pub ignore_not_found: bool,
    /// Minimum revision the store must have reached to serve the read.
    pub resource_version: Option<String>,
}

impl GetOptions {
    pub fn ignore_not_found() -> Self {
        Self {
            ignore_not_found: true,
            ..Default::default()
        }
    }
}

/// How `ListOptions::resource_version` constrains listed objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceVersionMatch {
    /// Objects with a resourceVersion greater than or equal to the given one.
    NotOlderThan,
    /// Objects with exactly the given resourceVersion.
    Exact,
}

/// Label and field filtering plus pagination for list and watch calls.
#[derive(Clone, Debug, Default)]
pub struct SelectionPredicate {
    pub label: Selector,
    pub field: Selector,
    /// Maximum number of items per page; zero means unlimited.
    pub limit: u64,
    /// Continue token returned by a previous page.
    pub continue_token: Option<String>,
}

impl SelectionPredicate {
    pub fn everything() -> Self {
        Self::default()
    }

    /// Returns `true` if no selector narrows the result.
    pub fn is_everything(&self) -> bool {
        self.label.is_empty() && self.field.is_empty()
    }

    pub fn matches<T: Object>(&self, obj: &T, attrs: &AttrFunc<T>) -> bool {
        if self.is_everything() {
            return true;
        }
        let (labels, fields) = attrs(obj);
        self.label.matches(&labels) && self.field.matches(&fields)
    }
}

/// Extracts the selectable labels and fields of an object.
pub type AttrFunc<T> = Arc<dyn Fn(&T) -> (Labels, Fields) + Send + Sync>;

/// Labels from metadata plus the `metadata.name` and `metadata.namespace` fields.
pub fn default_attrs<T: Object>() -> AttrFunc<T> {
    Arc::new(|obj: &T| {
        let meta = obj.metadata();
        let mut fields = Fields::new();
        fields.insert("metadata.name".to_string(), meta.name.clone());
        fields.insert("metadata.namespace".to_string(), meta.namespace.clone());
        (meta.labels.clone(), fields)
    })
}

/// Options for [`Storage::get_list`](crate::Storage::get_list) and
/// [`Storage::watch`](crate::Storage::watch).
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    pub resource_version: Option<String>,
    pub resource_version_match: Option<ResourceVersionMatch>,
    pub predicate: SelectionPredicate,
    /// Watch only: replay existing objects as `Added` followed by a bookmark.
    pub send_initial_events: Option<bool>,
}

/// Conditions an existing object must meet before it is updated or deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub uid: Option<String>,
    pub resource_version: Option<String>,
}

impl Preconditions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
            resource_version: None,
        }
    }

    pub fn with_resource_version(resource_version: impl Into<String>) -> Self {
        Self {
            uid: None,
            resource_version: Some(resource_version.into()),
        }
    }

    pub fn check<T: Object>(&self, key: &str, obj: &T) -> StoreResult<()> {
        let meta = obj.metadata();
        if let Some(uid) = &self.uid {
            if *uid != meta.uid {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    reason: format!(
                        "precondition failed: uid in precondition {uid:?}, uid in object meta {:?}",
                        meta.uid
                    ),
                });
            }
        }
        if let Some(rv) = &self.resource_version {
            if *rv != meta.resource_version {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                    reason: format!(
                        "precondition failed: resourceVersion in precondition {rv:?}, \
                         resourceVersion in object meta {:?}",
                        meta.resource_version
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kk_types::{DynamicObject, ObjectMeta, TypeMeta};

    fn obj(name: &str, labels: &[(&str, &str)]) -> DynamicObject {
        let mut meta = ObjectMeta::namespaced("default", name);
        meta.uid = format!("uid-{name}");
        meta.resource_version = "3".into();
        meta.labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DynamicObject::new(TypeMeta::new("v1", "ConfigMap"), meta)
    }

    #[test]
    fn empty_predicate_matches_everything() {
        let attrs = default_attrs::<DynamicObject>();
        assert!(SelectionPredicate::everything().matches(&obj("a", &[]), &attrs));
    }

    #[test]
    fn label_and_field_selectors() {
        let attrs = default_attrs::<DynamicObject>();
        let predicate = SelectionPredicate {
            label: "app=web".parse().unwrap(),
            field: "metadata.name=a".parse().unwrap(),
            ..Default::default()
        };
        assert!(predicate.matches(&obj("a", &[("app", "web")]), &attrs));
        assert!(!predicate.matches(&obj("b", &[("app", "web")]), &attrs));
        assert!(!predicate.matches(&obj("a", &[("app", "db")]), &attrs));
    }

    #[test]
    fn preconditions() {
        let o = obj("a", &[]);
        assert!(Preconditions::none().check("k", &o).is_ok());
        assert!(Preconditions::with_uid("uid-a").check("k", &o).is_ok());
        assert!(Preconditions::with_resource_version("3").check("k", &o).is_ok());

        let err = Preconditions::with_uid("other").check("k", &o).unwrap_err();
        assert!(err.is_conflict());
        let err = Preconditions::with_resource_version("2")
            .check("k", &o)
            .unwrap_err();
        assert!(err.to_string().contains("resourceVersion"));
    }
}
