use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `apiVersion` and `kind` of a serialized object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

impl TypeMeta {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

/// Metadata carried by every stored object.
///
/// `resource_version` is owned by the store: it is overwritten on every
/// mutation and must be treated as an opaque token by everyone else.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub generate_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

impl ObjectMeta {
    /// Metadata for a namespaced object.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Metadata for a cluster-scoped object.
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns `true` if neither `name` nor `generate_name` is set.
    ///
    /// Files decoding to such objects are not resources (stray files, partial
    /// writes) and are skipped by readers.
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty() && self.generate_name.is_empty()
    }
}

/// Metadata of a list response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    /// Opaque token to fetch the next page; empty on the last page.
    #[serde(rename = "continue", default, skip_serializing_if = "String::is_empty")]
    pub continue_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_item_count: Option<i64>,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_omitted() {
        let meta = ObjectMeta::namespaced("default", "test-config");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "test-config", "namespace": "default"})
        );
    }

    #[test]
    fn camel_case_on_the_wire() {
        let meta = ObjectMeta {
            name: "a".into(),
            resource_version: "7".into(),
            generate_name: "a-".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"resourceVersion\":\"7\""));
        assert!(json.contains("\"generateName\":\"a-\""));
    }

    #[test]
    fn list_meta_continue_field_name() {
        let list = ListMeta {
            resource_version: "3".into(),
            continue_token: "abc".into(),
            remaining_item_count: None,
        };
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["continue"], "abc");
        assert!(json.get("remainingItemCount").is_none());
    }

    #[test]
    fn anonymous_detection() {
        assert!(ObjectMeta::default().is_anonymous());
        assert!(!ObjectMeta::cluster("node1").is_anonymous());
        let generated = ObjectMeta {
            generate_name: "task-".into(),
            ..Default::default()
        };
        assert!(!generated.is_anonymous());
    }

    #[test]
    fn decodes_from_yaml() {
        let yaml = "name: web\nnamespace: prod\nlabels:\n  app: web\n";
        let meta: ObjectMeta = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(meta.name, "web");
        assert_eq!(meta.labels.get("app").map(String::as_str), Some("web"));
    }
}
