use kk_types::{ListMeta, ObjectMeta};

use crate::error::{StoreError, StoreResult};

/// Reads and writes the `resourceVersion` metadata of objects and lists.
///
/// The store stamps every mutation through its versioner; nothing else may
/// assign resource versions.
pub trait Versioner: Send + Sync {
    /// Set the object's resourceVersion. Zero clears it.
    fn update_object(&self, meta: &mut ObjectMeta, resource_version: u64);

    /// Set list metadata: resourceVersion, continue token and remaining count.
    fn update_list(
        &self,
        meta: &mut ListMeta,
        resource_version: u64,
        next_key: Option<String>,
        remaining: Option<i64>,
    );

    /// Clear fields that must not be persisted as supplied by the caller.
    fn prepare_object_for_storage(&self, meta: &mut ObjectMeta) {
        meta.resource_version.clear();
    }

    /// The object's resourceVersion as a number; zero when unset.
    fn object_resource_version(&self, meta: &ObjectMeta) -> StoreResult<u64> {
        self.parse_resource_version(&meta.resource_version)
    }

    /// Parse a resourceVersion token; the empty string means zero.
    fn parse_resource_version(&self, resource_version: &str) -> StoreResult<u64>;
}

/// Versioner for decimal resourceVersion tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApiObjectVersioner;

impl Versioner for ApiObjectVersioner {
    fn update_object(&self, meta: &mut ObjectMeta, resource_version: u64) {
        meta.resource_version = if resource_version == 0 {
            String::new()
        } else {
            resource_version.to_string()
        };
    }

    fn update_list(
        &self,
        meta: &mut ListMeta,
        resource_version: u64,
        next_key: Option<String>,
        remaining: Option<i64>,
    ) {
        meta.resource_version = resource_version.to_string();
        meta.continue_token = next_key.unwrap_or_default();
        meta.remaining_item_count = remaining;
    }

    fn parse_resource_version(&self, resource_version: &str) -> StoreResult<u64> {
        if resource_version.is_empty() || resource_version == "0" {
            return Ok(0);
        }
        resource_version
            .parse::<u64>()
            .map_err(|_| StoreError::InvalidResourceVersion(resource_version.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_object_sets_and_clears() {
        let v = ApiObjectVersioner;
        let mut meta = ObjectMeta::cluster("a");
        v.update_object(&mut meta, 42);
        assert_eq!(meta.resource_version, "42");
        v.update_object(&mut meta, 0);
        assert!(meta.resource_version.is_empty());
    }

    #[test]
    fn parse_accepts_empty_and_decimal() {
        let v = ApiObjectVersioner;
        assert_eq!(v.parse_resource_version("").unwrap(), 0);
        assert_eq!(v.parse_resource_version("0").unwrap(), 0);
        assert_eq!(v.parse_resource_version("17").unwrap(), 17);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = ApiObjectVersioner.parse_resource_version("abc").unwrap_err();
        assert!(matches!(err, StoreError::InvalidResourceVersion(ref s) if s == "abc"));
        assert!(ApiObjectVersioner.parse_resource_version("-1").is_err());
    }

    #[test]
    fn update_list_fills_continue() {
        let mut meta = ListMeta::default();
        ApiObjectVersioner.update_list(&mut meta, 9, Some("next".into()), None);
        assert_eq!(meta.resource_version, "9");
        assert_eq!(meta.continue_token, "next");

        ApiObjectVersioner.update_list(&mut meta, 10, None, None);
        assert!(meta.continue_token.is_empty());
    }

    #[test]
    fn prepare_for_storage_clears_version() {
        let mut meta = ObjectMeta::cluster("a");
        meta.resource_version = "5".into();
        ApiObjectVersioner.prepare_object_for_storage(&mut meta);
        assert!(meta.resource_version.is_empty());
    }
}
