use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An API group and version, e.g. `kubekey.kubesphere.io/v1`.
///
/// The core group has an empty `group` and formats as just the version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    pub fn with_resource(&self, resource: impl Into<String>) -> GroupVersionResource {
        GroupVersionResource {
            group: self.group.clone(),
            version: self.version.clone(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

impl FromStr for GroupVersion {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [version] if !version.is_empty() => Ok(Self::new("", *version)),
            [group, version] if !group.is_empty() && !version.is_empty() => {
                Ok(Self::new(*group, *version))
            }
            _ => Err(TypeError::InvalidGroupVersion(s.to_string())),
        }
    }
}

/// A resource within an API group, independent of version.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }

    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_core_and_named_groups() {
        assert_eq!(GroupVersion::new("", "v1").to_string(), "v1");
        assert_eq!(
            GroupVersion::new("kubekey.kubesphere.io", "v1alpha1").to_string(),
            "kubekey.kubesphere.io/v1alpha1"
        );
        assert_eq!(GroupResource::new("", "configmaps").to_string(), "configmaps");
        assert_eq!(
            GroupResource::new("kubekey.kubesphere.io", "tasks").to_string(),
            "tasks.kubekey.kubesphere.io"
        );
    }

    #[test]
    fn parse_group_version() {
        let gv: GroupVersion = "kubekey.kubesphere.io/v1".parse().unwrap();
        assert_eq!(gv.group, "kubekey.kubesphere.io");
        assert_eq!(gv.version, "v1");

        let core: GroupVersion = "v1".parse().unwrap();
        assert!(core.group.is_empty());

        assert!("".parse::<GroupVersion>().is_err());
        assert!("a/b/c".parse::<GroupVersion>().is_err());
        assert!("/v1".parse::<GroupVersion>().is_err());
    }

    #[test]
    fn with_resource_roundtrips_components() {
        let gvr = GroupVersion::new("kubekey.kubesphere.io", "v1").with_resource("playbooks");
        assert_eq!(gvr.group_resource().resource, "playbooks");
        assert_eq!(gvr.group_version().to_string(), "kubekey.kubesphere.io/v1");
    }
}
