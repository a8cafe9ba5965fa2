use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::layout::AtomicWriter;
use crate::watch::DEFAULT_CHANNEL_CAPACITY;

/// Tunables shared by every store opened from one runtime directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root under which every resource collection lives.
    pub runtime_dir: PathBuf,
    /// Capacity of each watch session's event channel.
    pub watch_channel_capacity: usize,
    /// `sync_all` object and revision files before renaming them into place.
    pub fsync: bool,
    /// Permission bits for written files (unix only).
    pub file_mode: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("./runtime"),
            watch_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            fsync: false,
            file_mode: 0o644,
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn with_runtime_dir(mut self, runtime_dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = runtime_dir.into();
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.watch_channel_capacity == 0 {
            return Err(StoreError::Config(
                "watch_channel_capacity must be at least 1".into(),
            ));
        }
        if self.file_mode > 0o7777 {
            return Err(StoreError::Config(format!(
                "file_mode {:o} is not a permission mask",
                self.file_mode
            )));
        }
        Ok(())
    }

    /// File writer configured from this config.
    pub fn writer(&self) -> AtomicWriter {
        AtomicWriter {
            fsync: self.fsync,
            mode: Some(self.file_mode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.runtime_dir, PathBuf::from("./runtime"));
        assert_eq!(c.watch_channel_capacity, 100);
        assert!(!c.fsync);
        assert_eq!(c.file_mode, 0o644);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = StoreConfig::from_toml_str(
            r#"
            runtime_dir = "/var/lib/kubekey/runtime"
            fsync = true
            "#,
        )
        .unwrap();
        assert_eq!(c.runtime_dir, PathBuf::from("/var/lib/kubekey/runtime"));
        assert!(c.fsync);
        assert_eq!(c.watch_channel_capacity, 100);

        let w = c.writer();
        assert!(w.fsync);
        assert_eq!(w.mode, Some(0o644));
    }

    #[test]
    fn rejects_bad_values() {
        let err = StoreConfig::from_toml_str("watch_channel_capacity = 0").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert!(StoreConfig::from_toml_str("file_mode = 70000").is_err());
        assert!(StoreConfig::from_toml_str("fsync = \"yes\"").is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        fs::write(&path, "watch_channel_capacity = 8\n").unwrap();
        assert_eq!(StoreConfig::load(&path).unwrap().watch_channel_capacity, 8);

        let err = StoreConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn serializes_back_to_toml() {
        let c = StoreConfig::default().with_runtime_dir("/tmp/kk");
        let text = toml::to_string(&c).unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), c);
    }
}
