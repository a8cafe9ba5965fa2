//! On-disk naming and write primitives.
//!
//! Layout of one resource collection:
//!
//! ```text
//! <root>/<resource-prefix>/_revision                  decimal revision counter
//! <root>/<resource-prefix>/<namespace>/<name>.yaml    live object
//! <root>/<resource-prefix>/<namespace>/<name>.yaml-deleted
//!                                                     tombstone, purged by a watcher
//! ```
//!
//! Cluster-scoped resources omit the namespace segment. Every file is written
//! to a hidden temporary in the target directory and renamed into place, so
//! readers and watchers only ever observe complete files.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Suffix of a live object file.
pub const OBJECT_SUFFIX: &str = ".yaml";

/// Appended to a live object file name when it is deleted.
pub const TOMBSTONE_SUFFIX: &str = "-deleted";

/// Name of the per-collection revision file.
pub const REVISION_FILE: &str = "_revision";

/// Lifecycle state of an object file, derived from its name.
///
/// `Live -> Tombstoned` happens by rename inside `delete`; the transition to
/// purged is the watcher removing the tombstone after reporting it. The name
/// is classified by its terminal suffix only, so object names that themselves
/// contain `-deleted` or `.yaml` are unambiguous.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectFile {
    Live(String),
    Tombstoned(String),
}

impl ObjectFile {
    /// Classify a path by its file name. Returns `None` for anything that is
    /// not an object file (revision file, temporaries, stray files).
    pub fn parse(path: &Path) -> Option<Self> {
        Self::parse_name(path.file_name()?.to_str()?)
    }

    pub fn parse_name(file_name: &str) -> Option<Self> {
        if let Some(rest) = file_name.strip_suffix(TOMBSTONE_SUFFIX) {
            return rest
                .strip_suffix(OBJECT_SUFFIX)
                .filter(|name| !name.is_empty())
                .map(|name| Self::Tombstoned(name.to_string()));
        }
        file_name
            .strip_suffix(OBJECT_SUFFIX)
            .filter(|name| !name.is_empty())
            .map(|name| Self::Live(name.to_string()))
    }

    /// Object name encoded in the file name.
    pub fn name(&self) -> &str {
        match self {
            Self::Live(name) | Self::Tombstoned(name) => name,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn file_name(&self) -> String {
        match self {
            Self::Live(name) => format!("{name}{OBJECT_SUFFIX}"),
            Self::Tombstoned(name) => format!("{name}{OBJECT_SUFFIX}{TOMBSTONE_SUFFIX}"),
        }
    }
}

/// Path of the live file for a key path (`<key>.yaml`).
pub fn live_path(key_path: &Path) -> PathBuf {
    append(key_path, OBJECT_SUFFIX)
}

/// Path of the tombstone for a key path (`<key>.yaml-deleted`).
pub fn tombstone_path(key_path: &Path) -> PathBuf {
    append(append(key_path, OBJECT_SUFFIX).as_path(), TOMBSTONE_SUFFIX)
}

fn append(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Write-then-rename file writer.
#[derive(Clone, Copy, Debug, Default)]
pub struct AtomicWriter {
    /// `sync_all` the temporary before it is renamed into place.
    pub fsync: bool,
    /// Permission bits applied to written files (unix only).
    pub mode: Option<u32>,
}

impl AtomicWriter {
    /// Atomically replace (or create) `path` with `data`.
    pub fn replace(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let tmp = self.stage(path, data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Atomically create `path` with `data`, failing with
    /// [`io::ErrorKind::AlreadyExists`] if it is already present.
    pub fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let tmp = self.stage(path, data)?;
        tmp.persist_noclobber(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn stage(&self, path: &Path, data: &[u8]) -> io::Result<NamedTempFile> {
        let dir = path.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no parent directory", path.display()),
            )
        })?;
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".kk-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.flush()?;
        self.apply_mode(tmp.as_file())?;
        if self.fsync {
            tmp.as_file().sync_all()?;
        }
        Ok(tmp)
    }

    #[cfg(unix)]
    fn apply_mode(&self, file: &File) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        match self.mode {
            Some(mode) => file.set_permissions(fs::Permissions::from_mode(mode)),
            None => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn apply_mode(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }
}
