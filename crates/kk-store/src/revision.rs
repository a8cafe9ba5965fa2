use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::layout::AtomicWriter;

/// Revision number used before anything has been written.
pub const INITIAL_REVISION: u64 = 1;

/// Per-collection revision counter persisted to a sibling file.
///
/// Every mutating store call advances the counter by exactly one through
/// [`RevisionCounter::advance`]. The counter is instance state, so one
/// process can host many stores (one per resource) without sharing it.
#[derive(Debug)]
pub struct RevisionCounter {
    path: PathBuf,
    current: RwLock<u64>,
    writer: AtomicWriter,
}

impl RevisionCounter {
    /// Load the counter from `path`, starting at [`INITIAL_REVISION`] when the
    /// file does not exist yet.
    pub fn load(path: impl Into<PathBuf>, writer: AtomicWriter) -> StoreResult<Self> {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(content) => parse_revision(&path, &content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => INITIAL_REVISION,
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), revision = current, "loaded revision");
        Ok(Self {
            path,
            current: RwLock::new(current),
            writer,
        })
    }

    /// Current revision. Does not touch the disk.
    pub fn current(&self) -> u64 {
        *self.current.read().expect("revision lock poisoned")
    }

    /// Increment and persist, returning the new revision.
    ///
    /// The in-memory value only moves once the new value is on disk, so a
    /// failed write leaves the counter where it was.
    pub fn advance(&self) -> StoreResult<u64> {
        let mut current = self.current.write().expect("revision lock poisoned");
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::CorruptRevision {
                path: self.path.clone(),
                reason: "revision counter exhausted".into(),
            })?;
        self.writer.replace(&self.path, next.to_string().as_bytes())?;
        *current = next;
        Ok(next)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn set(&self, revision: u64) {
        *self.current.write().expect("revision lock poisoned") = revision;
    }
}

fn parse_revision(path: &Path, content: &str) -> StoreResult<u64> {
    let trimmed = content.trim();
    let value = trimmed
        .parse::<u64>()
        .map_err(|e| StoreError::CorruptRevision {
            path: path.to_path_buf(),
            reason: format!("{trimmed:?}: {e}"),
        })?;
    // Zero means "unset".
    Ok(value.max(INITIAL_REVISION))
}
