use std::path::PathBuf;

use kk_codec::CodecError;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live object exists at the key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// A live object already exists at the key.
    #[error("object already exists: {key}")]
    AlreadyExists { key: String },

    /// A precondition (uid or resourceVersion) did not hold.
    #[error("conflict on {key}: {reason}")]
    Conflict { key: String, reason: String },

    /// The caller-supplied validation rejected the object.
    #[error("invalid object {key}: {reason}")]
    InvalidObject { key: String, reason: String },

    /// A request argument is malformed or unsupported.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A resourceVersion string could not be parsed.
    #[error("invalid resource version {0:?}")]
    InvalidResourceVersion(String),

    /// The requested resourceVersion is newer than anything this store has served.
    #[error("too large resource version: requested {requested}, current {current}")]
    TooLargeResourceVersion { requested: u64, current: u64 },

    /// The persisted revision file exists but does not hold a counter.
    #[error("corrupt revision file {}: {reason}", path.display())]
    CorruptRevision { path: PathBuf, reason: String },

    /// Encoding or decoding an object failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The file-change notifier could not be set up or failed.
    #[error("watch error: {0}")]
    Watch(String),

    /// Store configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn already_exists(key: impl Into<String>) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<notify::Error> for StoreError {
    fn from(err: notify::Error) -> Self {
        Self::Watch(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
