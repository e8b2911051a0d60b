use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path:?} isn't a valid document: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path:?} contains invalid values: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl StorageError {
    /// Corrupt content is recoverable by falling back to defaults, I/O problems aren't.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Unreadable { .. } | Self::Invalid { .. })
    }
}
