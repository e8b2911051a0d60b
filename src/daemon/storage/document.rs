use std::{
    future::Future,
    io::ErrorKind,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs::File;
use tracing::{debug, info, warn};

use crate::fs::operations::{quarantine, sibling_path, write_atomic};

use super::{
    entities::{Configuration, TrackerSnapshot},
    error::StorageError,
};

/// Value that is stored as a standalone json document.
pub trait Document: Serialize + DeserializeOwned + Default + Send + Sync {
    /// Checks invariants serde can't express. The message ends up in logs.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Document for Configuration {
    fn check(&self) -> Result<(), String> {
        Configuration::check(self)
    }
}

impl Document for TrackerSnapshot {
    fn check(&self) -> Result<(), String> {
        TrackerSnapshot::check(self)
    }
}

/// Interface for abstracting storage of [TrackerSnapshot].
pub trait SnapshotStore {
    fn save(&self, snapshot: &TrackerSnapshot) -> impl Future<Output = Result<()>>;
}

/// Json file on disk holding a single [Document].
///
/// Saves go through a temporary file and a rename, so a concurrent reader sees either the
/// previous or the next version. Access is additionally serialized through an advisory lock on
/// a sibling `.lock` file.
pub struct JsonDocument<T> {
    path: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T: Document> JsonDocument<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _document: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn open_lock(&self) -> Result<File, StorageError> {
        if let Some(parent) = self.path.parent().filter(|v| !v.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(sibling_path(&self.path, "lock"))
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Reads the document. Missing file results in `Ok(None)`.
    pub async fn read(&self) -> Result<Option<T>, StorageError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let value =
            serde_json::from_slice::<T>(&content).map_err(|source| StorageError::Unreadable {
                path: self.path.clone(),
                source,
            })?;
        value.check().map_err(|reason| StorageError::Invalid {
            path: self.path.clone(),
            reason,
        })?;
        Ok(Some(value))
    }

    async fn read_locked(&self) -> Result<Option<T>, StorageError> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.io_error(e))?
        {
            return Ok(None);
        }
        // Readers may lack write access to the directory, saves are atomic without the lock too.
        let lock = match self.open_lock().await {
            Ok(lock) => lock,
            Err(e) => {
                debug!("Reading {:?} without a lock: {e}", self.path);
                return self.read().await;
            }
        };
        lock.lock_shared().map_err(|e| self.io_error(e))?;
        let result = self.read().await;
        lock.unlock_async().await.map_err(|e| self.io_error(e))?;
        result
    }

    /// Reader side of the store. Never modifies the document, anything unreadable yields defaults.
    pub async fn read_or_default(&self) -> T {
        match self.read_locked().await {
            Ok(Some(v)) => v,
            Ok(None) => {
                debug!("{:?} doesn't exist yet, using defaults", self.path);
                T::default()
            }
            Err(e) => {
                warn!("Couldn't read {:?}, using defaults: {e}", self.path);
                T::default()
            }
        }
    }

    /// Writer side of the store. Missing or corrupt documents are replaced by persisted
    /// defaults, corrupt ones are moved aside first.
    pub async fn load_or_init(&self) -> Result<T> {
        match self.read_locked().await {
            Ok(Some(v)) => {
                debug!("Loaded {:?}", self.path);
                Ok(v)
            }
            Ok(None) => {
                info!("Creating default document at {:?}", self.path);
                let value = T::default();
                self.save(&value).await?;
                Ok(value)
            }
            Err(e) if e.is_corruption() => {
                warn!("Document is unreadable, starting from defaults: {e}");
                match quarantine(&self.path).await {
                    Ok(moved) => warn!("Previous content was moved to {moved:?}"),
                    Err(e) => warn!("Couldn't move {:?} aside: {e}", self.path),
                }
                let value = T::default();
                self.save(&value).await?;
                Ok(value)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, value: &T) -> Result<()> {
        let mut content = serde_json::to_vec_pretty(value)?;
        content.push(b'\n');

        // Semi-safe acquire-release for a file
        let lock = self.open_lock().await?;
        lock.lock_exclusive().map_err(|e| self.io_error(e))?;
        let result = write_atomic(&self.path, &content)
            .await
            .map_err(|e| self.io_error(e));
        lock.unlock_async().await.map_err(|e| self.io_error(e))?;
        Ok(result?)
    }
}

impl SnapshotStore for JsonDocument<TrackerSnapshot> {
    fn save(&self, snapshot: &TrackerSnapshot) -> impl Future<Output = Result<()>> {
        JsonDocument::save(self, snapshot)
    }
}
