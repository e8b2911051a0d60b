//! Single instance enforcement through marker files holding a process id.
//!
//! The same contract is used for the daemon (`daemon.pid`) and for a presentation process
//! (`presentation.lock`): a marker whose process is alive blocks a second instance, anything
//! else is stale and gets reclaimed.

use std::{
    fs::{self, OpenOptions},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::process_api::is_process_alive;

pub const DAEMON_MARKER_FILE: &str = "daemon.pid";
pub const PRESENTATION_LOCK_FILE: &str = "presentation.lock";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Another instance is already running with pid {pid}")]
    AlreadyRunning { pid: u32 },
    #[error("Marker {path:?} was claimed by another process starting at the same time")]
    Contended { path: PathBuf },
    #[error("Failed to access marker {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStatus {
    Absent,
    /// Marker exists, but its content is garbage or the process is gone.
    Stale,
    Alive(u32),
}

pub struct PidMarker {
    path: PathBuf,
}

impl PidMarker {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> LifecycleError {
        LifecycleError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Reads the recorded process id, if there is a parsable one.
    pub fn read_pid(&self) -> Result<Option<u32>, LifecycleError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.trim().parse::<u32>().ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    pub fn inspect(&self) -> Result<MarkerStatus, LifecycleError> {
        if !self.path.exists() {
            return Ok(MarkerStatus::Absent);
        }
        Ok(match self.read_pid()? {
            Some(pid) if pid != std::process::id() && is_process_alive(pid) => {
                MarkerStatus::Alive(pid)
            }
            _ => MarkerStatus::Stale,
        })
    }

    /// Makes sure nobody else holds the marker, removing a stale one.
    pub fn reclaim(&self) -> Result<(), LifecycleError> {
        match self.inspect()? {
            MarkerStatus::Absent => Ok(()),
            MarkerStatus::Alive(pid) => Err(LifecycleError::AlreadyRunning { pid }),
            MarkerStatus::Stale => {
                warn!("Removing stale marker {:?}", self.path);
                self.remove()
            }
        }
    }

    /// Records the current process as the owner. Fails if the marker exists, so of two
    /// processes racing past [PidMarker::reclaim] only one gets it.
    pub fn claim(&self) -> Result<(), LifecycleError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(match self.read_pid()? {
                    Some(pid) => LifecycleError::AlreadyRunning { pid },
                    None => LifecycleError::Contended {
                        path: self.path.clone(),
                    },
                });
            }
            Err(e) => return Err(self.io_error(e)),
        };
        write!(file, "{}", std::process::id())
            .and_then(|()| file.sync_all())
            .map_err(|e| self.io_error(e))
    }

    /// Removes the marker, but only if the current process owns it.
    pub fn release(&self) -> Result<(), LifecycleError> {
        if self.read_pid()? == Some(std::process::id()) {
            self.remove()
        } else {
            Ok(())
        }
    }

    fn remove(&self) -> Result<(), LifecycleError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Owns the daemon lifecycle artifacts. Constructed once by the entry point.
///
/// [DaemonLifecycle::ensure_single_instance] runs before detaching, so that a refusal is visible
/// to whoever started the daemon. [DaemonLifecycle::start] runs in the final process.
pub struct DaemonLifecycle {
    marker: PidMarker,
    shutdown: CancellationToken,
    started: bool,
}

impl DaemonLifecycle {
    pub fn new(app_dir: &Path) -> Self {
        Self {
            marker: PidMarker::new(app_dir.join(DAEMON_MARKER_FILE)),
            shutdown: CancellationToken::new(),
            started: false,
        }
    }

    pub fn ensure_single_instance(&self) -> Result<(), LifecycleError> {
        self.marker.reclaim()
    }

    /// Claims the marker and hands out the token the poll loop should watch.
    pub fn start(&mut self) -> Result<CancellationToken, LifecycleError> {
        self.marker.reclaim()?;
        self.marker.claim()?;
        self.started = true;
        info!(
            "Daemon {} claimed {:?}",
            std::process::id(),
            self.marker.path()
        );
        Ok(self.shutdown.clone())
    }

    pub fn stop(&mut self) {
        self.shutdown.cancel();
        if !self.started {
            return;
        }
        self.started = false;
        match self.marker.release() {
            Ok(()) => info!("Released {:?}", self.marker.path()),
            Err(e) => warn!("Failed to release marker {e:?}"),
        }
    }
}

impl Drop for DaemonLifecycle {
    fn drop(&mut self) {
        self.stop();
    }
}
