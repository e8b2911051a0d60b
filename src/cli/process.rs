use std::{env, path::Path, process::Stdio};

use anyhow::{bail, Result};
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tracing::{info, warn};

use crate::daemon::lifecycle::{MarkerStatus, PidMarker, DAEMON_MARKER_FILE};

use super::daemon_path::to_daemon_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    AlreadyRunning(u32),
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped(u32),
    StaleMarkerRemoved,
    NotRunning,
}

fn daemon_marker(dir: &Path) -> PidMarker {
    PidMarker::new(dir.join(DAEMON_MARKER_FILE))
}

/// Starts the daemon unless the marker points at a live one. The daemon executable detaches on
/// its own, so waiting for it only waits for the intermediate process.
pub fn ensure_daemon(dir: &Path) -> Result<DaemonState> {
    if let MarkerStatus::Alive(pid) = daemon_marker(dir).inspect()? {
        return Ok(DaemonState::AlreadyRunning(pid));
    }

    // The program uses executable passed into the process. It's not the best option but it will
    // do the job in most cases.
    let daemon = to_daemon_path(env::current_exe()?);
    info!("Spawning {daemon:?}");
    let mut command = std::process::Command::new(&daemon);
    command.arg("--dir").arg(dir);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    let status = command.status()?;
    if !status.success() {
        bail!("{daemon:?} exited with {status}");
    }
    Ok(DaemonState::Started)
}

/// Asks the daemon to terminate and waits until it is gone. The daemon removes its own marker.
pub fn stop_daemon(dir: &Path) -> Result<StopOutcome> {
    let marker = daemon_marker(dir);
    match marker.inspect()? {
        MarkerStatus::Absent => Ok(StopOutcome::NotRunning),
        MarkerStatus::Stale => {
            marker.reclaim()?;
            Ok(StopOutcome::StaleMarkerRemoved)
        }
        MarkerStatus::Alive(pid) => {
            let target = Pid::from_u32(pid);
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
            if let Some(process) = system.process(target) {
                // This will forcefully terminate the process on Windows. Anything better will
                // require a lot more work.
                if process.kill_with(Signal::Term).is_none() {
                    warn!("SIGTERM isn't supported, killing {pid}");
                    process.kill();
                }
                process.wait();
            }
            Ok(StopOutcome::Stopped(pid))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::daemon::lifecycle::DAEMON_MARKER_FILE;

    use super::{stop_daemon, StopOutcome};

    #[test]
    fn test_stop_without_marker() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(stop_daemon(dir.path())?, StopOutcome::NotRunning);
        Ok(())
    }

    #[test]
    fn test_stop_removes_stale_marker() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join(DAEMON_MARKER_FILE), "garbage")?;

        assert_eq!(stop_daemon(dir.path())?, StopOutcome::StaleMarkerRemoved);
        assert!(!dir.path().join(DAEMON_MARKER_FILE).exists());
        Ok(())
    }
}
