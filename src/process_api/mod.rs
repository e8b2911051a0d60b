//! Contains logic for enumerating processes of the operating system.
//! [SysinfoProcessLister] is the main artifact of this module, the rest of the application only
//! relies on the [ProcessLister] contract.

use anyhow::{bail, Result};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub pid: u32,
    /// Short name of the process as reported by the OS. On linux it is truncated to 15 bytes.
    pub name: String,
    /// Command line arguments, including the executable as the first one.
    pub cmd: Vec<String>,
}

/// Intended to serve as a contract that OS specific implementations must implement.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLister: Send {
    fn processes(&mut self) -> Result<Vec<ProcessDescriptor>>;
}

pub struct SysinfoProcessLister {
    system: System,
}

impl SysinfoProcessLister {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProcessLister {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLister for SysinfoProcessLister {
    fn processes(&mut self) -> Result<Vec<ProcessDescriptor>> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            bail!("Process enumeration isn't supported on this system");
        }

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );

        let processes = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessDescriptor {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                cmd: process
                    .cmd()
                    .iter()
                    .map(|v| v.to_string_lossy().into_owned())
                    .collect(),
            })
            .collect::<Vec<_>>();

        // An empty table means we weren't allowed to look, there's always at least us.
        if processes.is_empty() {
            bail!("Process table is empty, enumeration was likely denied");
        }
        Ok(processes)
    }
}

/// Checks whether a process with the given id exists. Zombies are considered dead.
pub fn is_process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
        .process(pid)
        .is_some_and(|process| process.status() != ProcessStatus::Zombie)
}

#[cfg(test)]
mod tests {
    use super::{is_process_alive, ProcessLister, SysinfoProcessLister};

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn test_reaped_child_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();

        assert!(!is_process_alive(pid));
    }

    #[test]
    fn test_sysinfo_lists_current_process() {
        let mut lister = SysinfoProcessLister::new();
        let processes = lister.processes().unwrap();

        assert!(processes.iter().any(|v| v.pid == std::process::id()));
    }
}
