use std::path::Path;

use tracing::{debug, warn};

use crate::process_api::{ProcessDescriptor, ProcessLister};

/// Outcome of a single detection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Detection {
    pub active: bool,
    /// Best effort guess of the open document. Many viewers don't expose it at all.
    pub document_hint: Option<String>,
}

impl Detection {
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// Decides whether any of the tracked viewers is running.
pub struct SessionDetector {
    lister: Box<dyn ProcessLister>,
    targets: Vec<String>,
    own_pid: u32,
}

impl SessionDetector {
    pub fn new(lister: Box<dyn ProcessLister>, targets: Vec<String>) -> Self {
        Self {
            lister,
            targets,
            own_pid: std::process::id(),
        }
    }

    /// Failing to enumerate processes degrades into "no session".
    pub fn detect(&mut self) -> Detection {
        match self.lister.processes() {
            Ok(processes) => {
                let detection = detect_in(&processes, &self.targets, self.own_pid);
                debug!("Detected {detection:?} among {} processes", processes.len());
                detection
            }
            Err(e) => {
                warn!("Couldn't enumerate processes, treating as inactive: {e:?}");
                Detection::inactive()
            }
        }
    }
}

/// Pure part of the detection working on an already collected process list.
pub fn detect_in(processes: &[ProcessDescriptor], targets: &[String], own_pid: u32) -> Detection {
    let mut matching = processes
        .iter()
        .filter(|process| process.pid != own_pid)
        .filter(|process| targets.iter().any(|target| matches_target(process, target)))
        .collect::<Vec<_>>();

    if matching.is_empty() {
        return Detection::inactive();
    }

    matching.sort_by_key(|process| process.pid);
    let document_hint = matching
        .iter()
        .find_map(|process| document_hint(&process.cmd));

    Detection {
        active: true,
        document_hint,
    }
}

/// Substring match, the same way `pgrep` treats its pattern. The executable file name is
/// checked too since process names get truncated.
fn matches_target(process: &ProcessDescriptor, target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    if process.name.contains(target) {
        return true;
    }
    process
        .cmd
        .first()
        .and_then(|exe| Path::new(exe).file_name())
        .is_some_and(|name| name.to_string_lossy().contains(target))
}

fn document_hint(cmd: &[String]) -> Option<String> {
    cmd.iter().skip(1).find_map(|argument| {
        let argument = argument.strip_prefix("file://").unwrap_or(argument);
        argument
            .to_ascii_lowercase()
            .ends_with(".pdf")
            .then(|| argument.to_string())
    })
}
