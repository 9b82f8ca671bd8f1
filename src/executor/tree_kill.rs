//! Process tree termination
//!
//! Killing only the direct child of a build leaves compilers and test runners
//! behind, so cancellation goes through a [`ProcessTreeKiller`] that enumerates
//! descendants and kills them forcefully. Hosts without the required
//! facilities get [`NoopTreeKiller`], which reports `NotSupported`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Result of a tree kill attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    /// The listed processes were signalled
    Killed {
        /// Every pid that received the kill, root first.
        pids: Vec<u32>,
    },
    /// The host has no tree kill facility
    NotSupported,
    /// The kill facility reported an error
    Failed {
        /// Reason reported by the host.
        reason: String,
    },
}

/// Platform capability for forceful process tree termination
pub trait ProcessTreeKiller: Send + Sync + fmt::Debug {
    /// Forcefully kills `pid` and all of its descendants
    fn kill_tree(&self, pid: u32) -> KillOutcome;

    /// Returns true if `pid` is a live (non-zombie) process
    fn is_running(&self, pid: u32) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Fallback for hosts without tree kill support
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTreeKiller;

impl ProcessTreeKiller for NoopTreeKiller {
    fn kill_tree(&self, _pid: u32) -> KillOutcome {
        KillOutcome::NotSupported
    }

    fn is_running(&self, _pid: u32) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Returns the tree killer for the current host
#[must_use]
pub fn platform_tree_killer() -> Arc<dyn ProcessTreeKiller> {
    #[cfg(unix)]
    {
        Arc::new(UnixTreeKiller)
    }
    #[cfg(windows)]
    {
        Arc::new(TaskkillTreeKiller)
    }
    #[cfg(not(any(unix, windows)))]
    {
        Arc::new(NoopTreeKiller)
    }
}

/// Collects `root` and every transitive child from a `(pid, ppid)` table
#[must_use]
pub fn descendants(root: u32, table: &[(u32, u32)]) -> Vec<u32> {
    let mut found = vec![root];
    let mut queue = VecDeque::from([root]);

    while let Some(parent) = queue.pop_front() {
        for &(pid, ppid) in table {
            if ppid == parent && !found.contains(&pid) {
                found.push(pid);
                queue.push_back(pid);
            }
        }
    }

    found
}

/// Tree killer using `SIGKILL` and the host process table
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixTreeKiller;

#[cfg(unix)]
impl UnixTreeKiller {
    #[cfg(target_os = "linux")]
    fn process_table() -> std::io::Result<Vec<(u32, u32)>> {
        let mut table = Vec::new();
        for entry in std::fs::read_dir("/proc")? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if let Some((_, ppid)) = read_proc_stat(pid) {
                table.push((pid, ppid));
            }
        }
        Ok(table)
    }

    #[cfg(not(target_os = "linux"))]
    fn process_table() -> std::io::Result<Vec<(u32, u32)>> {
        let output = std::process::Command::new("ps")
            .args(["-A", "-o", "pid=", "-o", "ppid="])
            .output()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let pid = fields.next()?.parse().ok()?;
                let ppid = fields.next()?.parse().ok()?;
                Some((pid, ppid))
            })
            .collect())
    }

    fn signal(pid: u32, signal: libc::c_int) -> std::io::Result<()> {
        let raw = libc::pid_t::try_from(pid)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid overflow"))?;
        // SAFETY: kill(2) has no memory safety preconditions.
        let rc = unsafe { libc::kill(raw, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

/// Parses `/proc/<pid>/stat` into `(state, ppid)`
#[cfg(target_os = "linux")]
fn read_proc_stat(pid: u32) -> Option<(char, u32)> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // comm may contain spaces and parentheses; fields resume after the last ')'
    let rest = stat.get(stat.rfind(')')? + 1..)?;
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let ppid = fields.next()?.parse().ok()?;
    Some((state, ppid))
}

#[cfg(unix)]
impl ProcessTreeKiller for UnixTreeKiller {
    fn kill_tree(&self, pid: u32) -> KillOutcome {
        let table = match Self::process_table() {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(pid, error = %e, "Process table unavailable, killing root only");
                Vec::new()
            }
        };

        let mut killed = Vec::new();
        let mut errors = Vec::new();
        for target in descendants(pid, &table) {
            match Self::signal(target, libc::SIGKILL) {
                Ok(()) => killed.push(target),
                Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {}
                Err(e) => errors.push(format!("{target}: {e}")),
            }
        }

        if killed.is_empty() && !errors.is_empty() {
            KillOutcome::Failed {
                reason: errors.join("; "),
            }
        } else {
            KillOutcome::Killed { pids: killed }
        }
    }

    #[cfg(target_os = "linux")]
    fn is_running(&self, pid: u32) -> bool {
        matches!(read_proc_stat(pid), Some((state, _)) if state != 'Z' && state != 'X')
    }

    #[cfg(not(target_os = "linux"))]
    fn is_running(&self, pid: u32) -> bool {
        match Self::signal(pid, 0) {
            Ok(()) => true,
            Err(e) => e.raw_os_error() == Some(libc::EPERM),
        }
    }

    fn name(&self) -> &'static str {
        "unix-sigkill"
    }
}

/// Tree killer using the `taskkill` utility
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskkillTreeKiller;

#[cfg(windows)]
impl ProcessTreeKiller for TaskkillTreeKiller {
    fn kill_tree(&self, pid: u32) -> KillOutcome {
        let output = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .output();

        match output {
            Ok(out) if out.status.success() => KillOutcome::Killed { pids: vec![pid] },
            Ok(out) => KillOutcome::Failed {
                reason: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            },
            Err(e) => KillOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    fn is_running(&self, pid: u32) -> bool {
        std::process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH"])
            .output()
            .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "taskkill"
    }
}
