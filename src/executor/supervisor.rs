//! Supervised external process execution
//!
//! [`ProcessSupervisor`] spawns one external process, streams its output line
//! by line to optional callbacks and watches it until it exits or the
//! cancellation token fires. On cancellation the whole process tree is killed
//! through the host's [`ProcessTreeKiller`].
//!
//! Only the pre-flight check (the executable must exist) returns `Err`. Every
//! other failure is logged with its [`ProcessFailureKind`] and reported as
//! [`ExitCode::FAILURE`].
//!
//! ```rust,no_run
//! use arbor::executor::{ProcessInvocation, ProcessSupervisor};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> arbor::Result<()> {
//! let supervisor = ProcessSupervisor::new();
//! let invocation = ProcessInvocation::new("git").arg("status");
//! let output = supervisor.capture(&invocation, &CancellationToken::new()).await?;
//! assert!(output.exit_code.is_success());
//! # Ok(())
//! # }
//! ```

use super::exit_code::ExitCode;
use super::tree_kill::{KillOutcome, ProcessTreeKiller, platform_tree_killer};
use crate::errors::{ArborError, ProcessFailureKind, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Callback receiving one line of process output
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Description of one process to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInvocation {
    /// Executable path or bare name resolved through `PATH`
    pub executable: PathBuf,

    /// Arguments, passed verbatim
    pub args: Vec<String>,

    /// Extra environment variables for the child
    pub env: Option<HashMap<String, String>>,

    /// Working directory (inherits the current one when unset)
    pub working_dir: Option<PathBuf>,
}

impl ProcessInvocation {
    /// Creates an invocation of `executable` with no arguments
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    /// Appends one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds one environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Adds many environment variables
    #[must_use]
    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.get_or_insert_with(HashMap::new).extend(vars);
        self
    }

    /// Sets the working directory
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Renders the command line for logs
    #[must_use]
    pub fn display(&self) -> String {
        let mut parts = vec![self.executable.display().to_string()];
        parts.extend(self.args.iter().cloned());
        shell_words::join(parts)
    }
}

/// Tuning knobs for the supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Interval at which cancellation is re-checked while waiting
    pub poll_interval: Duration,

    /// Kill the whole tree on cancellation (otherwise only the direct child)
    pub kill_tree_on_cancel: bool,

    /// How long to wait for output readers and reaping after exit or kill
    pub grace_period: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            kill_tree_on_cancel: true,
            grace_period: Duration::from_secs(2),
        }
    }
}

/// Detailed outcome of one supervised run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `SUCCESS` or `FAILURE`
    pub exit_code: ExitCode,

    /// Why the run failed, if it did
    pub failure: Option<ProcessFailureKind>,

    /// Real exit code reported by the OS
    pub raw_exit_code: Option<i32>,

    /// Process id captured at spawn time
    pub pid: Option<u32>,

    /// Wall time from spawn to completion
    pub duration: Duration,
}

impl ProcessOutcome {
    fn failed(kind: ProcessFailureKind, pid: Option<u32>, started: Instant) -> Self {
        Self {
            exit_code: ExitCode::FAILURE,
            failure: Some(kind),
            raw_exit_code: None,
            pid,
            duration: started.elapsed(),
        }
    }

    /// Supervision error for this outcome
    ///
    /// `None` on success and on a plain non-zero exit, which callers report
    /// through the exit code alone.
    #[must_use]
    pub fn supervision_error(&self, executable: &Path) -> Option<ArborError> {
        let kind = self.failure?;
        if kind == ProcessFailureKind::AbnormalExit {
            return None;
        }
        let detail = match self.pid {
            Some(pid) => format!("pid {pid} after {}ms", self.duration.as_millis()),
            None => format!("no pid after {}ms", self.duration.as_millis()),
        };
        Some(ArborError::ProcessSupervision {
            executable: executable.to_path_buf(),
            kind,
            detail,
        })
    }
}

/// Output collected by [`ProcessSupervisor::capture`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Exit code of the run
    pub exit_code: ExitCode,

    /// Standard output lines
    pub stdout: Vec<String>,

    /// Standard error lines
    pub stderr: Vec<String>,
}

impl CapturedOutput {
    /// First non-empty stdout line, trimmed
    #[must_use]
    pub fn first_line(&self) -> Option<&str> {
        self.stdout
            .iter()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
    }
}

enum Completion {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
}

/// Spawns and monitors external processes
#[derive(Clone)]
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    killer: Arc<dyn ProcessTreeKiller>,
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("config", &self.config)
            .field("killer", &self.killer.name())
            .finish()
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    /// Creates a supervisor using the host's tree killer
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SupervisorConfig::default(),
            killer: platform_tree_killer(),
        }
    }

    /// Replaces the configuration
    #[must_use]
    pub fn with_config(mut self, config: SupervisorConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the tree killer
    #[must_use]
    pub fn with_killer(mut self, killer: Arc<dyn ProcessTreeKiller>) -> Self {
        self.killer = killer;
        self
    }

    /// Enables or disables killing the whole tree on cancellation
    #[must_use]
    pub fn with_tree_kill(mut self, enabled: bool) -> Self {
        self.config.kill_tree_on_cancel = enabled;
        self
    }

    /// The tree killer in use
    #[must_use]
    pub fn killer(&self) -> &Arc<dyn ProcessTreeKiller> {
        &self.killer
    }

    /// Runs a process to completion and returns its exit code
    ///
    /// # Errors
    ///
    /// Returns [`ArborError::ExecutableNotFound`] when the executable does not
    /// exist. All runtime failures are reported as `ExitCode::FAILURE`.
    pub async fn run(
        &self,
        invocation: &ProcessInvocation,
        cancel: &CancellationToken,
        on_stdout: Option<LineCallback>,
        on_stderr: Option<LineCallback>,
    ) -> Result<ExitCode> {
        self.run_detailed(invocation, cancel, on_stdout, on_stderr)
            .await
            .map(|outcome| outcome.exit_code)
    }

    /// Runs a process and collects its output lines
    ///
    /// # Errors
    ///
    /// Same as [`ProcessSupervisor::run`].
    pub async fn capture(
        &self,
        invocation: &ProcessInvocation,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput> {
        let stdout = Arc::new(Mutex::new(Vec::new()));
        let stderr = Arc::new(Mutex::new(Vec::new()));

        let exit_code = self
            .run(
                invocation,
                cancel,
                Some(collector(&stdout)),
                Some(collector(&stderr)),
            )
            .await?;

        Ok(CapturedOutput {
            exit_code,
            stdout: std::mem::take(&mut *stdout.lock()),
            stderr: std::mem::take(&mut *stderr.lock()),
        })
    }

    /// Runs a process and returns the full outcome
    ///
    /// # Errors
    ///
    /// Same as [`ProcessSupervisor::run`].
    pub async fn run_detailed(
        &self,
        invocation: &ProcessInvocation,
        cancel: &CancellationToken,
        on_stdout: Option<LineCallback>,
        on_stderr: Option<LineCallback>,
    ) -> Result<ProcessOutcome> {
        let search_path = invocation
            .env
            .as_ref()
            .and_then(|env| env.get("PATH"))
            .map(OsString::from);
        let executable = resolve_executable(&invocation.executable, search_path)?;
        let command_line = invocation.display();

        let mut cmd = Command::new(&executable);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(redirect(on_stdout.is_some()))
            .stderr(redirect(on_stderr.is_some()))
            .kill_on_drop(true);
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(env) = &invocation.env {
            cmd.envs(env);
        }

        let started = Instant::now();
        tracing::debug!(command = %command_line, "Spawning process");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                report_failure(ProcessFailureKind::SpawnFailure, &command_line, &e.to_string());
                return Ok(ProcessOutcome::failed(
                    ProcessFailureKind::SpawnFailure,
                    None,
                    started,
                ));
            }
        };

        let pid = child.id();
        tracing::debug!(command = %command_line, pid = ?pid, "Process spawned");

        let mut readers = Vec::new();
        if let (Some(stream), Some(callback)) = (child.stdout.take(), on_stdout) {
            readers.push(spawn_line_reader(stream, callback));
        }
        if let (Some(stream), Some(callback)) = (child.stderr.take(), on_stderr) {
            readers.push(spawn_line_reader(stream, callback));
        }

        let completion = self.wait_for_completion(&mut child, cancel).await;

        let status = match completion {
            Completion::Cancelled => {
                self.terminate(&mut child, pid, &command_line).await;
                self.drain_readers(readers).await;
                report_failure(
                    ProcessFailureKind::Timeout,
                    &command_line,
                    &format!("cancelled after {}ms", started.elapsed().as_millis()),
                );
                return Ok(ProcessOutcome::failed(
                    ProcessFailureKind::Timeout,
                    pid,
                    started,
                ));
            }
            Completion::Exited(Err(e)) => {
                self.drain_readers(readers).await;
                report_failure(
                    ProcessFailureKind::ExitCodeUnavailable,
                    &command_line,
                    &e.to_string(),
                );
                return Ok(ProcessOutcome::failed(
                    ProcessFailureKind::ExitCodeUnavailable,
                    pid,
                    started,
                ));
            }
            Completion::Exited(Ok(status)) => status,
        };

        self.drain_readers(readers).await;

        if let Some(pid) = pid
            && self.killer.is_running(pid)
        {
            report_failure(
                ProcessFailureKind::RaceDetected,
                &command_line,
                &format!("pid {pid} still running after reported exit"),
            );
            return Ok(ProcessOutcome::failed(
                ProcessFailureKind::RaceDetected,
                Some(pid),
                started,
            ));
        }

        let duration = started.elapsed();
        match status.code() {
            Some(0) => {
                tracing::debug!(
                    command = %command_line,
                    duration_ms = duration.as_millis(),
                    "Process completed"
                );
                Ok(ProcessOutcome {
                    exit_code: ExitCode::SUCCESS,
                    failure: None,
                    raw_exit_code: Some(0),
                    pid,
                    duration,
                })
            }
            Some(code) => {
                report_failure(
                    ProcessFailureKind::AbnormalExit,
                    &command_line,
                    &format!("exit code {code}"),
                );
                Ok(ProcessOutcome {
                    exit_code: ExitCode::FAILURE,
                    failure: Some(ProcessFailureKind::AbnormalExit),
                    raw_exit_code: Some(code),
                    pid,
                    duration,
                })
            }
            None => {
                report_failure(
                    ProcessFailureKind::ExitCodeUnavailable,
                    &command_line,
                    &format!("terminated without exit code ({status})"),
                );
                Ok(ProcessOutcome::failed(
                    ProcessFailureKind::ExitCodeUnavailable,
                    pid,
                    started,
                ))
            }
        }
    }

    async fn wait_for_completion(
        &self,
        child: &mut Child,
        cancel: &CancellationToken,
    ) -> Completion {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Completion::Cancelled,
                status = child.wait() => return Completion::Exited(status),
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        return Completion::Cancelled;
                    }
                }
            }
        }
    }

    async fn terminate(&self, child: &mut Child, pid: Option<u32>, command_line: &str) {
        let Some(pid) = pid else {
            tracing::warn!(command = %command_line, "Process id was never captured, skipping termination");
            return;
        };

        if self.config.kill_tree_on_cancel {
            tracing::info!(command = %command_line, pid, killer = self.killer.name(), "Killing process tree");
            match self.killer.kill_tree(pid) {
                KillOutcome::Killed { pids } => {
                    tracing::info!(pid, killed = ?pids, "Process tree killed");
                }
                KillOutcome::NotSupported => {
                    tracing::warn!(pid, "Tree kill not supported on this host, killing direct child only");
                }
                KillOutcome::Failed { reason } => {
                    tracing::error!(pid, reason = %reason, "Tree kill failed");
                }
            }
        } else {
            tracing::info!(command = %command_line, pid, "Tree kill disabled, killing direct child only");
        }

        if let Err(e) = child.start_kill() {
            tracing::debug!(pid, error = %e, "Direct kill skipped");
        }

        match tokio::time::timeout(self.config.grace_period, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(pid, status = %status, "Killed process reaped"),
            Ok(Err(e)) => tracing::warn!(pid, error = %e, "Could not reap killed process"),
            Err(_) => tracing::warn!(pid, "Killed process did not exit within grace period"),
        }
    }

    async fn drain_readers(&self, readers: Vec<JoinHandle<()>>) {
        if readers.is_empty() {
            return;
        }
        let aborts: Vec<_> = readers.iter().map(JoinHandle::abort_handle).collect();
        let joined = futures::future::join_all(readers);
        if tokio::time::timeout(self.config.grace_period, joined)
            .await
            .is_err()
        {
            // a detached grandchild can hold the pipe open
            tracing::debug!("Output readers still open after grace period, aborting");
            for handle in aborts {
                handle.abort();
            }
        }
    }
}

fn redirect(capture: bool) -> Stdio {
    if capture {
        Stdio::piped()
    } else {
        Stdio::inherit()
    }
}

fn report_failure(kind: ProcessFailureKind, command: &str, detail: &str) {
    match kind {
        ProcessFailureKind::AbnormalExit => {
            tracing::warn!(command = %command, kind = %kind, detail = %detail, "Process failed");
        }
        _ => {
            tracing::error!(command = %command, kind = %kind, detail = %detail, "Process supervision failed");
        }
    }
}

fn collector(sink: &Arc<Mutex<Vec<String>>>) -> LineCallback {
    let sink = Arc::clone(sink);
    Arc::new(move |line: &str| sink.lock().push(line.to_string()))
}

fn spawn_line_reader<R>(stream: R, callback: LineCallback) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    callback(line.trim_end_matches(['\n', '\r']));
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Output stream closed with error");
                    break;
                }
            }
        }
    })
}

/// Resolves an executable path, searching `PATH` for bare names
///
/// `search_path` overrides the process `PATH` when given.
///
/// # Errors
///
/// Returns [`ArborError::ExecutableNotFound`] when nothing matches.
pub fn resolve_executable(candidate: &Path, search_path: Option<OsString>) -> Result<PathBuf> {
    let not_found = || ArborError::ExecutableNotFound {
        path: candidate.to_path_buf(),
    };

    if candidate.as_os_str().is_empty() {
        return Err(not_found());
    }

    if candidate.is_absolute() || candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(not_found())
        };
    }

    let path_var = search_path
        .or_else(|| std::env::var_os("PATH"))
        .ok_or_else(not_found)?;

    for dir in std::env::split_paths(&path_var) {
        for name in executable_names(candidate) {
            let full = dir.join(&name);
            if full.is_file() {
                return Ok(full);
            }
        }
    }

    Err(not_found())
}

#[cfg(windows)]
fn executable_names(candidate: &Path) -> Vec<PathBuf> {
    let mut names = vec![candidate.to_path_buf()];
    if candidate.extension().is_none() {
        let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT".to_string());
        for ext in exts.split(';').filter(|e| !e.is_empty()) {
            names.push(candidate.with_extension(ext.trim_start_matches('.')));
        }
    }
    names
}

#[cfg(not(windows))]
fn executable_names(candidate: &Path) -> Vec<PathBuf> {
    vec![candidate.to_path_buf()]
}
