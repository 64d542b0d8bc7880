//! Claude Code process spawning and control.
//!
//! [`Launcher`] owns one CLI subprocess for its whole life: it spawns it,
//! reads its stdout one message at a time, waits for it, and signals it.
//! All methods take `&self`, so a launcher can be shared through an `Arc`
//! between a reading task and a waiting task.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tempfile::TempPath;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::cli::{LaunchOptions, LineReader, SessionMetrics, StreamMessage};
use crate::error::{Error, Result};
use crate::extract::{extract_text, get_tool_call};
use crate::hooks::HookDispatcher;

/// Name of the CLI binary looked up on `PATH`.
pub const DEFAULT_BINARY: &str = "claude";

/// Version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long `wait` gives the stderr reader to finish after the process exits.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Why the launcher killed its own process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillReason {
    Cancelled,
    Timeout(Duration),
}

/// Cached result of `wait`, replayed to later callers.
#[derive(Debug, Clone)]
enum WaitOutcome {
    Success,
    Exit { code: i32, stderr: String },
    Timeout(Duration),
    Cancelled,
    Failed { kind: std::io::ErrorKind, message: String },
}

impl WaitOutcome {
    fn to_result(&self) -> Result<()> {
        match self {
            Self::Success => Ok(()),
            Self::Exit { code, stderr } => Err(Error::Exit {
                code: *code,
                stderr: stderr.clone(),
            }),
            Self::Timeout(limit) => Err(Error::Timeout(*limit)),
            Self::Cancelled => Err(Error::Cancelled),
            Self::Failed { kind, message } => {
                Err(Error::Wait(std::io::Error::new(*kind, message.clone())))
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    started: bool,
    pid: Option<u32>,
    started_at: Option<Instant>,
    deadline: Option<(Instant, Duration)>,
    cancel: CancellationToken,
    hooks: HookDispatcher,
    temp_files: Vec<TempPath>,
    stderr_task: Option<JoinHandle<String>>,
    stderr: String,
    kill_reason: Option<KillReason>,
    elapsed: Option<Duration>,
    outcome: Option<WaitOutcome>,
}

/// Low-level control over one Claude CLI subprocess.
///
/// Lifecycle: not started → running → exited. `start` succeeds once;
/// `wait` should always be called so temp files are removed and `on_exit`
/// fires.
///
/// ```no_run
/// # async fn demo() -> claude_session::Result<()> {
/// use claude_session::{extract_text, LaunchOptions, Launcher};
/// use tokio_util::sync::CancellationToken;
///
/// let launcher = Launcher::new();
/// let token = CancellationToken::new();
/// launcher.start(&token, "Explain recursion", LaunchOptions::new()).await?;
///
/// while let Some(msg) = launcher.read_message().await? {
///     println!("{}", extract_text(&msg));
/// }
/// launcher.wait().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct Launcher {
    state: Mutex<State>,
    stdout: tokio::sync::Mutex<Option<LineReader<ChildStdout>>>,
    child: tokio::sync::Mutex<Option<Child>>,
    kill_requested: Notify,
    done: CancellationToken,
}

impl Launcher {
    /// Create a launcher. Nothing runs until [`start`](Self::start).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the CLI with the given prompt.
    ///
    /// Cancelling `token` kills the process; the kill is observed by
    /// `read_message` and reported by `wait` as `Error::Cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyStarted` on a second call, `Error::CliNotFound`
    /// if the binary cannot be located, `Error::InvalidConfig` for options
    /// that cannot be turned into arguments, and `Error::Start` if writing
    /// the MCP config or spawning fails.
    pub async fn start(
        &self,
        token: &CancellationToken,
        prompt: &str,
        opts: LaunchOptions,
    ) -> Result<()> {
        let started = self.lock_state().started;
        if started {
            return Err(Error::AlreadyStarted);
        }
        let mut child_slot = self.child.lock().await;
        let mut stdout_slot = self.stdout.lock().await;
        let started = self.lock_state().started;
        if started {
            return Err(Error::AlreadyStarted);
        }

        let binary = resolve_binary(opts.get_binary())?;

        let mcp_file = if opts.has_mcp_servers() {
            Some(write_mcp_config(&opts.mcp_config_json()?)?)
        } else {
            None
        };
        let args = opts.build_args(prompt, mcp_file.as_deref())?;

        let mut cmd = Command::new(&binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in opts.env_vars() {
            cmd.env(key, value);
        }
        if let Some(dir) = opts.get_work_dir() {
            cmd.current_dir(dir);
        }

        tracing::debug!(binary = %binary.display(), ?args, "Spawning Claude process");
        let started_at = Instant::now();
        let mut child = cmd.spawn().map_err(|e| spawn_error(e, &binary))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Start(std::io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Start(std::io::Error::other("stderr not captured")))?;
        let pid = child.id();

        *child_slot = Some(child);
        *stdout_slot = Some(LineReader::new(stdout));

        let hooks = HookDispatcher::new(opts.get_hooks());
        {
            let mut state = self.lock_state();
            state.started = true;
            state.pid = pid;
            state.started_at = Some(started_at);
            state.deadline = opts.get_timeout().map(|limit| (started_at + limit, limit));
            state.cancel = token.clone();
            state.hooks = hooks.clone();
            state.temp_files.extend(mcp_file);
            state.stderr_task = Some(tokio::spawn(drain_stderr(stderr)));
        }
        drop(stdout_slot);
        drop(child_slot);

        tracing::info!(pid = ?pid, "Started Claude process");
        if let Some(pid) = pid {
            hooks.start(pid);
        }
        Ok(())
    }

    /// Read the next message from stdout.
    ///
    /// Blank lines are skipped. Returns `Ok(None)` once the process has
    /// closed stdout. Hooks fire here, in order: `on_message`, `on_text`,
    /// `on_tool_call`, `on_metrics`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotStarted` before `start`. `Error::Parse`,
    /// `Error::LineTooLong` and `Error::Io` are not fatal; the next call
    /// continues with the following line.
    pub async fn read_message(&self) -> Result<Option<StreamMessage>> {
        let (hooks, cancel, deadline) = {
            let state = self.lock_state();
            if !state.started {
                return Err(Error::NotStarted);
            }
            (state.hooks.clone(), state.cancel.clone(), state.deadline)
        };

        let mut slot = self.stdout.lock().await;
        let Some(reader) = slot.as_mut() else {
            return Ok(None);
        };

        let result = {
            let next = reader.next_message();
            tokio::pin!(next);
            let mut terminating = false;
            loop {
                tokio::select! {
                    biased;
                    result = &mut next => break result,
                    () = cancel.cancelled(), if !terminating => {
                        terminating = true;
                        self.terminate(KillReason::Cancelled);
                    }
                    () = sleep_until(deadline), if !terminating => {
                        terminating = true;
                        if let Some((_, limit)) = deadline {
                            self.terminate(KillReason::Timeout(limit));
                        }
                    }
                }
            }
        };
        drop(slot);

        match &result {
            Ok(Some(msg)) => dispatch(&hooks, msg),
            Err(e) if e.is_recoverable() => {
                tracing::debug!(error = %e, "Skipping unreadable line");
                hooks.error(e);
            }
            _ => {}
        }
        result
    }

    /// Wait for the process to exit and release its resources.
    ///
    /// The first call removes temp files, collects stderr, signals
    /// [`done`](Self::done) and fires `on_exit`. Later calls return an equal
    /// outcome without repeating any of that.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotStarted` before `start`, `Error::Cancelled` or
    /// `Error::Timeout` if the launcher killed the process, `Error::Exit`
    /// for a non-zero exit code, and `Error::Wait` if waiting failed.
    pub async fn wait(&self) -> Result<()> {
        {
            let state = self.lock_state();
            if !state.started {
                return Err(Error::NotStarted);
            }
            if let Some(outcome) = &state.outcome {
                return outcome.to_result();
            }
        }

        let mut slot = self.child.lock().await;
        let (cancel, deadline) = {
            let state = self.lock_state();
            if let Some(outcome) = &state.outcome {
                return outcome.to_result();
            }
            (state.cancel.clone(), state.deadline)
        };
        let Some(child) = slot.as_mut() else {
            return Err(Error::NotStarted);
        };

        let status = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    // Exited on its own before the cancellation was seen.
                    if let Ok(Some(status)) = child.try_wait() {
                        break Ok(status);
                    }
                    self.record_kill(KillReason::Cancelled);
                    start_kill(child);
                    break child.wait().await;
                }
                () = sleep_until(deadline) => {
                    if let Ok(Some(status)) = child.try_wait() {
                        break Ok(status);
                    }
                    if let Some((_, limit)) = deadline {
                        self.record_kill(KillReason::Timeout(limit));
                    }
                    start_kill(child);
                    break child.wait().await;
                }
                () = self.kill_requested.notified() => {
                    tracing::debug!("Kill requested while waiting");
                    start_kill(child);
                }
                status = child.wait() => break status,
            }
        };
        *slot = None;
        drop(slot);

        self.finish(status).await
    }

    /// Send SIGINT so the CLI can shut down cleanly.
    ///
    /// Falls back to [`kill`](Self::kill) where signals are unavailable.
    /// Does nothing once the process has exited.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotStarted` before `start`, or `Error::Io` if the
    /// signal cannot be delivered.
    pub fn interrupt(&self) -> Result<()> {
        let pid = {
            let state = self.lock_state();
            if !state.started {
                return Err(Error::NotStarted);
            }
            if state.outcome.is_some() {
                return Ok(());
            }
            state.pid
        };

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let Some(raw) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
                return self.kill();
            };
            tracing::debug!(pid = raw, "Sending SIGINT");
            match kill(Pid::from_raw(raw), Signal::SIGINT) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(errno) => Err(Error::Io(errno.into())),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = pid;
            self.kill()
        }
    }

    /// Forcefully kill the process. Returns immediately; call
    /// [`wait`](Self::wait) to observe the exit. Does nothing once the
    /// process has exited.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotStarted` before `start`, or `Error::Io` if the
    /// kill signal cannot be sent.
    pub fn kill(&self) -> Result<()> {
        {
            let state = self.lock_state();
            if !state.started {
                return Err(Error::NotStarted);
            }
            if state.outcome.is_some() {
                return Ok(());
            }
        }

        if let Ok(mut slot) = self.child.try_lock() {
            if let Some(child) = slot.as_mut() {
                match child.start_kill() {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
                    Err(e) => return Err(Error::Io(e)),
                }
            }
        } else {
            // A waiter owns the child; it performs the kill.
            self.kill_requested.notify_one();
        }
        Ok(())
    }

    /// Returns true between a successful `start` and the end of `wait`.
    #[must_use]
    pub fn running(&self) -> bool {
        self.lock_state().started && !self.done.is_cancelled()
    }

    /// Resolves once `wait` has completed.
    pub fn done(&self) -> WaitForCancellationFuture<'_> {
        self.done.cancelled()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Process id; `None` before start.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.lock_state().pid
    }

    /// Time since start, frozen once `wait` completes. `None` before start.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let state = self.lock_state();
        state
            .elapsed
            .or_else(|| state.started_at.map(|at| at.elapsed()))
    }

    /// Captured stderr, available after `wait`.
    #[must_use]
    pub fn stderr(&self) -> String {
        self.lock_state().stderr.clone()
    }

    /// Error recorded by a completed `wait`; `None` while running or after a
    /// clean exit.
    #[must_use]
    pub fn exit_error(&self) -> Option<Error> {
        self.lock_state()
            .outcome
            .as_ref()
            .and_then(|outcome| outcome.to_result().err())
    }

    pub(crate) fn is_started(&self) -> bool {
        self.lock_state().started
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_kill(&self, reason: KillReason) -> bool {
        let mut state = self.lock_state();
        if state.kill_reason.is_some() || state.outcome.is_some() {
            return false;
        }
        state.kill_reason = Some(reason);
        true
    }

    fn terminate(&self, reason: KillReason) {
        if !self.record_kill(reason) {
            return;
        }
        tracing::info!(?reason, "Killing Claude process");
        if let Err(e) = self.kill() {
            tracing::warn!(error = %e, "Failed to kill Claude process");
        }
    }

    async fn finish(&self, status: std::io::Result<ExitStatus>) -> Result<()> {
        let (temp_files, stderr_task) = {
            let mut state = self.lock_state();
            (
                std::mem::take(&mut state.temp_files),
                state.stderr_task.take(),
            )
        };

        for path in temp_files {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                tracing::warn!(path = %shown, error = %e, "Failed to remove temp file");
            }
        }

        let stderr = match stderr_task {
            Some(task) => match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, task).await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Stderr reader failed");
                    String::new()
                }
                Err(_) => {
                    tracing::warn!("Timed out collecting stderr");
                    String::new()
                }
            },
            None => String::new(),
        };

        let code = status
            .as_ref()
            .map_or(-1, |status| status.code().unwrap_or(-1));

        let (outcome, elapsed, hooks, pid) = {
            let mut state = self.lock_state();
            let elapsed = state
                .started_at
                .map_or(Duration::ZERO, |at| at.elapsed());
            let outcome = match (state.kill_reason, status) {
                (Some(KillReason::Cancelled), _) => WaitOutcome::Cancelled,
                (Some(KillReason::Timeout(limit)), _) => WaitOutcome::Timeout(limit),
                (None, Err(e)) => WaitOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                },
                (None, Ok(status)) if status.success() => WaitOutcome::Success,
                (None, Ok(_)) => WaitOutcome::Exit {
                    code,
                    stderr: stderr.clone(),
                },
            };
            state.stderr = stderr;
            state.elapsed = Some(elapsed);
            state.outcome = Some(outcome.clone());
            (outcome, elapsed, state.hooks.clone(), state.pid)
        };

        self.done.cancel();
        tracing::info!(
            pid = ?pid,
            code,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Claude process exited"
        );
        hooks.exit(code, elapsed);
        outcome.to_result()
    }
}

fn dispatch(hooks: &HookDispatcher, msg: &StreamMessage) {
    hooks.message(msg);

    let text = extract_text(msg);
    if !text.is_empty() {
        hooks.text(text);
    }

    if let Some(call) = get_tool_call(msg) {
        hooks.tool_call(call.name, call.input);
    }

    if let StreamMessage::Result(result) = msg {
        hooks.metrics(&SessionMetrics::from_result(result));
    }
}

fn start_kill(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Kill failed; process may have exited");
    }
}

async fn sleep_until(deadline: Option<(Instant, Duration)>) {
    match deadline {
        Some((at, _)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn drain_stderr(mut stderr: ChildStderr) -> String {
    let mut buf = Vec::new();
    if let Err(e) = stderr.read_to_end(&mut buf).await {
        tracing::debug!(error = %e, "Error reading stderr");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn write_mcp_config(json: &str) -> Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix("claude-mcp-")
        .suffix(".json")
        .tempfile()
        .map_err(Error::Start)?;
    file.write_all(json.as_bytes()).map_err(Error::Start)?;
    file.flush().map_err(Error::Start)?;
    Ok(file.into_temp_path())
}

fn spawn_error(err: std::io::Error, binary: &Path) -> Error {
    match err.kind() {
        std::io::ErrorKind::NotFound => Error::CliNotFound {
            searched: binary.display().to_string(),
        },
        _ => Error::Start(err),
    }
}

/// Locate the CLI binary.
///
/// A path with a directory component is used as-is; a bare name is looked
/// up on `PATH`. With no override, `claude` is looked up.
///
/// # Errors
///
/// Returns `Error::CliNotFound` if no executable is found.
pub fn resolve_binary(binary: Option<&Path>) -> Result<PathBuf> {
    let requested = binary.unwrap_or_else(|| Path::new(DEFAULT_BINARY));
    let not_found = || Error::CliNotFound {
        searched: requested.display().to_string(),
    };

    if requested.components().count() > 1 {
        return if is_executable(requested) {
            Ok(requested.to_path_buf())
        } else {
            Err(not_found())
        };
    }

    let path = std::env::var_os("PATH").ok_or_else(not_found)?;
    std::env::split_paths(&path)
        .flat_map(|dir| candidates(&dir, requested))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(not_found)
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &Path) -> Vec<PathBuf> {
    vec![dir.join(name), dir.join(name).with_extension("exe")]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &Path) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Returns true if the `claude` binary is on `PATH`.
#[must_use]
pub fn cli_available() -> bool {
    resolve_binary(None).is_ok()
}

/// Run `claude --version` and return its trimmed output.
///
/// # Errors
///
/// Returns `Error::CliNotFound`, `Error::Start` if it cannot be run, or
/// `Error::Exit` if it exits non-zero.
pub async fn cli_version(binary: Option<&Path>) -> Result<String> {
    let path = resolve_binary(binary)?;
    let output = Command::new(&path)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| spawn_error(e, &path))?;

    if !output.status.success() {
        return Err(Error::Exit {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
