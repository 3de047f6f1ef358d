//! ACP agent process spawner.
//!
//! Spawns the agent binary with piped stdio and `kill_on_drop(true)`, and
//! runs an exit monitor that reports process termination or performs a
//! graceful shutdown (close stdin, `SIGTERM`, grace period, kill) when the
//! connection is torn down.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acp::transport::TransportEvent;
use crate::{AppError, Result};

/// How long the exit monitor waits for the stdout reader to drain after the
/// process exits, so responses written just before exit are still delivered.
const STDOUT_DRAIN: Duration = Duration::from_millis(500);

// ── Environment allowlist ────────────────────────────────────────────────────

/// Environment variables inherited by the agent when
/// [`SpawnConfig::isolate_env`] is set.
///
/// Every other variable is stripped via `env_clear()`; [`SpawnConfig::env`]
/// entries are applied on top.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "TERM",
    "SHELL",
    "TMPDIR",
    "RUST_LOG",
    // Windows-specific variables.
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

// ── Configuration ────────────────────────────────────────────────────────────

/// Launch parameters for an ACP agent process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    /// Agent executable (e.g. `claude-code-acp`, `gemini`).
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the child process.
    pub working_dir: PathBuf,
    /// Extra environment variables for the child.
    pub env: BTreeMap<String, String>,
    /// Start from an empty environment plus [`ALLOWED_ENV_VARS`] instead of
    /// inheriting the full parent environment.
    pub isolate_env: bool,
}

impl SpawnConfig {
    /// Minimal config: run `command` with `args` in `working_dir`.
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            command: command.into(),
            args,
            working_dir,
            env: BTreeMap::new(),
            isolate_env: false,
        }
    }
}

// ── Process handle ───────────────────────────────────────────────────────────

/// A freshly spawned agent process with its stdio captured.
#[derive(Debug)]
pub struct AgentProcess {
    /// Child process handle; `kill_on_drop` is set.
    pub child: Child,
    /// Agent's stdin (client → agent messages).
    pub stdin: ChildStdin,
    /// Agent's stdout (agent → client messages).
    pub stdout: ChildStdout,
    /// Agent's stderr (diagnostics).
    pub stderr: ChildStderr,
}

// ── Spawner ──────────────────────────────────────────────────────────────────

/// Spawn the agent process described by `config`.
///
/// # Errors
///
/// - [`AppError::Spawn`]: the executable could not be launched.
/// - [`AppError::Spawn`]: a stdio pipe could not be captured.
pub fn spawn_agent(config: &SpawnConfig) -> Result<AgentProcess> {
    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args);

    if config.isolate_env {
        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
    }
    cmd.envs(&config.env);

    cmd.current_dir(&config.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| {
        warn!(command = %config.command, error = %err, "failed to spawn agent process");
        AppError::Spawn(format!("failed to spawn `{}`: {err}", config.command))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture agent stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture agent stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Spawn("failed to capture agent stderr".into()))?;

    info!(
        command = %config.command,
        args = ?config.args,
        pid = ?child.id(),
        cwd = %config.working_dir.display(),
        "agent process spawned"
    );

    Ok(AgentProcess {
        child,
        stdin,
        stdout,
        stderr,
    })
}

// ── Exit monitor ─────────────────────────────────────────────────────────────

/// Spawn a task that owns `child` until it exits or the transport shuts down.
///
/// On natural exit the task waits (briefly) for `reader_done` so the stdout
/// reader can deliver any trailing messages, then emits
/// [`TransportEvent::Exited`].
///
/// On `cancel` the task terminates the process: `SIGTERM` on unix, then up
/// to `shutdown_grace` for a clean exit, then a forced kill. No event is
/// emitted on this path; the caller is already tearing down.
#[must_use]
pub fn monitor_exit(
    mut child: Child,
    event_tx: mpsc::Sender<TransportEvent>,
    reader_done: CancellationToken,
    cancel: CancellationToken,
    shutdown_grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = child.wait() => {
                let (exit_code, reason) = match result {
                    Ok(status) => {
                        let code = status.code();
                        let reason = code.map_or_else(
                            || "process terminated by signal".to_owned(),
                            |c| format!("process exited with code {c}"),
                        );
                        (code, reason)
                    }
                    Err(err) => {
                        warn!(%err, "error waiting for agent child process");
                        (None, format!("wait error: {err}"))
                    }
                };
                info!(?exit_code, %reason, "agent process exited");

                if tokio::time::timeout(STDOUT_DRAIN, reader_done.cancelled()).await.is_err() {
                    debug!("stdout still open after agent exit, reporting exit anyway");
                }

                let event = TransportEvent::Exited { exit_code, reason };
                if event_tx.send(event).await.is_err() {
                    debug!("event_tx closed before Exited could be delivered");
                }
            }
            () = cancel.cancelled() => {
                terminate(&mut child, shutdown_grace).await;
            }
        }
    })
}

/// Ask the child to exit, escalating to a kill after `grace`.
async fn terminate(child: &mut Child, grace: Duration) {
    if let Ok(Some(status)) = child.try_wait() {
        debug!(?status, "agent process already exited");
        return;
    }

    send_sigterm(child);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => info!(?status, "agent process exited gracefully"),
        Ok(Err(err)) => warn!(%err, "error waiting for agent process"),
        Err(_) => {
            warn!("agent process did not exit within grace period, forcing kill");
            if let Err(err) = child.kill().await {
                warn!(%err, "failed to force-kill agent process");
            }
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        debug!(pid, %err, "SIGTERM delivery failed");
    }
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) {
    // No polite signal available; the grace period still lets a process that
    // noticed stdin closing exit on its own before the kill.
}
