// crates/core/src/jobs/process.rs
//! Spawning and supervision of one external process per job.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessError;

use super::log_buffer::LogBuffer;
use super::types::JobSpec;

/// Launches and supervises the external process for one job.
///
/// The runner has no knowledge of job bookkeeping. It invokes the program
/// with an explicit argument vector (never a shell-interpreted command
/// string), merges stdout and stderr into one ordered line stream, and
/// appends each line to the job's [`LogBuffer`] as it arrives, so output is
/// visible to log queries while the job is still running.
pub struct ProcessRunner {
    program: PathBuf,
    args: Vec<String>,
    working_dir: PathBuf,
}

enum Stop {
    Cancelled,
    TimedOut(Duration),
}

impl ProcessRunner {
    pub fn from_spec(spec: &JobSpec) -> Self {
        Self {
            program: spec.program.clone(),
            args: spec.args.clone(),
            working_dir: spec.working_dir.clone(),
        }
    }

    /// Launch the process. Failure to spawn (missing executable, permission
    /// denied) is reported immediately, never silently swallowed.
    ///
    /// `kill_on_drop` guarantees the child does not outlive its supervisor
    /// if the supervisor is torn down abnormally.
    pub fn spawn(&self) -> Result<Child, ProcessError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn().map_err(|e| ProcessError::Spawn {
            program: self.program.clone(),
            source: e,
        })
    }

    /// Supervise `child` until it exits, is cancelled, or exceeds `timeout`.
    ///
    /// Suspends only the calling task. Cancellation and timeout both
    /// request cooperative termination (SIGTERM), wait up to `grace`, then
    /// escalate to SIGKILL. Returns the exit code on natural exit
    /// (`-1` when the process was killed by a signal).
    pub async fn supervise(
        mut child: Child,
        log: Arc<LogBuffer>,
        cancel: CancellationToken,
        timeout: Option<Duration>,
        grace: Duration,
    ) -> Result<i32, ProcessError> {
        let stdout = child.stdout.take().ok_or_else(|| ProcessError::Io {
            source: std::io::Error::other("stdout was not captured"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ProcessError::Io {
            source: std::io::Error::other("stderr was not captured"),
        })?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_open = true;
        let mut err_open = true;

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut kill_at: Option<Instant> = None;
        let mut stop: Option<Stop> = None;

        // Read until both streams reach EOF; the pipes close when the
        // process exits, whether naturally or after escalation.
        while out_open || err_open {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(line)) => log.append(line),
                    Ok(None) => out_open = false,
                    Err(e) => {
                        log.append(format!("[output reader] {e}"));
                        out_open = false;
                    }
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(line)) => log.append(line),
                    Ok(None) => err_open = false,
                    Err(e) => {
                        log.append(format!("[output reader] {e}"));
                        err_open = false;
                    }
                },
                _ = cancel.cancelled(), if stop.is_none() => {
                    stop = Some(Stop::Cancelled);
                    request_terminate(&child);
                    kill_at = Some(Instant::now() + grace);
                },
                _ = async { tokio::time::sleep_until(deadline.unwrap()).await },
                        if deadline.is_some() && stop.is_none() => {
                    stop = Some(Stop::TimedOut(timeout.unwrap_or_default()));
                    request_terminate(&child);
                    kill_at = Some(Instant::now() + grace);
                },
                _ = async { tokio::time::sleep_until(kill_at.unwrap()).await },
                        if kill_at.is_some() => {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(error = %e, "kill escalation failed (process likely exited)");
                    }
                    kill_at = None;
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ProcessError::Io { source: e })?;

        match stop {
            Some(Stop::Cancelled) => Err(ProcessError::Cancelled),
            Some(Stop::TimedOut(limit)) => Err(ProcessError::Timeout { limit }),
            None => Ok(status.code().unwrap_or(-1)),
        }
    }
}

/// Ask the process to exit via SIGTERM. Terminating an already-exited
/// process is a no-op, not an error.
fn request_terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            tracing::debug!(pid, error = %e, "SIGTERM not delivered (process likely exited)");
        }
    }
}
