use std::ffi::OsString;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::stream::request::SpawnRequest;
use crate::worker::output::OutputBuffer;
use crate::worker::status::Termination;

/// Result of supervising one child process to completion.
#[derive(Debug)]
pub struct ExecutionReport {
    /// OS pid of the process group leader, `-1` when the wait status could
    /// not be attributed to a child.
    pub pid: i32,
    pub code: i64,
    /// Merged stdout+stderr plus runner annotations.
    pub output: Vec<u8>,
    pub exec_start: f64,
    pub exec_end: f64,
}

/// Outcome of one execution attempt after a successful spawn.
#[derive(Debug)]
pub enum ExecStatus {
    Completed(ExecutionReport),
    /// The drain signal fired mid-execution: the child was killed and
    /// reaped, and no response must be published.
    Drained,
}

/// Spawns request commands and supervises them to termination.
#[derive(Debug, Default)]
pub struct Executor {
    worker_env: OnceLock<Vec<(OsString, OsString)>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The worker's own environment, captured once on first use.
    fn worker_env(&self) -> &[(OsString, OsString)] {
        self.worker_env
            .get_or_init(|| std::env::vars_os().collect())
    }

    /// Execute one request: spawn the child in its own process group, pump
    /// both output streams into a shared buffer, and wait for termination,
    /// the deadline, or the drain signal.
    ///
    /// A spawn failure is returned as the `Err` variant; everything after a
    /// successful spawn resolves to an [`ExecStatus`].
    pub async fn execute(
        &self,
        request: &SpawnRequest,
        drain: &CancellationToken,
    ) -> io::Result<ExecStatus> {
        let mut command = Command::new(&request.command[0]);
        command
            .args(&request.command[1..])
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        for (key, value) in self.worker_env() {
            command.env(key, value);
        }
        // Request entries come second so they win on key collision
        for entry in &request.env {
            if let Some((key, value)) = entry.split_once('=') {
                command.env(key, value);
            }
        }

        let mut child = command.spawn()?;
        let exec_start = epoch_seconds(Utc::now());
        let pid = child.id().map(|id| id as i32).unwrap_or(-1);

        let output = Arc::new(OutputBuffer::new());
        let stdout_pump = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(pump(pipe, output.clone())));
        let stderr_pump = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(pump(pipe, output.clone())));

        // Reaper: waits for the child, lets the pumps drain the pipes, then
        // delivers the wait status on a one-slot channel.
        let (status_tx, mut status_rx) = oneshot::channel();
        tokio::spawn(async move {
            let status = child.wait().await;
            if let Some(pump) = stdout_pump {
                let _ = pump.await;
            }
            if let Some(pump) = stderr_pump {
                let _ = pump.await;
            }
            let _ = status_tx.send(status);
        });

        let timer = tokio::time::sleep(request.timeout);
        tokio::pin!(timer);
        let mut timer_armed = true;

        let wait_result = loop {
            tokio::select! {
                result = &mut status_rx => break result,
                _ = &mut timer, if timer_armed => {
                    output.append(b"<Timeout exceeded.>");
                    kill_process_group(pid);
                    // Once fired the deadline is disarmed; only the reaper
                    // and drain branches stay live.
                    timer_armed = false;
                }
                _ = drain.cancelled() => {
                    kill_process_group(pid);
                    let _ = (&mut status_rx).await;
                    return Ok(ExecStatus::Drained);
                }
            }
        };
        let exec_end = epoch_seconds(Utc::now());

        let termination = match wait_result {
            Ok(Ok(status)) => Termination::classify(status),
            Ok(Err(e)) => Termination::Other(e.to_string()),
            Err(_) => Termination::Other("reaper exited without a status".to_string()),
        };

        if let Some(annotation) = termination.annotation() {
            output.append(annotation.as_bytes());
        }

        tracing::debug!(pid, code = termination.exit_code(), "child terminated");

        Ok(ExecStatus::Completed(ExecutionReport {
            pid: if termination.child_ran() { pid } else { -1 },
            code: termination.exit_code(),
            output: output.take(),
            exec_start,
            exec_end,
        }))
    }
}

/// Copy child pipe bytes into the shared buffer until EOF.
async fn pump<R>(mut reader: R, buffer: Arc<OutputBuffer>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.append(&chunk[..n]),
        }
    }
}

/// SIGKILL the whole process group so grandchildren die with the child.
fn kill_process_group(pid: i32) {
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) => tracing::debug!(pid, "sent SIGKILL to process group"),
        Err(e) => tracing::warn!(pid, error = %e, "failed to kill process group"),
    }
}

/// Seconds since the epoch as a float with sub-second precision.
pub fn epoch_seconds(t: DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9
}
