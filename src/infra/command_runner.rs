//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` spawns children with `kill_on_drop`, drains stdout
//! and stderr concurrently, and kills the child when a timeout fires.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;

use crate::application::ports::CommandRunner;

/// Default bound for transport commands (`adb`, `rcmd`).
pub const DEFAULT_TRANSPORT_TIMEOUT: Duration = Duration::from_secs(300);

/// Production `CommandRunner`.
///
/// `tokio::time::timeout` around `.output().await` drops the future but
/// leaves the OS process running on Windows, so the timeout path selects
/// against the wait and calls `child.kill()` explicitly.
pub struct TokioCommandRunner {
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    /// `None` waits for the child indefinitely.
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Runner without a timeout, for the calibration tools.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { timeout: None }
    }

    fn spawn(program: &str, args: &[&str]) -> Result<Child> {
        tracing::debug!(program, ?args, "spawning");
        tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))
    }
}

async fn drain<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}

async fn collect(mut child: Child, program: &str) -> Result<Output> {
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let (status, stdout, stderr) =
        tokio::join!(child.wait(), drain(stdout_handle), drain(stderr_handle));
    Ok(Output {
        status: status.with_context(|| format!("waiting for {program}"))?,
        stdout,
        stderr,
    })
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        match self.timeout {
            Some(timeout) => self.run_with_timeout(program, args, timeout).await,
            None => collect(Self::spawn(program, args)?, program).await,
        }
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        let mut child = Self::spawn(program, args)?;
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) =
                    tokio::join!(child.wait(), drain(stdout_handle), drain(stderr_handle));
                Ok(Output {
                    status: status.with_context(|| format!("waiting for {program}"))?,
                    stdout,
                    stderr,
                })
            } => result,
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }
}
