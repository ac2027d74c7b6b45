//! Remote command transport: a Windows RT device reached through `rcmd`.
//!
//! Remote commands run with `-stdout`/`-stderr` redirected into host temp
//! files; the captured stderr is scanned for capture-script failures.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use super::{DeviceProfile, WINDOWS_OVERRIDES_PATH};
use crate::application::ports::{
    CameraHost, CaptureInvocation, CaptureRequest, CommandRunner, FileTransfer, LogSink,
    RemoteShell,
};
use crate::domain::classify::{self, Captured};
use crate::domain::config::KEY_CAMERA_TOOL_PATH;
use crate::domain::error::ConfigError;
use crate::domain::transport::TransportKind;
use crate::infra::executor::Executor;

/// Scratch directory on the device; assumed to exist.
pub const DEVICE_TEMP_DIR: &str = r"C:\Windows\Temp\";

const SETTLE_DELAY: Duration = Duration::from_secs(2);

pub struct RemoteCommandTransport<'a, R: CommandRunner> {
    exec: &'a Executor<'a, R>,
    executable: String,
    address: String,
    overrides_path: String,
    capture_script: PathBuf,
    camera_tool: Option<String>,
    script_installed: Cell<bool>,
}

impl<'a, R: CommandRunner> RemoteCommandTransport<'a, R> {
    #[must_use]
    pub fn new(
        exec: &'a Executor<'a, R>,
        executable: &str,
        address: &str,
        profile: DeviceProfile,
    ) -> Self {
        Self {
            exec,
            executable: executable.to_string(),
            address: address.to_string(),
            overrides_path: profile.overrides_path_or(WINDOWS_OVERRIDES_PATH),
            capture_script: profile.capture_script("captureraw.bat"),
            camera_tool: profile.camera_tool,
            script_installed: Cell::new(false),
        }
    }

    fn device_script(&self) -> String {
        self.device_path("captureraw.bat")
    }

    fn argv<'s>(&self, args: impl IntoIterator<Item = &'s str>) -> Vec<String> {
        [self.executable.clone(), "-t".to_string(), self.address.clone()]
            .into_iter()
            .chain(args.into_iter().map(str::to_string))
            .collect()
    }

    /// `-exec` without redirection, for built-in `cmd` commands.
    async fn exec_cmd(&self, command: &str, silent: bool) -> Result<String> {
        self.exec
            .check(&self.argv(["-exec", command]), silent)
            .await
    }
}

/// Quote a device path for a `cmd` command line.
fn quoted(path: &str) -> String {
    format!("\"{path}\"")
}

/// Join an argv into one `-exec` string, quoting words with spaces.
fn join_command(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| {
            if arg.contains(char::is_whitespace) {
                quoted(arg)
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn read_capture(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).replace('\r', ""))
}

fn log_stream(log: &dyn LogSink, text: &str) {
    if !text.trim().is_empty() {
        log.info(text.trim_end());
    }
}

impl<R: CommandRunner> FileTransfer for RemoteCommandTransport<'_, R> {
    async fn push_file(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_string_lossy();
        self.exec
            .check(&self.argv(["-push", &*local, remote, "-noprogress"]), false)
            .await
            .map(drop)
    }

    async fn pull_file(&self, remote: &str, local: &Path) -> Result<()> {
        let local = local.to_string_lossy();
        self.exec
            .check(&self.argv(["-pull", remote, &*local, "-noprogress"]), false)
            .await
            .map(drop)
    }

    async fn remote_delete(&self, remote: &str) -> Result<()> {
        self.exec_cmd(&format!("cmd /C del /Q {}", quoted(remote)), false)
            .await
            .map(drop)
    }

    async fn remove_if_exists(&self, remote: &str) -> Result<()> {
        let remote = quoted(remote);
        self.exec_cmd(&format!("cmd /C if exist {remote} del /Q {remote}"), true)
            .await
            .map(drop)
    }
}

impl<R: CommandRunner> RemoteShell for RemoteCommandTransport<'_, R> {
    async fn remote_execute(&self, argv: &[String]) -> Result<String> {
        let stdout_file = tempfile::Builder::new()
            .prefix("tempstdout.")
            .suffix(".txt")
            .tempfile()
            .context("creating stdout capture file")?;
        let stderr_file = tempfile::Builder::new()
            .prefix("tempstderr.")
            .suffix(".txt")
            .tempfile()
            .context("creating stderr capture file")?;
        let command = join_command(argv);
        let stdout_path = stdout_file.path().to_string_lossy();
        let stderr_path = stderr_file.path().to_string_lossy();

        self.exec
            .check(
                &self.argv([
                    "-exec",
                    command.as_str(),
                    "-stdout",
                    &*stdout_path,
                    "-stderr",
                    &*stderr_path,
                ]),
                false,
            )
            .await?;

        let stdout = read_capture(stdout_file.path()).await?;
        let stderr = read_capture(stderr_file.path()).await?;
        let log = self.exec.log();
        log_stream(log, &stdout);
        log_stream(log, &stderr);

        classify::remote_script().classify(
            &Captured {
                code: 0,
                stdout: &stdout,
                stderr: &stderr,
            },
            &command,
        )?;
        Ok(stdout)
    }

    async fn move_if_exists(&self, from: &str, to: &str) -> Result<()> {
        let (from, to) = (quoted(from), quoted(to));
        self.exec_cmd(&format!("cmd /C if exist {from} move /Y {from} {to}"), true)
            .await
            .map(drop)
    }
}

impl<R: CommandRunner> CameraHost for RemoteCommandTransport<'_, R> {
    fn kind(&self) -> TransportKind {
        TransportKind::RemoteCommand
    }

    fn device_path(&self, name: &str) -> String {
        format!("{DEVICE_TEMP_DIR}{name}")
    }

    fn overrides_path(&self) -> &str {
        &self.overrides_path
    }

    async fn install_capture_script(&self) -> Result<()> {
        if self.script_installed.get() {
            return Ok(());
        }
        self.push_file(&self.capture_script, &self.device_script())
            .await?;
        self.script_installed.set(true);
        Ok(())
    }

    fn capture_invocation(&self, request: &CaptureRequest<'_>) -> Result<CaptureInvocation> {
        let camera_tool = self.camera_tool.clone().ok_or(ConfigError::Missing {
            key: KEY_CAMERA_TOOL_PATH,
            purpose: "captures on Windows RT",
        })?;
        // One image per capture: raw when requested, JPEG otherwise.
        let (mode, image, device_raw, device_jpeg) = if request.raw.is_some() {
            let path = self.device_path(&format!("{}.nvraw", request.image_name));
            ("raw", path.clone(), Some(path), None)
        } else {
            let path = self.device_path(&format!("{}.jpg", request.image_name));
            ("jpeg", path.clone(), None, Some(path))
        };
        let focus = request
            .focus_pos
            .map_or_else(|| "default".to_string(), |pos| pos.to_string());
        let argv = vec![
            self.device_script(),
            self.overrides_path.clone(),
            "null".to_string(),
            camera_tool,
            mode.to_string(),
            focus,
            request.camera.script_name().to_string(),
            image,
        ];
        Ok(CaptureInvocation {
            argv,
            device_raw,
            device_jpeg,
        })
    }

    async fn display_image(&self, remote: &str) -> Result<()> {
        // `start` takes its first quoted word as the window title.
        self.exec_cmd(&format!("cmd /C start \"\" {}", quoted(remote)), false)
            .await
            .map(drop)
    }

    async fn purge_blob_cache(&self) -> Result<()> {
        // The Windows RT driver reads the blob directly; nothing is cached.
        Ok(())
    }

    fn validate_device_path(&self, key: &str, path: &str) -> Result<()> {
        if path.contains('/') {
            return Err(ConfigError::InvalidDevicePath {
                key: key.to_string(),
                platform: self.kind().platform(),
            }
            .into());
        }
        Ok(())
    }

    fn settle_delay(&self) -> Option<Duration> {
        Some(SETTLE_DELAY)
    }
}
