//! USB bridge transport: an Android device reached through `adb`.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use super::{ANDROID_OVERRIDES_PATH, DeviceProfile, android_capture_argv, android_gallery_command};
use crate::application::ports::{
    CameraHost, CaptureInvocation, CaptureRequest, CommandRunner, FileTransfer, RemoteShell,
};
use crate::domain::transport::TransportKind;
use crate::infra::executor::Executor;

/// Where the capture script is installed on the device.
pub const DEVICE_CAPTURE_SCRIPT: &str = "/sdcard/captureraw.py";

const PURGE_BLOB_CACHE: &str =
    "for i in /sdcard/nvcam/*.bin; do if [ -f $i ]; then rm $i; fi; done";

pub struct UsbBridgeTransport<'a, R: CommandRunner> {
    exec: &'a Executor<'a, R>,
    executable: String,
    overrides_path: String,
    capture_script: PathBuf,
    script_installed: Cell<bool>,
}

impl<'a, R: CommandRunner> UsbBridgeTransport<'a, R> {
    #[must_use]
    pub fn new(exec: &'a Executor<'a, R>, executable: &str, profile: DeviceProfile) -> Self {
        Self {
            exec,
            executable: executable.to_string(),
            overrides_path: profile.overrides_path_or(ANDROID_OVERRIDES_PATH),
            capture_script: profile.capture_script("captureraw.py"),
            script_installed: Cell::new(false),
        }
    }

    fn argv<'s>(&self, args: impl IntoIterator<Item = &'s str>) -> Vec<String> {
        std::iter::once(self.executable.clone())
            .chain(args.into_iter().map(str::to_string))
            .collect()
    }

    async fn shell(&self, command: &str, silent: bool) -> Result<String> {
        self.exec.check(&self.argv(["shell", command]), silent).await
    }
}

impl<R: CommandRunner> FileTransfer for UsbBridgeTransport<'_, R> {
    async fn push_file(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.to_string_lossy();
        self.exec
            .check(&self.argv(["push", &*local, remote]), false)
            .await
            .map(drop)
    }

    async fn pull_file(&self, remote: &str, local: &Path) -> Result<()> {
        let local = local.to_string_lossy();
        self.exec
            .check(&self.argv(["pull", remote, &*local]), false)
            .await
            .map(drop)
    }

    async fn remote_delete(&self, remote: &str) -> Result<()> {
        self.exec
            .check(&self.argv(["shell", "rm", remote]), false)
            .await
            .map(drop)
    }

    async fn remove_if_exists(&self, remote: &str) -> Result<()> {
        self.shell(&format!("if [ -f {remote} ]; then rm {remote}; fi"), true)
            .await
            .map(drop)
    }
}

impl<R: CommandRunner> RemoteShell for UsbBridgeTransport<'_, R> {
    async fn remote_execute(&self, argv: &[String]) -> Result<String> {
        let full: Vec<String> = self
            .argv(["shell"])
            .into_iter()
            .chain(argv.iter().cloned())
            .collect();
        self.exec.check(&full, false).await
    }

    async fn move_if_exists(&self, from: &str, to: &str) -> Result<()> {
        self.shell(&format!("if [ -f {from} ]; then mv {from} {to}; fi"), true)
            .await
            .map(drop)
    }
}

impl<R: CommandRunner> CameraHost for UsbBridgeTransport<'_, R> {
    fn kind(&self) -> TransportKind {
        TransportKind::UsbBridge
    }

    fn device_path(&self, name: &str) -> String {
        format!("/sdcard/{name}")
    }

    fn overrides_path(&self) -> &str {
        &self.overrides_path
    }

    async fn install_capture_script(&self) -> Result<()> {
        if self.script_installed.get() {
            return Ok(());
        }
        self.exec.check(&self.argv(["remount"]), false).await?;
        self.push_file(&self.capture_script, DEVICE_CAPTURE_SCRIPT)
            .await?;
        self.script_installed.set(true);
        Ok(())
    }

    fn capture_invocation(&self, request: &CaptureRequest<'_>) -> Result<CaptureInvocation> {
        let jpeg = self.device_path(&format!("{}.jpg", request.image_name));
        let raw = request
            .raw
            .map(|_| self.device_path(&format!("{}.nvraw", request.image_name)));
        Ok(CaptureInvocation {
            argv: android_capture_argv(DEVICE_CAPTURE_SCRIPT, request, &jpeg, raw.as_deref()),
            device_raw: raw,
            device_jpeg: Some(jpeg),
        })
    }

    async fn display_image(&self, remote: &str) -> Result<()> {
        self.shell(&android_gallery_command(remote), false)
            .await
            .map(drop)
    }

    async fn purge_blob_cache(&self) -> Result<()> {
        self.shell(PURGE_BLOB_CACHE, false).await.map(drop)
    }

    fn validate_device_path(&self, _key: &str, _path: &str) -> Result<()> {
        Ok(())
    }

    fn settle_delay(&self) -> Option<Duration> {
        None
    }
}
