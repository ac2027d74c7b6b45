//! Device transports implementing the `DeviceTransport` ports.
//!
//! One struct per transport family, plus [`DeviceLink`] which dispatches to
//! the transport chosen for the run.

pub mod local;
pub mod remote_command;
pub mod usb_bridge;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

pub use local::LocalTransport;
pub use remote_command::RemoteCommandTransport;
pub use usb_bridge::UsbBridgeTransport;

use crate::application::ports::{
    CameraHost, CaptureInvocation, CaptureRequest, CommandRunner, FileTransfer, RemoteShell,
};
use crate::domain::config::{
    CalibrationConfig, KEY_CAMERA_TOOL_PATH, KEY_CAPTURE_SCRIPT_PATH, KEY_DEVICE_OVERRIDES_PATH,
};
use crate::domain::transport::{Transport, TransportKind};
use crate::infra::executor::Executor;

/// Overrides file location on Android devices.
pub const ANDROID_OVERRIDES_PATH: &str = "/data/camera_overrides.isp";
/// Overrides file location on Windows RT devices.
pub const WINDOWS_OVERRIDES_PATH: &str =
    r"C:\ProgramData\NVIDIA Corporation\NVCamera\camera_overrides.isp";

/// Shell command that opens a JPEG in the Android gallery.
fn android_gallery_command(uri_path: &str) -> String {
    format!(
        "am start -S -n com.android.gallery3d/com.android.gallery3d.app.Gallery \
         -a android.intent.action.VIEW -d file://{uri_path} -t image/jpeg"
    )
}

/// Capture script arguments shared by the Android transports.
fn android_capture_argv(
    script: &str,
    request: &CaptureRequest<'_>,
    device_jpeg: &str,
    device_raw: Option<&str>,
) -> Vec<String> {
    let (w, h) = request.preview;
    let mut argv = vec![
        "python".to_string(),
        script.to_string(),
        request.camera.index().to_string(),
        w.to_string(),
        h.to_string(),
    ];
    if let Some(pos) = request.focus_pos {
        argv.push(format!("--focuspos={pos}"));
    }
    argv.push(device_jpeg.to_string());
    if let Some(raw) = device_raw {
        argv.push(raw.to_string());
    }
    argv
}

// ── Device profile ────────────────────────────────────────────────────────────

/// Device settings shared by every transport, resolved from config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Replaces the platform default overrides path.
    pub overrides_path: Option<String>,
    /// Host directory holding the capture scripts.
    pub script_dir: PathBuf,
    /// Replaces the capture script found in `script_dir`.
    pub capture_script: Option<PathBuf>,
    /// Camera tool on Windows RT devices.
    pub camera_tool: Option<String>,
}

impl DeviceProfile {
    #[must_use]
    pub fn from_config(config: &CalibrationConfig, script_dir: &Path) -> Self {
        let text = |key| config.text(key).filter(|v| !v.is_empty());
        Self {
            overrides_path: text(KEY_DEVICE_OVERRIDES_PATH).map(str::to_string),
            script_dir: script_dir.to_path_buf(),
            capture_script: text(KEY_CAPTURE_SCRIPT_PATH).map(PathBuf::from),
            camera_tool: text(KEY_CAMERA_TOOL_PATH).map(str::to_string),
        }
    }

    /// Host-side capture script, `default_name` inside `script_dir` unless
    /// overridden.
    #[must_use]
    pub fn capture_script(&self, default_name: &str) -> PathBuf {
        self.capture_script
            .clone()
            .unwrap_or_else(|| self.script_dir.join(default_name))
    }

    fn overrides_path_or(&self, default: &str) -> String {
        self.overrides_path
            .clone()
            .unwrap_or_else(|| default.to_string())
    }
}

// ── Device link ───────────────────────────────────────────────────────────────

/// The transport chosen for one run.
pub enum DeviceLink<'a, R: CommandRunner> {
    Local(LocalTransport<'a, R>),
    UsbBridge(UsbBridgeTransport<'a, R>),
    RemoteCommand(RemoteCommandTransport<'a, R>),
}

impl<'a, R: CommandRunner> DeviceLink<'a, R> {
    #[must_use]
    pub fn connect(transport: &Transport, exec: &'a Executor<'a, R>, profile: DeviceProfile) -> Self {
        match transport {
            Transport::Local => Self::Local(LocalTransport::new(exec, profile)),
            Transport::UsbBridge { executable } => {
                Self::UsbBridge(UsbBridgeTransport::new(exec, executable, profile))
            }
            Transport::RemoteCommand {
                executable,
                address,
            } => Self::RemoteCommand(RemoteCommandTransport::new(
                exec, executable, address, profile,
            )),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $t:ident => $body:expr) => {
        match $self {
            DeviceLink::Local($t) => $body,
            DeviceLink::UsbBridge($t) => $body,
            DeviceLink::RemoteCommand($t) => $body,
        }
    };
}

impl<R: CommandRunner> FileTransfer for DeviceLink<'_, R> {
    async fn push_file(&self, local: &Path, remote: &str) -> Result<()> {
        dispatch!(self, t => t.push_file(local, remote).await)
    }

    async fn pull_file(&self, remote: &str, local: &Path) -> Result<()> {
        dispatch!(self, t => t.pull_file(remote, local).await)
    }

    async fn remote_delete(&self, remote: &str) -> Result<()> {
        dispatch!(self, t => t.remote_delete(remote).await)
    }

    async fn remove_if_exists(&self, remote: &str) -> Result<()> {
        dispatch!(self, t => t.remove_if_exists(remote).await)
    }
}

impl<R: CommandRunner> RemoteShell for DeviceLink<'_, R> {
    async fn remote_execute(&self, argv: &[String]) -> Result<String> {
        dispatch!(self, t => t.remote_execute(argv).await)
    }

    async fn move_if_exists(&self, from: &str, to: &str) -> Result<()> {
        dispatch!(self, t => t.move_if_exists(from, to).await)
    }
}

impl<R: CommandRunner> CameraHost for DeviceLink<'_, R> {
    fn kind(&self) -> TransportKind {
        dispatch!(self, t => t.kind())
    }

    fn device_path(&self, name: &str) -> String {
        dispatch!(self, t => t.device_path(name))
    }

    fn overrides_path(&self) -> &str {
        dispatch!(self, t => t.overrides_path())
    }

    async fn install_capture_script(&self) -> Result<()> {
        dispatch!(self, t => t.install_capture_script().await)
    }

    fn capture_invocation(&self, request: &CaptureRequest<'_>) -> Result<CaptureInvocation> {
        dispatch!(self, t => t.capture_invocation(request))
    }

    async fn display_image(&self, remote: &str) -> Result<()> {
        dispatch!(self, t => t.display_image(remote).await)
    }

    async fn purge_blob_cache(&self) -> Result<()> {
        dispatch!(self, t => t.purge_blob_cache().await)
    }

    fn validate_device_path(&self, key: &str, path: &str) -> Result<()> {
        dispatch!(self, t => t.validate_device_path(key, path))
    }

    fn settle_delay(&self) -> Option<Duration> {
        dispatch!(self, t => t.settle_delay())
    }
}
