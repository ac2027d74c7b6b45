//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::plan::Camera;
use crate::domain::transport::TransportKind;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output, using the runner's default
    /// timeout policy.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Log Sink Port ─────────────────────────────────────────────────────────────

/// The run log. Every component that reports progress writes here; there is
/// exactly one per run. Sync trait; writes are sequential.
pub trait LogSink {
    /// Append a plain line.
    fn info(&self, message: &str);
    /// Append a warning line.
    fn warn(&self, message: &str);
    /// Append an error line.
    fn error(&self, message: &str);
}

// ── Tool Runner Port ──────────────────────────────────────────────────────────

/// Runs the external surface-generation and apply tools.
#[allow(async_fn_in_trait)]
pub trait ToolRunner {
    /// Run `argv` to completion. The tool's own exit code decides success.
    async fn run_tool(&self, argv: &[String]) -> Result<()>;
}

// ── Filesystem Ports ──────────────────────────────────────────────────────────

/// Host-side file operations used by the workflow.
pub trait LocalFiles {
    fn exists(&self, path: &Path) -> bool;
    /// Remove a file. A missing file is not an error.
    fn remove_if_exists(&self, path: &Path) -> Result<()>;
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    /// File size in bytes.
    fn size(&self, path: &Path) -> Result<u64>;
}

/// Abstracts file hashing operations.
pub trait FileHasher {
    /// Compute the SHA-256 hash of a file as lowercase hex.
    fn sha256_file(&self, path: &Path) -> Result<String>;
}

// ── Capture Value Types ───────────────────────────────────────────────────────

/// One capture on the device.
#[derive(Debug, Clone)]
pub struct CaptureRequest<'a> {
    pub camera: Camera,
    /// Preview size; `(0, 0)` lets the capture script pick its default.
    pub preview: (u32, u32),
    pub focus_pos: Option<u32>,
    /// Local overrides file to install for the duration of the capture.
    pub overrides: Option<&'a Path>,
    /// Local destination for the raw image; `None` captures JPEG only.
    pub raw: Option<&'a Path>,
    /// Local destination for the JPEG; `None` deletes it on the device.
    pub jpeg: Option<&'a Path>,
    /// File stem for the captured images; transports add `.nvraw` / `.jpg`.
    pub image_name: &'a str,
}

/// The command that performs a capture and the device files it leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureInvocation {
    pub argv: Vec<String>,
    pub device_raw: Option<String>,
    pub device_jpeg: Option<String>,
}

// ── Device Transport Ports ────────────────────────────────────────────────────

/// File movement between host and device.
#[allow(async_fn_in_trait)]
pub trait FileTransfer {
    /// Copy a host file onto the device.
    async fn push_file(&self, local: &Path, remote: &str) -> Result<()>;
    /// Copy a device file onto the host.
    async fn pull_file(&self, remote: &str, local: &Path) -> Result<()>;
    /// Delete a device file. A missing file is an error.
    async fn remote_delete(&self, remote: &str) -> Result<()>;
    /// Delete a device file if present, without logging.
    async fn remove_if_exists(&self, remote: &str) -> Result<()>;
}

/// Command execution on the device.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// Execute `argv` on the device and return its textual output.
    async fn remote_execute(&self, argv: &[String]) -> Result<String>;
    /// Rename `from` to `to` if `from` exists, without logging. A missing
    /// source is not an error.
    async fn move_if_exists(&self, from: &str, to: &str) -> Result<()>;
}

/// Device-specific camera plumbing.
#[allow(async_fn_in_trait)]
pub trait CameraHost {
    /// Transport family.
    fn kind(&self) -> TransportKind;
    /// Device path for a scratch file called `name`.
    fn device_path(&self, name: &str) -> String;
    /// Device path of the camera overrides file.
    fn overrides_path(&self) -> &str;
    /// Make the capture script available on the device. Idempotent.
    async fn install_capture_script(&self) -> Result<()>;
    /// Build the capture command for `request`.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport lacks a setting the capture needs.
    fn capture_invocation(&self, request: &CaptureRequest<'_>) -> Result<CaptureInvocation>;
    /// Show an image on the device display.
    async fn display_image(&self, remote: &str) -> Result<()>;
    /// Delete stale blobs from the camera driver cache.
    async fn purge_blob_cache(&self) -> Result<()>;
    /// Reject blob destinations the device platform cannot use.
    ///
    /// # Errors
    ///
    /// Returns a config error naming `key`.
    fn validate_device_path(&self, key: &str, path: &str) -> Result<()>;
    /// Pause to let freshly installed calibration data take effect.
    fn settle_delay(&self) -> Option<Duration>;
}

/// Everything a capture or install needs from a device.
pub trait DeviceTransport: FileTransfer + RemoteShell + CameraHost {}

/// Blanket implementation: any type implementing all three sub-traits is a `DeviceTransport`.
impl<T> DeviceTransport for T where T: FileTransfer + RemoteShell + CameraHost {}
