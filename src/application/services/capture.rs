//! Image capture on the device.
//!
//! A capture walks `Idle → OverridesInstalled → Captured → FilesRetrieved →
//! Idle`. The override file and every device scratch file belong to a
//! [`CaptureSession`]; the session is released exactly once on every exit
//! path, restoring whatever override file was on the device before.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::application::ports::{CaptureRequest, DeviceTransport, LogSink};

/// Device-side state owned by one capture.
#[derive(Debug, Default)]
#[must_use = "a capture session must be released"]
pub struct CaptureSession {
    override_installed: bool,
    saved_override: Option<String>,
    device_temp_paths: BTreeSet<String>,
    released: bool,
}

impl CaptureSession {
    fn track(&mut self, path: Option<&String>) {
        if let Some(p) = path {
            self.device_temp_paths.insert(p.clone());
        }
    }

    fn untrack(&mut self, path: &str) {
        self.device_temp_paths.remove(path);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !self.released && (self.override_installed || !self.device_temp_paths.is_empty()) {
            tracing::warn!(
                override_installed = self.override_installed,
                pending = self.device_temp_paths.len(),
                "capture session dropped without release"
            );
        }
    }
}

/// `true` when a device path is the host file itself, as on the local
/// transport where the device filesystem is the host's.
fn names_same_file(device: &str, local: &Path) -> bool {
    let device = Path::new(device);
    match (std::path::absolute(device), std::path::absolute(local)) {
        (Ok(device), Ok(local)) => device == local,
        _ => device == local,
    }
}

/// Runs captures over any [`DeviceTransport`].
pub struct CaptureController<'a, T: DeviceTransport> {
    transport: &'a T,
    log: &'a dyn LogSink,
}

impl<'a, T: DeviceTransport> CaptureController<'a, T> {
    pub fn new(transport: &'a T, log: &'a dyn LogSink) -> Self {
        Self { transport, log }
    }

    /// Capture on the device and retrieve the requested files.
    ///
    /// Cleanup always runs. When both the capture and the cleanup fail, the
    /// capture error is returned and the cleanup error is logged.
    ///
    /// # Errors
    ///
    /// Returns the first transport failure of the capture, or the cleanup
    /// failure if the capture itself succeeded.
    pub async fn capture(&self, request: &CaptureRequest<'_>) -> Result<()> {
        let mut session = CaptureSession::default();
        let outcome = self.run_session(&mut session, request).await;
        let cleanup = self.release(&mut session).await;
        match (outcome, cleanup) {
            (Ok(()), cleanup) => cleanup,
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                self.log
                    .warn(&format!("capture cleanup incomplete: {cleanup_err:#}"));
                Err(e)
            }
        }
    }

    async fn run_session(
        &self,
        session: &mut CaptureSession,
        request: &CaptureRequest<'_>,
    ) -> Result<()> {
        if let Some(local) = request.overrides {
            self.install_overrides(session, local).await?;
        }

        self.transport
            .install_capture_script()
            .await
            .context("installing capture script")?;
        let invocation = self.transport.capture_invocation(request)?;
        let result = self.transport.remote_execute(&invocation.argv).await;
        // The script may have written files even when it reported failure.
        session.track(invocation.device_raw.as_ref());
        session.track(invocation.device_jpeg.as_ref());
        result.context("capturing image")?;

        if let (Some(device), Some(local)) = (&invocation.device_raw, request.raw) {
            if names_same_file(device, local) {
                // Captured straight into the destination.
                session.untrack(device);
            } else {
                self.transport
                    .pull_file(device, local)
                    .await
                    .context("retrieving raw image")?;
            }
        }
        if let Some(device) = &invocation.device_jpeg {
            match request.jpeg {
                Some(local) if names_same_file(device, local) => session.untrack(device),
                Some(local) => {
                    self.transport
                        .pull_file(device, local)
                        .await
                        .context("retrieving JPEG image")?;
                    // Kept on the device so it can be displayed there.
                    session.untrack(device);
                }
                None => {
                    self.transport.remote_delete(device).await?;
                    session.untrack(device);
                }
            }
        }
        Ok(())
    }

    async fn install_overrides(&self, session: &mut CaptureSession, local: &Path) -> Result<()> {
        let device = self.transport.overrides_path().to_string();
        let backup = format!("{device}.{}", Utc::now().timestamp_millis());
        self.transport
            .move_if_exists(&device, &backup)
            .await
            .context("saving existing overrides file")?;
        session.saved_override = Some(backup);
        self.transport
            .push_file(local, &device)
            .await
            .context("installing overrides file")?;
        session.override_installed = true;
        Ok(())
    }

    /// Undo everything the session put on the device. Runs at most once;
    /// every step is attempted even if an earlier one fails.
    async fn release(&self, session: &mut CaptureSession) -> Result<()> {
        if session.released {
            return Ok(());
        }
        session.released = true;

        let mut first_err: Option<anyhow::Error> = None;
        let device = self.transport.overrides_path().to_string();

        if session.override_installed {
            if let Err(e) = self.transport.remote_delete(&device).await {
                first_err.get_or_insert(e.context("removing overrides file"));
            } else {
                session.override_installed = false;
            }
        }
        if let Some(backup) = session.saved_override.take() {
            if let Err(e) = self.transport.move_if_exists(&backup, &device).await {
                first_err.get_or_insert(e.context("restoring saved overrides file"));
            }
        }
        for path in std::mem::take(&mut session.device_temp_paths) {
            if let Err(e) = self.transport.remove_if_exists(&path).await {
                self.log
                    .warn(&format!("could not remove {path} from device: {e:#}"));
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}
