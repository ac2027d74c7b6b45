//! Local transport: the tool runs on the device itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use super::{ANDROID_OVERRIDES_PATH, DeviceProfile, android_capture_argv, android_gallery_command};
use crate::application::ports::{
    CameraHost, CaptureInvocation, CaptureRequest, CommandRunner, FileTransfer, RemoteShell,
};
use crate::domain::plan::LOCAL_DATA_DIR;
use crate::domain::transport::TransportKind;
use crate::infra::executor::Executor;

/// Camera driver blob cache.
pub const BLOB_CACHE_DIR: &str = "/sdcard/nvcam";

pub struct LocalTransport<'a, R: CommandRunner> {
    exec: &'a Executor<'a, R>,
    overrides_path: String,
    capture_script: PathBuf,
    device_dir: PathBuf,
    cache_dir: PathBuf,
}

impl<'a, R: CommandRunner> LocalTransport<'a, R> {
    #[must_use]
    pub fn new(exec: &'a Executor<'a, R>, profile: DeviceProfile) -> Self {
        Self {
            exec,
            overrides_path: profile.overrides_path_or(ANDROID_OVERRIDES_PATH),
            capture_script: profile.capture_script("captureraw.py"),
            device_dir: PathBuf::from(LOCAL_DATA_DIR),
            cache_dir: PathBuf::from(BLOB_CACHE_DIR),
        }
    }

    /// Relocate the scratch and blob cache directories.
    #[must_use]
    pub fn with_dirs(mut self, device_dir: &Path, cache_dir: &Path) -> Self {
        self.device_dir = device_dir.to_path_buf();
        self.cache_dir = cache_dir.to_path_buf();
        self
    }
}

async fn copy(from: &Path, to: &Path) -> Result<()> {
    // Copying a file onto itself would truncate it.
    if std::path::absolute(from)? == std::path::absolute(to)? {
        return Ok(());
    }
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
    Ok(())
}

async fn remove_quietly(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

impl<R: CommandRunner> FileTransfer for LocalTransport<'_, R> {
    async fn push_file(&self, local: &Path, remote: &str) -> Result<()> {
        copy(local, Path::new(remote)).await
    }

    async fn pull_file(&self, remote: &str, local: &Path) -> Result<()> {
        copy(Path::new(remote), local).await
    }

    async fn remote_delete(&self, remote: &str) -> Result<()> {
        tokio::fs::remove_file(remote)
            .await
            .with_context(|| format!("removing {remote}"))
    }

    async fn remove_if_exists(&self, remote: &str) -> Result<()> {
        remove_quietly(Path::new(remote)).await
    }
}

impl<R: CommandRunner> RemoteShell for LocalTransport<'_, R> {
    async fn remote_execute(&self, argv: &[String]) -> Result<String> {
        self.exec.check(argv, false).await
    }

    async fn move_if_exists(&self, from: &str, to: &str) -> Result<()> {
        if !tokio::fs::try_exists(from).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::rename(from, to)
            .await
            .with_context(|| format!("moving {from} to {to}"))
    }
}

impl<R: CommandRunner> CameraHost for LocalTransport<'_, R> {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    fn device_path(&self, name: &str) -> String {
        self.device_dir.join(name).to_string_lossy().into_owned()
    }

    fn overrides_path(&self) -> &str {
        &self.overrides_path
    }

    async fn install_capture_script(&self) -> Result<()> {
        // Runs in place; only its presence matters.
        if tokio::fs::try_exists(&self.capture_script)
            .await
            .unwrap_or(false)
        {
            Ok(())
        } else {
            anyhow::bail!("capture script {} not found", self.capture_script.display())
        }
    }

    fn capture_invocation(&self, request: &CaptureRequest<'_>) -> Result<CaptureInvocation> {
        let jpeg = self.device_path(&format!("{}.jpg", request.image_name));
        let raw = request
            .raw
            .map(|_| self.device_path(&format!("{}.nvraw", request.image_name)));
        let script = self.capture_script.to_string_lossy();
        Ok(CaptureInvocation {
            argv: android_capture_argv(&script, request, &jpeg, raw.as_deref()),
            device_raw: raw,
            device_jpeg: Some(jpeg),
        })
    }

    async fn display_image(&self, remote: &str) -> Result<()> {
        let abs = std::path::absolute(remote).with_context(|| format!("resolving {remote}"))?;
        let argv = [
            "sh".to_string(),
            "-c".to_string(),
            android_gallery_command(&abs.to_string_lossy()),
        ];
        self.exec.check(&argv, false).await.map(drop)
    }

    async fn purge_blob_cache(&self) -> Result<()> {
        let mut entries = match tokio::fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading {}", self.cache_dir.display()));
            }
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_blob = path.extension().is_some_and(|e| e == "bin");
            if is_blob && entry.file_type().await?.is_file() {
                remove_quietly(&path).await?;
            }
        }
        Ok(())
    }

    fn validate_device_path(&self, _key: &str, _path: &str) -> Result<()> {
        Ok(())
    }

    fn settle_delay(&self) -> Option<Duration> {
        None
    }
}
