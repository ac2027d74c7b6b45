//! The calibration use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use crate::application::ports::{
    CaptureRequest, DeviceTransport, FileHasher, LocalFiles, LogSink, ToolRunner,
};
use crate::application::services::capture::CaptureController;
use crate::domain::config::{CalibrationConfig, KEY_BLOB_FULL_PATH, render_overrides};
use crate::domain::error::WorkflowError;
use crate::domain::plan::{
    CalibrationPlan, CaptureSettings, RunFlags, SurfaceToolOptions, delta_check_argv,
    surface_tool_argv,
};

/// Locations of the external calibration tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Surface generator (`lsc`).
    pub surface_tool: PathBuf,
    /// Apply / delta-check tool (`applylsc`).
    pub apply_tool: PathBuf,
}

impl Toolchain {
    /// Tools inside `bin_dir`, with the platform executable suffix.
    #[must_use]
    pub fn in_dir(bin_dir: &Path) -> Self {
        let exe = std::env::consts::EXE_SUFFIX;
        Self {
            surface_tool: bin_dir.join(format!("lsc{exe}")),
            apply_tool: bin_dir.join(format!("applylsc{exe}")),
        }
    }
}

pub struct CalibrationOptions<'a> {
    pub plan: &'a CalibrationPlan,
    pub config: &'a CalibrationConfig,
    pub flags: &'a RunFlags,
    pub toolchain: &'a Toolchain,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationOutcome {
    /// Size and SHA-256 of the generated blob, if one was generated.
    pub blob: Option<(u64, String)>,
    /// Device path the blob was installed to.
    pub installed_to: Option<String>,
    pub verified: bool,
}

/// Run one calibration: capture, generate, install and verify.
///
/// Intermediate files are removed on every exit path unless `--debug` is set.
///
/// # Errors
///
/// Returns the first failing step; nothing is retried.
pub async fn run_calibration(
    transport: &impl DeviceTransport,
    tools: &impl ToolRunner,
    files: &(impl LocalFiles + FileHasher),
    log: &dyn LogSink,
    opts: CalibrationOptions<'_>,
) -> Result<CalibrationOutcome> {
    let surface = SurfaceToolOptions::from_config(opts.config);
    let outcome = calibrate(transport, tools, files, log, &opts, &surface).await;

    if !opts.flags.debug {
        let plan = opts.plan;
        let mut leftovers = vec![plan.overrides_file()];
        if surface.generate_blob {
            leftovers.push(plan.calibration());
        }
        for path in leftovers {
            if let Err(e) = files.remove_if_exists(&path) {
                log.warn(&format!("could not remove {}: {e:#}", path.display()));
            }
        }
    }
    outcome
}

async fn calibrate(
    transport: &impl DeviceTransport,
    tools: &impl ToolRunner,
    files: &(impl LocalFiles + FileHasher),
    log: &dyn LogSink,
    opts: &CalibrationOptions<'_>,
    surface: &SurfaceToolOptions,
) -> Result<CalibrationOutcome> {
    let CalibrationOptions {
        plan,
        config,
        flags,
        toolchain,
    } = *opts;
    let capture = CaptureSettings::from_config(config);
    let controller = CaptureController::new(transport, log);
    let started = Instant::now();

    if let Some(camera) = plan.camera {
        log.info(camera.describe());
        let overrides = plan.overrides_file();
        files
            .write(&overrides, &render_overrides(config))
            .with_context(|| format!("writing {}", overrides.display()))?;
        let step = Instant::now();
        controller
            .capture(&CaptureRequest {
                camera,
                preview: capture.preview,
                focus_pos: capture.focus_pos,
                overrides: Some(&overrides),
                raw: Some(&plan.raw_input),
                jpeg: None,
                image_name: &plan.raw_base,
            })
            .await?;
        log_step(log, flags, "capture", step);
    }

    if !files.exists(&plan.raw_input) {
        return Err(WorkflowError::InputNotFound(plan.raw_input.display().to_string()).into());
    }
    files.remove_if_exists(&plan.blob)?;

    let step = Instant::now();
    let argv = surface_tool_argv(&toolchain.surface_tool, plan, surface, flags);
    tools.run_tool(&argv).await?;
    log_step(log, flags, "surface generation", step);

    let mut outcome = CalibrationOutcome {
        blob: None,
        installed_to: None,
        verified: false,
    };

    if surface.generate_blob {
        if !files.exists(&plan.blob) {
            return Err(WorkflowError::BlobMissing(plan.blob.display().to_string()).into());
        }
        let size = files.size(&plan.blob)?;
        let digest = files.sha256_file(&plan.blob)?;
        log.info(&format!(
            "Generated {} ({size} bytes, sha256 {digest})",
            plan.blob.display()
        ));
        outcome.blob = Some((size, digest));
    }

    let on_device = !flags.test_mode && plan.camera.is_some();

    if surface.generate_blob && on_device {
        let step = Instant::now();
        let target = config
            .text(KEY_BLOB_FULL_PATH)
            .map_or_else(|| plan.default_device_blob(), str::to_string);
        transport.validate_device_path(KEY_BLOB_FULL_PATH, &target)?;
        transport
            .push_file(&plan.blob, &target)
            .await
            .context("installing calibration blob")?;
        transport.purge_blob_cache().await?;
        log.info(&format!("Installed calibration blob to {target}"));
        log_step(log, flags, "install", step);
        outcome.installed_to = Some(target);
    }

    if let Some(camera) = plan.camera.filter(|_| on_device && capture.final_capture) {
        let step = Instant::now();
        if let Some(delay) = transport.settle_delay() {
            tokio::time::sleep(delay).await;
        }
        let name = plan.check_stem();
        let local = plan.check_jpeg();
        controller
            .capture(&CaptureRequest {
                camera,
                preview: capture.preview,
                focus_pos: capture.focus_pos,
                overrides: None,
                raw: None,
                jpeg: Some(&local),
                image_name: &name,
            })
            .await?;
        if flags.preview {
            let shown = transport.device_path(&format!("{name}.jpg"));
            transport.display_image(&shown).await?;
        }
        if capture.check_delta_ab {
            let argv = delta_check_argv(&toolchain.apply_tool, &local, &plan.config_file);
            tools.run_tool(&argv).await?;
        }
        log_step(log, flags, "verification", step);
        outcome.verified = true;
    }

    if flags.log_time {
        log.info(&format!(
            ">>>>Total time = {:.3}s",
            started.elapsed().as_secs_f64()
        ));
    }
    Ok(outcome)
}

fn log_step(log: &dyn LogSink, flags: &RunFlags, step: &str, started: Instant) {
    if flags.log_time {
        log.info(&format!(
            ">>>> {step} time = {:.3}s",
            started.elapsed().as_secs_f64()
        ));
    }
}
