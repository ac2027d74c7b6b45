//! The calibration workflow against an in-memory device and fake tools.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use factory_calibrate::application::services::calibration::{
    CalibrationOptions, CalibrationOutcome, Toolchain, run_calibration,
};
use factory_calibrate::domain::config::CalibrationConfig;
use factory_calibrate::domain::error::{ToolError, WorkflowError};
use factory_calibrate::domain::plan::{CalibrationPlan, Camera, PlanOptions, RunFlags};
use factory_calibrate::infra::fs::LocalFs;

use crate::mocks::{FakeDevice, FakeTools, RecordingLog};

const BLOB_SHA256: &str = "671a0d168d8e3d31819402ac7c3a3cc0abedebbf6a4cda26deacd89724bd6bdc";

struct Bench {
    dir: tempfile::TempDir,
    plan: CalibrationPlan,
}

impl Bench {
    fn new(camera: Option<Camera>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("white.nvraw");
        let params = dir.path().join("params.cfg");
        let output = dir.path().join("factory.bin");
        std::fs::write(&input, "raw pixels").expect("write input");
        let plan = CalibrationPlan::derive(&PlanOptions {
            camera,
            input: Some(&input),
            params: Some(&params),
            output: Some(&output),
            ..PlanOptions::default()
        })
        .expect("plan");
        Self { dir, plan }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn flags() -> RunFlags {
    RunFlags {
        preview: true,
        ..RunFlags::default()
    }
}

fn toolchain() -> Toolchain {
    Toolchain::in_dir(Path::new("/opt/nv"))
}

async fn run(
    bench: &Bench,
    device: &FakeDevice,
    tools: &FakeTools,
    log: &RecordingLog,
    config: &str,
) -> anyhow::Result<CalibrationOutcome> {
    let config = CalibrationConfig::parse(config).expect("config");
    run_calibration(
        device,
        tools,
        &LocalFs,
        log,
        CalibrationOptions {
            plan: &bench.plan,
            config: &config,
            flags: &flags(),
            toolchain: &toolchain(),
        },
    )
    .await
}

#[tokio::test]
async fn test_capture_generate_install() {
    let bench = Bench::new(Some(Camera::Rear));
    let device = FakeDevice::new();
    let tools = FakeTools::new();
    let log = RecordingLog::default();

    let outcome = run(&bench, &device, &tools, &log, "overrides.ae.MeanAlg.SmartTarget = TRUE;\n")
        .await
        .expect("calibration");

    assert_eq!(outcome.blob, Some((4, BLOB_SHA256.to_string())));
    assert_eq!(outcome.installed_to.as_deref(), Some("/sdcard/factory.bin"));
    assert!(!outcome.verified);
    assert!(device.ops().contains(&"push /sdcard/factory.bin".to_string()));
    assert_eq!(device.count(|op| op == "purge"), 1);
    assert_eq!(
        device.seen_overrides().as_deref(),
        Some("ae.MeanAlg.SmartTarget=TRUE;\n")
    );
    assert!(log.contains("Selected rear camera."));
    assert!(log.contains("Installed calibration blob to /sdcard/factory.bin"));

    // Intermediate files are gone, the blob stays.
    assert!(!bench.path("factory_overrides.isp").exists());
    assert!(!bench.path("factory_lsc.cfg").exists());
    assert!(bench.path("factory.bin").exists());
}

#[tokio::test]
async fn test_blob_run_disabled_skips_install() {
    let bench = Bench::new(Some(Camera::Rear));
    let device = FakeDevice::new();
    let tools = FakeTools::new();
    let log = RecordingLog::default();

    let outcome = run(&bench, &device, &tools, &log, "shared.blob_run = 0;\n")
        .await
        .expect("calibration");

    assert_eq!(outcome.blob, None);
    let calls = tools.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].contains(&"-b".to_string()));
    assert_eq!(device.count(|op| op.starts_with("push /sdcard") || op == "purge"), 0);
    // Without a blob the calibration text is the product.
    assert!(bench.path("factory_lsc.cfg").exists());
}

#[tokio::test]
async fn test_offline_run_never_touches_device() {
    let bench = Bench::new(None);
    let device = FakeDevice::new();
    let tools = FakeTools::new();
    let log = RecordingLog::default();

    let outcome = run(&bench, &device, &tools, &log, "")
        .await
        .expect("calibration");

    assert!(outcome.blob.is_some());
    assert_eq!(outcome.installed_to, None);
    assert!(device.ops().is_empty());
}

#[tokio::test]
async fn test_missing_input_fails_before_tools() {
    let bench = Bench::new(None);
    std::fs::remove_file(&bench.plan.raw_input).expect("remove input");
    let device = FakeDevice::new();
    let tools = FakeTools::new();
    let log = RecordingLog::default();

    let err = run(&bench, &device, &tools, &log, "").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<WorkflowError>(),
        Some(WorkflowError::InputNotFound(_))
    ));
    assert!(tools.calls().is_empty());
}

#[tokio::test]
async fn test_final_capture_displays_and_checks_delta() {
    let bench = Bench::new(Some(Camera::Rear));
    let device = FakeDevice::new();
    let tools = FakeTools::new();
    let log = RecordingLog::default();

    let outcome = run(
        &bench,
        &device,
        &tools,
        &log,
        "tool.final_capture = 1;\ntool.final_capture_check_delta_ab = 1;\n",
    )
    .await
    .expect("calibration");

    assert!(outcome.verified);
    assert!(device.ops().contains(&"display /device/factory_check.jpg".to_string()));
    assert!(bench.path("factory_check.jpg").exists());
    let calls = tools.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].contains(&"--deltaonly".to_string()));

    // The verification capture runs with the device's own overrides.
    let install = device
        .ops()
        .iter()
        .position(|op| op == "push /sdcard/factory.bin")
        .expect("installed");
    let pushes_after: Vec<String> = device.ops()[install + 1..]
        .iter()
        .filter(|op| op.starts_with("push "))
        .cloned()
        .collect();
    assert!(pushes_after.is_empty(), "{pushes_after:?}");
}

#[tokio::test]
async fn test_test_mode_generates_without_installing() {
    let bench = Bench::new(Some(Camera::Rear));
    let device = FakeDevice::new();
    let tools = FakeTools::new();
    let log = RecordingLog::default();
    let config = CalibrationConfig::parse("tool.final_capture = 1;\n").expect("config");

    let outcome = run_calibration(
        &device,
        &tools,
        &LocalFs,
        &log,
        CalibrationOptions {
            plan: &bench.plan,
            config: &config,
            flags: &RunFlags {
                test_mode: true,
                ..flags()
            },
            toolchain: &toolchain(),
        },
    )
    .await
    .expect("calibration");

    assert_eq!(outcome.installed_to, None);
    assert!(!outcome.verified);
    assert!(tools.calls()[0].contains(&"--nv".to_string()));
    assert_eq!(device.count(|op| op == "purge"), 0);
}

#[tokio::test]
async fn test_tool_failure_still_cleans_up() {
    let bench = Bench::new(Some(Camera::Rear));
    let device = FakeDevice::new();
    let tools = FakeTools::failing(3);
    let log = RecordingLog::default();

    let err = run(&bench, &device, &tools, &log, "").await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ToolError>(),
        Some(ToolError::Failed { code: 3, .. })
    ));
    assert_eq!(
        err.to_string(),
        format!(
            "Failure (3) executing command: {}",
            tools.calls()[0].join(" ")
        )
    );
    assert!(!bench.path("factory_overrides.isp").exists());
    assert!(device.paths().is_empty());
}
