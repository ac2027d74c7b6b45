//! Capture session cleanup against an in-memory device and against the
//! real transports driven by a scripted runner.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use factory_calibrate::application::ports::CaptureRequest;
use factory_calibrate::application::services::capture::CaptureController;
use factory_calibrate::domain::error::TransportError;
use factory_calibrate::domain::plan::Camera;
use factory_calibrate::infra::executor::{Executor, TransportPrograms};
use factory_calibrate::infra::transport::{
    DeviceProfile, LocalTransport, RemoteCommandTransport, WINDOWS_OVERRIDES_PATH,
};

use crate::mocks::{FAKE_OVERRIDES, FakeDevice, RecordingLog, ScriptedRunner, argv};

fn request<'a>(
    overrides: Option<&'a Path>,
    raw: Option<&'a Path>,
    jpeg: Option<&'a Path>,
) -> CaptureRequest<'a> {
    CaptureRequest {
        camera: Camera::Rear,
        preview: (1920, 1080),
        focus_pos: None,
        overrides,
        raw,
        jpeg,
        image_name: "white",
    }
}

fn overrides_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("factory_overrides.isp");
    std::fs::write(&path, "ae.MeanAlg.SmartTarget=TRUE;\n").expect("write overrides");
    path
}

#[tokio::test]
async fn test_failed_capture_restores_previous_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let local = overrides_file(dir.path());
    let device = FakeDevice::new()
        .with_file(FAKE_OVERRIDES, "old")
        .failing_capture();
    let log = RecordingLog::default();

    let err = CaptureController::new(&device, &log)
        .capture(&request(Some(&local), None, None))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<TransportError>(),
        Some(TransportError::CommandFailed { .. })
    ));
    let delete = format!("delete {FAKE_OVERRIDES}");
    assert_eq!(device.count(|op| op == delete), 1);
    let restore_suffix = format!(" {FAKE_OVERRIDES}");
    assert_eq!(
        device.count(|op| op.starts_with("move ") && op.ends_with(&restore_suffix)),
        1
    );
    assert_eq!(device.file(FAKE_OVERRIDES).as_deref(), Some("old"));
    assert_eq!(device.paths(), vec![FAKE_OVERRIDES.to_string()]);
}

#[tokio::test]
async fn test_overrides_present_only_during_capture() {
    let dir = tempfile::tempdir().expect("tempdir");
    let local = overrides_file(dir.path());
    let raw = dir.path().join("white.nvraw");
    let device = FakeDevice::new();
    let log = RecordingLog::default();

    CaptureController::new(&device, &log)
        .capture(&request(Some(&local), Some(&raw), None))
        .await
        .expect("capture");

    assert_eq!(
        device.seen_overrides().as_deref(),
        Some("ae.MeanAlg.SmartTarget=TRUE;\n")
    );
    assert!(device.paths().is_empty(), "left on device: {:?}", device.paths());
    assert_eq!(std::fs::read_to_string(&raw).expect("raw pulled"), "image");
}

#[tokio::test]
async fn test_unrequested_jpeg_deleted_and_raw_removed_at_release() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = dir.path().join("white.nvraw");
    let device = FakeDevice::new();
    let log = RecordingLog::default();

    CaptureController::new(&device, &log)
        .capture(&request(None, Some(&raw), None))
        .await
        .expect("capture");

    let ops = device.ops();
    let pull = ops.iter().position(|op| op == "pull /device/white.nvraw");
    let delete = ops.iter().position(|op| op == "delete /device/white.jpg");
    let remove = ops.iter().position(|op| op == "remove /device/white.nvraw");
    assert!(pull.is_some() && delete.is_some() && remove.is_some(), "{ops:?}");
    assert!(pull < remove);
    assert_eq!(device.count(|op| op.starts_with("move ")), 0);
}

#[tokio::test]
async fn test_pulled_jpeg_stays_on_device() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jpeg = dir.path().join("factory_check.jpg");
    let device = FakeDevice::new();
    let log = RecordingLog::default();

    CaptureController::new(&device, &log)
        .capture(&request(None, None, Some(&jpeg)))
        .await
        .expect("capture");

    assert!(jpeg.exists());
    assert_eq!(device.file("/device/white.jpg").as_deref(), Some("image"));
    assert_eq!(device.count(|op| op.starts_with("delete ")), 0);
}

#[tokio::test]
async fn test_failed_capture_removes_partial_outputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = dir.path().join("white.nvraw");
    let device = FakeDevice::new().failing_capture();
    let log = RecordingLog::default();

    CaptureController::new(&device, &log)
        .capture(&request(None, Some(&raw), None))
        .await
        .unwrap_err();

    assert_eq!(device.count(|op| op == "remove /device/white.nvraw"), 1);
    assert_eq!(device.count(|op| op == "remove /device/white.jpg"), 1);
    assert!(!raw.exists());
}

// ── Real transports ──────────────────────────────────────────────────────────

/// A local transport rooted in `dir`, with a capture script present.
fn local_transport<'a>(
    exec: &'a Executor<'a, ScriptedRunner>,
    dir: &Path,
) -> LocalTransport<'a, ScriptedRunner> {
    std::fs::write(dir.join("captureraw.py"), "").expect("write script");
    let profile = DeviceProfile {
        overrides_path: Some(dir.join("camera_overrides.isp").to_string_lossy().into_owned()),
        script_dir: dir.to_path_buf(),
        ..DeviceProfile::default()
    };
    LocalTransport::new(exec, profile).with_dirs(dir, &dir.join("nvcam"))
}

#[tokio::test]
async fn test_local_raw_captured_into_destination_is_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = dir.path().join("white.nvraw");
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new().writing_images();
    let exec = Executor::new(runner.clone(), &log, TransportPrograms::default());
    let local = local_transport(&exec, dir.path());

    CaptureController::new(&local, &log)
        .capture(&request(None, Some(&raw), None))
        .await
        .expect("capture");

    assert_eq!(std::fs::read_to_string(&raw).expect("raw kept"), "image");
    assert!(!dir.path().join("white.jpg").exists());
}

#[tokio::test]
async fn test_local_raw_copied_elsewhere_leaves_no_scratch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let raw = dir.path().join("out").join("white.nvraw");
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new().writing_images();
    let exec = Executor::new(runner.clone(), &log, TransportPrograms::default());
    let local = local_transport(&exec, dir.path());

    CaptureController::new(&local, &log)
        .capture(&request(None, Some(&raw), None))
        .await
        .expect("capture");

    assert_eq!(std::fs::read_to_string(&raw).expect("raw copied"), "image");
    assert!(!dir.path().join("white.nvraw").exists());
    assert!(!dir.path().join("white.jpg").exists());
}

#[tokio::test]
async fn test_local_jpeg_in_place_keeps_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let jpeg = dir.path().join("white.jpg");
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new().writing_images();
    let exec = Executor::new(runner.clone(), &log, TransportPrograms::default());
    let local = local_transport(&exec, dir.path());

    CaptureController::new(&local, &log)
        .capture(&request(None, None, Some(&jpeg)))
        .await
        .expect("capture");

    assert_eq!(std::fs::read_to_string(&jpeg).expect("jpeg kept"), "image");
}

#[tokio::test]
async fn test_local_overrides_restored_after_capture() {
    let dir = tempfile::tempdir().expect("tempdir");
    let overrides = overrides_file(dir.path());
    let device_overrides = dir.path().join("camera_overrides.isp");
    std::fs::write(&device_overrides, "old").expect("write device overrides");
    let raw = dir.path().join("white.nvraw");
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new().writing_images();
    let exec = Executor::new(runner.clone(), &log, TransportPrograms::default());
    let local = local_transport(&exec, dir.path());

    CaptureController::new(&local, &log)
        .capture(&request(Some(&overrides), Some(&raw), None))
        .await
        .expect("capture");

    assert_eq!(std::fs::read_to_string(&device_overrides).expect("restored"), "old");
    assert!(raw.exists());
}

#[tokio::test]
async fn test_remote_capture_quotes_overrides_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let overrides = overrides_file(dir.path());
    let raw = dir.path().join("white.nvraw");
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new();
    let exec = Executor::new(runner.clone(), &log, TransportPrograms::default());
    let remote = RemoteCommandTransport::new(
        &exec,
        "rcmd",
        "10.0.0.7",
        DeviceProfile {
            camera_tool: Some(r"C:\nvcam\nvcs.exe".into()),
            ..DeviceProfile::default()
        },
    );

    CaptureController::new(&remote, &log)
        .capture(&request(Some(&overrides), Some(&raw), None))
        .await
        .expect("capture");

    let calls = runner.calls();
    let quoted = format!("\"{WINDOWS_OVERRIDES_PATH}\"");
    let exec_of = |call: &Vec<String>| call.get(4).cloned().unwrap_or_default();

    let backup = exec_of(&calls[0]);
    assert!(
        backup.starts_with(&format!("cmd /C if exist {quoted} move /Y {quoted} \"{WINDOWS_OVERRIDES_PATH}.")),
        "{backup}"
    );
    assert_eq!(calls[1][3..5], argv(&["-push", overrides.to_str().expect("utf-8 path")]));
    assert_eq!(calls[1][5], WINDOWS_OVERRIDES_PATH);

    let capture = calls
        .iter()
        .find(|c| c.iter().any(|a| a == "-stdout"))
        .map(exec_of)
        .expect("capture call");
    assert!(
        capture.starts_with(&format!(r"C:\Windows\Temp\captureraw.bat {quoted} null ")),
        "{capture}"
    );

    let delete = format!("cmd /C del /Q {quoted}");
    assert_eq!(calls.iter().filter(|c| exec_of(*c) == delete).count(), 1);
    let remove_raw = r#"cmd /C if exist "C:\Windows\Temp\white.nvraw" del /Q "C:\Windows\Temp\white.nvraw""#;
    assert_eq!(exec_of(calls.last().expect("calls")), remove_raw);
}
