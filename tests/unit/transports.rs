//! Command lines each transport sends, checked through a scripted runner.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use factory_calibrate::application::ports::{
    CameraHost, CaptureRequest, FileTransfer, RemoteShell,
};
use factory_calibrate::domain::error::TransportError;
use factory_calibrate::domain::plan::Camera;
use factory_calibrate::domain::transport::{Transport, TransportKind};
use factory_calibrate::infra::executor::{Executor, TransportPrograms};
use factory_calibrate::infra::transport::{
    DeviceLink, DeviceProfile, RemoteCommandTransport, UsbBridgeTransport,
};

use crate::mocks::{RecordingLog, ScriptedRunner, argv, output};

fn executor<'a>(runner: &ScriptedRunner, log: &'a RecordingLog) -> Executor<'a, ScriptedRunner> {
    Executor::new(runner.clone(), log, TransportPrograms::default())
}

// ── USB bridge ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_usb_file_commands() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new();
    let exec = executor(&runner, &log);
    let usb = UsbBridgeTransport::new(&exec, "adb", DeviceProfile::default());

    usb.push_file(Path::new("out/factory.bin"), "/sdcard/factory.bin")
        .await
        .expect("push");
    usb.move_if_exists("/data/camera_overrides.isp", "/data/camera_overrides.isp.17")
        .await
        .expect("move");
    usb.purge_blob_cache().await.expect("purge");

    let calls = runner.calls();
    assert_eq!(
        calls[0],
        argv(&["adb", "push", "out/factory.bin", "/sdcard/factory.bin"])
    );
    assert_eq!(
        calls[1],
        argv(&[
            "adb",
            "shell",
            "if [ -f /data/camera_overrides.isp ]; then mv /data/camera_overrides.isp /data/camera_overrides.isp.17; fi",
        ])
    );
    assert_eq!(
        calls[2],
        argv(&[
            "adb",
            "shell",
            "for i in /sdcard/nvcam/*.bin; do if [ -f $i ]; then rm $i; fi; done",
        ])
    );
}

#[tokio::test]
async fn test_usb_script_installed_once() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new();
    let exec = executor(&runner, &log);
    let profile = DeviceProfile {
        script_dir: "/opt/nv".into(),
        ..DeviceProfile::default()
    };
    let usb = UsbBridgeTransport::new(&exec, "adb", profile);

    usb.install_capture_script().await.expect("install");
    usb.install_capture_script().await.expect("install again");

    assert_eq!(
        runner.calls(),
        vec![
            argv(&["adb", "remount"]),
            argv(&["adb", "push", "/opt/nv/captureraw.py", "/sdcard/captureraw.py"]),
        ]
    );
}

#[tokio::test]
async fn test_usb_capture_argv() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new();
    let exec = executor(&runner, &log);
    let usb = UsbBridgeTransport::new(&exec, "adb", DeviceProfile::default());

    let inv = usb
        .capture_invocation(&CaptureRequest {
            camera: Camera::Front,
            preview: (1920, 1080),
            focus_pos: Some(300),
            overrides: None,
            raw: Some(Path::new("white_front.nvraw")),
            jpeg: None,
            image_name: "white_front",
        })
        .expect("invocation");

    assert_eq!(
        inv.argv,
        argv(&[
            "python",
            "/sdcard/captureraw.py",
            "1",
            "1920",
            "1080",
            "--focuspos=300",
            "/sdcard/white_front.jpg",
            "/sdcard/white_front.nvraw",
        ])
    );
    assert_eq!(inv.device_raw.as_deref(), Some("/sdcard/white_front.nvraw"));
}

#[tokio::test]
async fn test_usb_failure_surfaces_from_transfer() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new().reply(output(1, "", "error: device not found\n"));
    let exec = executor(&runner, &log);
    let usb = UsbBridgeTransport::new(&exec, "adb", DeviceProfile::default());

    let err = usb
        .pull_file("/sdcard/white.nvraw", Path::new("white.nvraw"))
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<TransportError>(),
        Some(&TransportError::DeviceNotFound)
    );
}

// ── Remote command ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remote_script_failure_read_from_stderr_capture() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new()
        .writing_stderr_file("The system cannot find the path specified.\r\n");
    let exec = executor(&runner, &log);
    let remote = RemoteCommandTransport::new(&exec, "rcmd", "10.0.0.7", DeviceProfile::default());

    let err = remote
        .remote_execute(&argv(&[r"C:\Windows\Temp\captureraw.bat", "raw"]))
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<TransportError>(),
        Some(&TransportError::RemoteScriptFailed)
    );
    let call = &runner.calls()[0];
    assert_eq!(
        call[..5],
        argv(&["rcmd", "-t", "10.0.0.7", "-exec", r"C:\Windows\Temp\captureraw.bat raw"])
    );
    assert_eq!(call[5], "-stdout");
    assert_eq!(call[7], "-stderr");
    assert!(log.contains("The system cannot find the path specified."));
}

#[tokio::test]
async fn test_remote_clean_script_run() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new().writing_stderr_file("");
    let exec = executor(&runner, &log);
    let remote = RemoteCommandTransport::new(&exec, "rcmd", "10.0.0.7", DeviceProfile::default());

    remote
        .remote_execute(&argv(&["captureraw.bat"]))
        .await
        .expect("clean run");
}

#[tokio::test]
async fn test_remote_file_commands() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new();
    let exec = executor(&runner, &log);
    let remote = RemoteCommandTransport::new(&exec, "rcmd", "10.0.0.7", DeviceProfile::default());

    remote
        .pull_file(r"C:\Windows\Temp\white.nvraw", Path::new("white.nvraw"))
        .await
        .expect("pull");
    remote
        .remove_if_exists(r"C:\Windows\Temp\white.jpg")
        .await
        .expect("remove");

    let calls = runner.calls();
    assert_eq!(
        calls[0],
        argv(&[
            "rcmd",
            "-t",
            "10.0.0.7",
            "-pull",
            r"C:\Windows\Temp\white.nvraw",
            "white.nvraw",
            "-noprogress",
        ])
    );
    assert_eq!(
        calls[1],
        argv(&[
            "rcmd",
            "-t",
            "10.0.0.7",
            "-exec",
            r#"cmd /C if exist "C:\Windows\Temp\white.jpg" del /Q "C:\Windows\Temp\white.jpg""#,
        ])
    );
    assert!(log.lines().is_empty());
}

// ── Device link ──────────────────────────────────────────────────────────────

#[test]
fn test_link_follows_selected_transport() {
    let log = RecordingLog::default();
    let runner = ScriptedRunner::new();
    let exec = executor(&runner, &log);

    let usb = DeviceLink::connect(
        &Transport::UsbBridge {
            executable: "adb".into(),
        },
        &exec,
        DeviceProfile::default(),
    );
    assert_eq!(usb.kind(), TransportKind::UsbBridge);
    assert_eq!(usb.overrides_path(), "/data/camera_overrides.isp");

    let remote = DeviceLink::connect(
        &Transport::RemoteCommand {
            executable: "rcmd".into(),
            address: "10.0.0.7".into(),
        },
        &exec,
        DeviceProfile {
            overrides_path: Some(r"D:\camera_overrides.isp".into()),
            ..DeviceProfile::default()
        },
    );
    assert_eq!(remote.kind(), TransportKind::RemoteCommand);
    assert_eq!(remote.overrides_path(), r"D:\camera_overrides.isp");
    assert_eq!(remote.settle_delay(), Some(std::time::Duration::from_secs(2)));
}
