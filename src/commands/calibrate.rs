//! `calibrate`: generate a lens-shading blob, install it, and verify it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::LogSink;
use crate::application::services::calibration::{
    CalibrationOptions, Toolchain, run_calibration,
};
use crate::domain::config::{CalibrationConfig, KEY_TRANSPORT_TIMEOUT};
use crate::domain::plan::{CalibrationPlan, Camera, PlanOptions, RunFlags, Verdict};
use crate::domain::transport::{RemoteAddress, Transport, TransportChoice, select_transport};
use crate::infra::command_runner::{DEFAULT_TRANSPORT_TIMEOUT, TokioCommandRunner};
use crate::infra::config::load_config;
use crate::infra::executor::{Executor, TransportPrograms};
use crate::infra::fs::LocalFs;
use crate::infra::transport::{DeviceLink, DeviceProfile};
use crate::output::RunLog;

const ADDRESS_PROMPT: &str = "Enter Windows RT Tegra device (target) IP address";

/// Arguments for a calibration run.
#[derive(Args, Debug, Clone, Default)]
pub struct CalibrateArgs {
    /// Input raw image (.nvraw, or headerless .raw with --raw-text)
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Layout description for a headerless raw input
    #[arg(short = 't', long = "raw-text", value_name = "FILE")]
    pub raw_text: Option<PathBuf>,

    /// Calibration parameter file
    #[arg(short = 'p', long = "params", value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Output blob [default: <input dir>/<input name>.bin]
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Windows RT device address; 0.0.0.0 prompts for it
    #[arg(short = 'r', long = "remote", value_name = "ADDR", conflicts_with = "local")]
    pub remote: Option<String>,

    /// Capture on the device first: 0 rear, 1 front
    #[arg(short = 'c', long = "camera", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub camera: Option<u8>,

    /// Pass extended test output to the surface generator
    #[arg(short = 'x', long = "xtest")]
    pub xtest: bool,

    /// Do not display the verification capture on the device
    #[arg(short = 'w', long = "nopreview")]
    pub nopreview: bool,

    /// Autofocus calibration file folded into the blob
    #[arg(short = 'a', long = "autofocus", value_name = "FILE")]
    pub autofocus: Option<PathBuf>,

    /// Run on the device itself
    #[arg(long)]
    pub local: bool,

    /// USB bridge executable
    #[arg(long, env = "CALIBRATE_ADB", default_value = "adb", value_name = "EXE")]
    pub adb: String,

    /// Remote command executable
    #[arg(long, env = "CALIBRATE_RCMD", default_value = "rcmd", value_name = "EXE")]
    pub rcmd: String,

    /// Directory holding lsc, applylsc and the capture scripts
    /// [default: directory of this executable]
    #[arg(long, env = "CALIBRATE_BIN_DIR", value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Enable factory diagnostics options
    #[arg(long, hide = true)]
    pub nv: bool,

    /// Keep intermediate files and echo every command
    #[arg(short = 'd', long, hide = true, requires = "nv")]
    pub debug: bool,

    /// Log step timings
    #[arg(long, hide = true, requires = "nv")]
    pub time: bool,

    /// Generate statistics only; nothing is installed on the device
    #[arg(long, hide = true, requires = "nv")]
    pub test: bool,
}

impl CalibrateArgs {
    fn camera(&self) -> Option<Camera> {
        self.camera.and_then(Camera::from_index)
    }

    fn plan(&self) -> Result<CalibrationPlan> {
        let opts = PlanOptions {
            camera: self.camera(),
            input: self.input.as_deref(),
            raw_text: self.raw_text.as_deref(),
            params: self.params.as_deref(),
            output: self.output.as_deref(),
            local: self.local,
            test_mode: self.test,
        };
        Ok(CalibrationPlan::derive(&opts)?)
    }

    fn flags(&self) -> RunFlags {
        RunFlags {
            debug: self.debug,
            log_time: self.time,
            test_mode: self.test,
            xtest: self.xtest,
            preview: !self.nopreview,
            af_file: self.autofocus.clone(),
        }
    }

    fn programs(&self) -> TransportPrograms {
        TransportPrograms {
            usb_bridge: self.adb.clone(),
            remote_command: self.rcmd.clone(),
        }
    }
}

/// Run a calibration and report the outcome.
///
/// Usage errors are returned before the log is opened. Every later failure
/// is written to the log and reported through the exit code.
///
/// # Errors
///
/// Returns a usage error, or an error if the log cannot be created or renamed.
pub async fn run(app: &AppContext, args: &CalibrateArgs) -> Result<ExitCode> {
    let plan = args.plan()?;
    let log = RunLog::open(plan.log.clone(), app.output.clone())?;

    let verdict = match execute(app, args, &plan, &log).await {
        Ok(()) => Verdict::Success,
        Err(e) => {
            tracing::debug!(error = ?e, "calibration failed");
            log.error(&format!("{e:#}"));
            Verdict::Failure(e.to_string())
        }
    };

    let path = log.finish(&verdict)?;
    app.output.note(&format!("Log written to {}", path.display()));
    Ok(ExitCode::from(verdict.exit_code()))
}

async fn execute(
    app: &AppContext,
    args: &CalibrateArgs,
    plan: &CalibrationPlan,
    log: &RunLog,
) -> Result<()> {
    let config = load_config(&plan.config_file).await?;
    let transport = resolve_transport(app, args, &config)?;
    tracing::info!(kind = ?transport.kind(), "transport selected");

    let bin_dir = bin_dir(args.bin_dir.as_deref())?;
    let programs = args.programs();
    let devices = Executor::new(
        TokioCommandRunner::new(transport_timeout(&config)),
        log,
        programs.clone(),
    )
    .with_echo(args.debug);
    let tools = Executor::new(TokioCommandRunner::unbounded(), log, programs).with_echo(args.debug);

    let link = DeviceLink::connect(
        &transport,
        &devices,
        DeviceProfile::from_config(&config, &bin_dir),
    );
    let toolchain = Toolchain::in_dir(&bin_dir);
    let flags = args.flags();

    let outcome = run_calibration(
        &link,
        &tools,
        &LocalFs,
        log,
        CalibrationOptions {
            plan,
            config: &config,
            flags: &flags,
            toolchain: &toolchain,
        },
    )
    .await?;
    tracing::info!(
        installed = outcome.installed_to.as_deref().unwrap_or("-"),
        verified = outcome.verified,
        "calibration complete"
    );
    Ok(())
}

fn resolve_transport(
    app: &AppContext,
    args: &CalibrateArgs,
    config: &CalibrationConfig,
) -> Result<Transport> {
    let remote = |address: String| Transport::RemoteCommand {
        executable: args.rcmd.clone(),
        address,
    };
    Ok(match select_transport(args.remote.as_deref(), config, args.local) {
        TransportChoice::Local => Transport::Local,
        TransportChoice::UsbBridge => Transport::UsbBridge {
            executable: args.adb.clone(),
        },
        TransportChoice::RemoteCommand(RemoteAddress::Known(address)) => remote(address),
        TransportChoice::RemoteCommand(RemoteAddress::Prompt) => {
            remote(app.prompt_text(ADDRESS_PROMPT)?)
        }
    })
}

/// `tool.transport_timeout` seconds; `0` disables the bound.
fn transport_timeout(config: &CalibrationConfig) -> Option<Duration> {
    match config.int(KEY_TRANSPORT_TIMEOUT) {
        None => Some(DEFAULT_TRANSPORT_TIMEOUT),
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs.unsigned_abs())),
    }
}

fn bin_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    Ok(exe
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf))
}
