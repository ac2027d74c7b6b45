//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser};

use crate::app::{AppContext, AppFlags};
use crate::commands;

/// Factory lens-shading calibration for local, USB and network-attached
/// camera devices
#[derive(Parser, Debug)]
#[command(name = "calibrate", version, disable_help_flag = true)]
pub struct Cli {
    /// Print help
    #[arg(short = 'h', long = "help", short_alias = '?', action = ArgAction::Help)]
    pub help: Option<bool>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    #[command(flatten)]
    pub calibrate: commands::calibrate::CalibrateArgs,
}

impl Cli {
    /// Execute the calibration run.
    ///
    /// # Errors
    ///
    /// Returns usage errors and failures that happen before or after the
    /// run log exists.
    pub async fn run(self) -> Result<ExitCode> {
        let app = AppContext::new(&AppFlags {
            no_color: self.no_color,
        });
        commands::calibrate::run(&app, &self.calibrate).await
    }
}
