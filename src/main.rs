//! calibrate - factory lens-shading calibration driver

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use factory_calibrate::cli::Cli;
use factory_calibrate::domain::error::UsageError;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.run().await {
        Ok(code) => code,
        Err(e) if e.downcast_ref::<UsageError>().is_some() => {
            eprintln!("ERROR: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::FAILURE
        }
    }
}
