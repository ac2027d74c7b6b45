//! Loads the calibration parameter file from disk.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::config::CalibrationConfig;

/// Read and validate the parameter file. The file is accepted whole or not
/// at all.
///
/// # Errors
///
/// Returns an I/O error or the first [`crate::domain::error::ConfigError`].
pub async fn load_config(path: &Path) -> Result<CalibrationConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read configuration file {}", path.display()))?;
    let config = CalibrationConfig::parse(&content)?;
    tracing::debug!(path = %path.display(), entries = config.len(), "configuration loaded");
    Ok(config)
}
