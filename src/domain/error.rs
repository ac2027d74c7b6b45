//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Usage errors ──────────────────────────────────────────────────────────────

/// Bad or missing command-line arguments. Reported with exit code 2 and
/// without a log file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Missing required command line argument --{long} (-{short}).")]
    MissingArgument { long: &'static str, short: char },

    #[error(
        "Raw text file cannot be specified with an nvraw format input file (.nvraw), only a headerless raw file (.raw)."
    )]
    RawTextWithNvraw,

    #[error("Input file name {0} has no file stem.")]
    InvalidInputName(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Malformed or out-of-range configuration entries.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse configuration file parameters (line {line}).")]
    Malformed { line: usize },

    #[error("Invalid {key} parameter in configuration file.")]
    InvalidValue { key: String },

    #[error("Value specified for {key} is too low, value must be between {min} and {max}.")]
    TooLow { key: String, min: String, max: String },

    #[error("Value specified for {key} is too high, value must be between {min} and {max}.")]
    TooHigh { key: String, min: String, max: String },

    #[error("Configuration file parameter {key} is set to an invalid path for {platform}.")]
    InvalidDevicePath { key: String, platform: &'static str },

    #[error("Configuration file parameter {key} is required for {purpose}.")]
    Missing { key: &'static str, purpose: &'static str },
}

// ── Transport errors ──────────────────────────────────────────────────────────

/// Errors classified from transport command output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error(
        "Unable to communicate with device.\nMake sure target device is on and connected via USB to the host system."
    )]
    DeviceNotFound,

    #[error(
        "Unable to communicate with device.\nMake sure target device is on, connected via network to the host system, and is running RCmdListener with the proper privileges and firewall settings."
    )]
    Unreachable,

    #[error(
        "Unable to locate {tool}.\nMake sure {tool} is installed and its location is included in the PATH environment variable."
    )]
    NotInstalled { tool: String },

    #[error("Failure ({code}) executing command: {command}")]
    CommandFailed { code: i32, command: String },

    #[error("Failure (1) executing remote capture script")]
    RemoteScriptFailed,
}

// ── Tool errors ───────────────────────────────────────────────────────────────

/// Non-zero exit from the external surface-generation or apply tool.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Failure ({code}) executing command: {command}")]
    Failed { code: i32, command: String },
}

// ── Workflow errors ───────────────────────────────────────────────────────────

/// Runtime failures that belong to no other category.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Input raw image file {0} not found.")]
    InputNotFound(String),

    #[error("Blob file {0} was not produced by the surface generator.")]
    BlobMissing(String),
}
