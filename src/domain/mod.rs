//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, or `std::process`.
//! All functions are synchronous and take data in, returning data out.

pub mod classify;
pub mod config;
pub mod error;
pub mod plan;
pub mod transport;

pub use config::{CalibrationConfig, ConfigEntry, ValueKind, render_overrides};
pub use error::{ConfigError, ToolError, TransportError, UsageError, WorkflowError};
pub use plan::{CalibrationPlan, Camera, RunFlags, Verdict};
pub use transport::{Transport, TransportChoice, TransportKind};
