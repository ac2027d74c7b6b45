//! Application services: use-case orchestration.
//!
//! Services import only from `crate::domain` and `crate::application::ports`,
//! never from the outer layers.

pub mod calibration;
pub mod capture;
