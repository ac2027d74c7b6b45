//! Command implementations

pub mod calibrate;
