//! Argument parsing and logging setup for the `visitgrid` binary.
//!
//! - [`config`] - `clap` arguments and their validated [`config::RunConfig`].
//! - [`telemetry`] - `tracing-subscriber` initialization.

pub mod config;
pub mod telemetry;
