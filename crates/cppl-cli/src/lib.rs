//! Command-line front door for the cppl build coordinator.
//!
//! Parses arguments, wires up logging, runs the driver, and maps errors to
//! the documented exit codes: 0 on success, 1 for argument errors, 2 for
//! build failures. Warnings never change the exit code.

pub mod cli;
pub mod logger;
pub mod report;
