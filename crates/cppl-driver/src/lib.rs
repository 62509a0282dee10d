//! The cppl build coordinator.
//!
//! Orchestrates a full build of a unit-based project: collects sources,
//! extracts imports through the front-end's parse-only mode, assembles the
//! declaration/definition dependency graph, schedules per-node compiles
//! with bounded parallelism and content-hash incremental checks, and
//! finally links objects or emits library headers and declaration
//! surrogates.
//!
//! The front-end and the linker are opaque child processes; the only
//! contract with them is argv (see [`commands`]) and the artifact/`Meta`
//! files they leave on disk.

pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod exec;
pub mod files;
pub mod headergen;
pub mod incremental;
pub mod status;

pub use commands::CommandInfo;
pub use config::DriverConfig;
pub use driver::{BuildSummary, Driver};
pub use error::{DriverError, Result};
pub use exec::{DryRunExecutor, ExecOutcome, Executor, ProcessExecutor};
