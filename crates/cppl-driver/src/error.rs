//! Error types for the build coordinator.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Source or record I/O failure outside a child process.
    #[error(transparent)]
    Core(#[from] cppl_core::CoreError),

    /// Import cycle or unknown import target.
    #[error(transparent)]
    Graph(#[from] cppl_graph::GraphError),

    /// The worker pool could not be brought up.
    #[error(transparent)]
    Tasks(#[from] cppl_tasks::TasksError),

    /// Two units (across project and library roots) derived the same
    /// identifier.
    #[error("duplicate unit id '{unit}' ({} and {})", .first.display(), .second.display())]
    DuplicateUnit {
        unit: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A parsed-imports record expected after the parse phase is missing.
    #[error("missing parsed imports record {}", .path.display())]
    MissingLdeps { path: PathBuf },

    /// The front-end exited zero but did not leave the promised meta file.
    #[error("front-end produced no meta record at {}", .path.display())]
    MissingMeta { path: PathBuf },

    /// A fragment list violates its ordering/bounds invariant.
    #[error("malformed fragment list for {}: {reason}", .path.display())]
    MalformedFragments { path: PathBuf, reason: String },

    /// One or more build phases failed; details were logged as they
    /// happened and the first failure message is carried here.
    #[error("build failed: {0}")]
    BuildFailed(String),
}

pub type Result<T, E = DriverError> = std::result::Result<T, E>;
