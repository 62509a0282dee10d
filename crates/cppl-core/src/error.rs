//! Error types for core primitives.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while reading sources or decoding on-disk records.
///
/// A *missing* record file is deliberately not an error: the codecs report
/// absence through `Ok(None)` so that callers can treat it as "needs a
/// rebuild" rather than a failure. Only unreadable or malformed data ends
/// up here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O failure while reading a source or artifact file.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record file exists but cannot be decoded.
    #[error("corrupt record {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// A record was written by an incompatible tool version.
    #[error(
        "record {} has format version {found}, expected {expected}",
        .path.display()
    )]
    FormatVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// A path that was expected to live under a root does not.
    #[error("path {} is not under root {}", .path.display(), .root.display())]
    NotUnderRoot { path: PathBuf, root: PathBuf },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
