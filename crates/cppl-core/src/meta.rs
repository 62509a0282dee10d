//! Artifact `Meta` companion records.
//!
//! Every non-trivial artifact (`.decl-ast`, `.o`, `.ldeps`, the preamble)
//! is written alongside a small `Meta` record holding the MD5 of the source
//! it was produced from, the MD5 of the artifact itself, and the list of
//! source fragments the front-end marked for rewriting when a public header
//! is emitted from the source.
//!
//! A missing `Meta` file is not an error; it simply forces a rebuild.
//! A `Meta` file that exists but does not decode is reported as corrupt and
//! treated as stale by callers.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};
use crate::hash::ContentHash;
use crate::paths::create_dirs_for_file;

const META_MAGIC: [u8; 4] = *b"CPLM";

/// Rewrite directive attached to a source byte range.
///
/// Produced by the front-end during declaration compilation; consumed by
/// the header / declaration-surrogate generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentAction {
    /// Remove the range from all generated output.
    Skip,
    /// Remove the range from headers only; keep it in decl surrogates.
    SkipInHeaderOnly,
    /// Replace the range with a single `;`.
    ReplaceWithSemicolon,
    /// Insert `extern ` at the range start (the range is zero-width).
    PutExtern,
    /// Open the unit's name scope.
    StartUnit,
    /// Open the unit's name scope before its first declaration.
    StartUnitFirstDecl,
    /// Close the unit's name scope.
    EndUnit,
    /// Close the unit's name scope at end of file.
    EndUnitEOF,
}

/// A source byte range plus the action to apply to it.
///
/// Ranges are half-open `[start, end)`, non-overlapping, and sorted by
/// `start` within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub start: u32,
    pub end: u32,
    pub action: FragmentAction,
}

impl Fragment {
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The companion record stored next to each artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// MD5 of the source buffer the artifact was produced from.
    pub source_hash: ContentHash,
    /// MD5 of the artifact buffer itself.
    pub artifact_hash: ContentHash,
    /// Source ranges to rewrite when emitting headers/surrogates.
    pub fragments: Vec<Fragment>,
}

#[derive(Serialize, Deserialize)]
struct MetaFile {
    magic: [u8; 4],
    format_version: u32,
    meta: Meta,
}

impl Meta {
    /// Record format version; bumped whenever the layout changes.
    pub const FORMAT_VERSION: u32 = 2;

    pub fn new(source_hash: ContentHash, artifact_hash: ContentHash) -> Self {
        Self {
            source_hash,
            artifact_hash,
            fragments: Vec::new(),
        }
    }

    /// Load a `Meta` record.
    ///
    /// Returns `Ok(None)` when the file does not exist (forces rebuild),
    /// `Err(CoreError::Corrupt)` or `Err(CoreError::FormatVersion)` when it
    /// exists but cannot be used.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CoreError::io(path, e)),
        };

        let file: MetaFile = bincode::deserialize(&bytes)
            .map_err(|e| CoreError::corrupt(path, e.to_string()))?;

        if file.magic != META_MAGIC {
            return Err(CoreError::corrupt(path, "bad magic"));
        }
        if file.format_version != Self::FORMAT_VERSION {
            return Err(CoreError::FormatVersion {
                path: path.to_path_buf(),
                found: file.format_version,
                expected: Self::FORMAT_VERSION,
            });
        }

        Ok(Some(file.meta))
    }

    /// Write the record atomically (temp file, then rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        create_dirs_for_file(path)?;

        let file = MetaFile {
            magic: META_MAGIC,
            format_version: Self::FORMAT_VERSION,
            meta: self.clone(),
        };
        let bytes = bincode::serialize(&file)
            .map_err(|e| CoreError::corrupt(path, e.to_string()))?;

        let tmp = path.with_extension("meta.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| CoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| CoreError::io(path, e))?;
        Ok(())
    }

    /// Check the fragment list invariant: sorted by start, non-overlapping,
    /// and contained within a source of `source_len` bytes.
    pub fn fragments_well_formed(&self, source_len: usize) -> bool {
        let mut prev_end = 0u32;
        for f in &self.fragments {
            if f.start > f.end || f.start < prev_end || f.end as usize > source_len {
                return false;
            }
            prev_end = f.end;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::md5_of;

    fn sample() -> Meta {
        let mut meta = Meta::new(md5_of(b"source"), md5_of(b"artifact"));
        meta.fragments = vec![
            Fragment {
                start: 0,
                end: 4,
                action: FragmentAction::Skip,
            },
            Fragment {
                start: 10,
                end: 10,
                action: FragmentAction::PutExtern,
            },
        ];
        meta
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.decl-ast.meta");
        let meta = sample();
        meta.save(&path).unwrap();
        assert_eq!(Meta::load(&path).unwrap(), Some(meta));
    }

    #[test]
    fn absent_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Meta::load(&dir.path().join("missing.meta")).unwrap(), None);
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.o.meta");
        std::fs::write(&path, b"CP").unwrap();
        let err = Meta::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::Corrupt { .. }));
    }

    #[test]
    fn wrong_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.o.meta");
        let mut file = MetaFile {
            magic: *b"XXXX",
            format_version: Meta::FORMAT_VERSION,
            meta: sample(),
        };
        file.meta.fragments.clear();
        std::fs::write(&path, bincode::serialize(&file).unwrap()).unwrap();
        let err = Meta::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::Corrupt { .. }));
    }

    #[test]
    fn version_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.o.meta");
        let file = MetaFile {
            magic: META_MAGIC,
            format_version: Meta::FORMAT_VERSION + 1,
            meta: sample(),
        };
        std::fs::write(&path, bincode::serialize(&file).unwrap()).unwrap();
        let err = Meta::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::FormatVersion { found, .. } if found == Meta::FORMAT_VERSION + 1));
    }

    #[test]
    fn fragment_well_formedness() {
        let mut meta = sample();
        assert!(meta.fragments_well_formed(32));
        // End beyond source length.
        assert!(!meta.fragments_well_formed(8));
        // Overlap.
        meta.fragments[1].start = 2;
        meta.fragments[1].end = 6;
        assert!(!meta.fragments_well_formed(32));
    }
}
