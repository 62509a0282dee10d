//! Artifact path derivation.
//!
//! Every unit's artifacts live under the build root at the unit's
//! root-relative path, with the source extension substituted per artifact
//! kind. External (library) units use the same scheme under a libs
//! subdirectory so that two libraries with identically named units cannot
//! collide with project units.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Extension of compilable unit sources.
pub const SOURCE_EXT: &str = "cppl";

/// Subdirectory of the build root holding external-library artifacts.
pub const LIBS_SUBDIR: &str = "libs";

/// File name of the precompiled preamble under the build root.
pub const PREAMBLE_OUT: &str = "preamble.pch";

/// The artifact kinds derivable from a unit's relative path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactExt {
    Object,
    DeclAst,
    DeclAstMeta,
    ObjectMeta,
    Ldeps,
    LdepsMeta,
    Header,
    DeclSurrogate,
}

impl ArtifactExt {
    /// The extension substituted for the source extension.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Object => "o",
            Self::DeclAst => "decl-ast",
            Self::DeclAstMeta => "decl-ast.meta",
            Self::ObjectMeta => "o.meta",
            Self::Ldeps => "ldeps",
            Self::LdepsMeta => "ldeps.meta",
            Self::Header => "h",
            Self::DeclSurrogate => "decl",
        }
    }
}

/// A unit's canonical build-root-relative path template.
///
/// Holds the root-relative source path (`pkg/UnitA.cppl`); artifact paths
/// are derived from it by extension substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    rel: PathBuf,
}

impl UnitPaths {
    /// Build from a root-relative source path.
    pub fn new(rel: impl Into<PathBuf>) -> Self {
        Self { rel: rel.into() }
    }

    /// Build from an absolute source path beneath `root`.
    pub fn from_source(source: &Path, root: &Path) -> Result<Self> {
        let rel = relative_to_root(source, root)?;
        Ok(Self { rel })
    }

    /// The root-relative source path.
    pub fn rel(&self) -> &Path {
        &self.rel
    }

    /// Derive an artifact path under `build_root`.
    pub fn artifact(&self, build_root: &Path, ext: ArtifactExt) -> PathBuf {
        build_root.join(self.rel.with_extension(ext.suffix()))
    }

    /// Derive the relative artifact path alone (used for header include
    /// lines, which are emitted relative to the headers output dir).
    pub fn rel_artifact(&self, ext: ArtifactExt) -> PathBuf {
        self.rel.with_extension(ext.suffix())
    }
}

/// Strip `root` from `path`, failing if `path` is not beneath it.
pub fn relative_to_root(path: &Path, root: &Path) -> Result<PathBuf> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| CoreError::NotUnderRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })
}

/// Create the parent directories of a file about to be written.
pub fn create_dirs_for_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths_substitute_extension() {
        let unit = UnitPaths::new("pkg/UnitA.cppl");
        let build = Path::new("build");
        assert_eq!(
            unit.artifact(build, ArtifactExt::Object),
            Path::new("build/pkg/UnitA.o")
        );
        assert_eq!(
            unit.artifact(build, ArtifactExt::DeclAstMeta),
            Path::new("build/pkg/UnitA.decl-ast.meta")
        );
        assert_eq!(
            unit.artifact(build, ArtifactExt::Ldeps),
            Path::new("build/pkg/UnitA.ldeps")
        );
    }

    #[test]
    fn rel_artifact_keeps_directories() {
        let unit = UnitPaths::new("pkg/sub/UnitB.cppl");
        assert_eq!(
            unit.rel_artifact(ArtifactExt::Header),
            Path::new("pkg/sub/UnitB.h")
        );
    }

    #[test]
    fn from_source_requires_root_prefix() {
        let unit =
            UnitPaths::from_source(Path::new("/proj/pkg/UnitA.cppl"), Path::new("/proj")).unwrap();
        assert_eq!(unit.rel(), Path::new("pkg/UnitA.cppl"));

        let err = UnitPaths::from_source(Path::new("/other/UnitA.cppl"), Path::new("/proj"));
        assert!(matches!(err, Err(CoreError::NotUnderRoot { .. })));
    }
}
