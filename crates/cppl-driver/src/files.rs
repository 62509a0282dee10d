//! Per-unit file bundles.
//!
//! Derived once during source collection so every later phase can resolve
//! a unit's artifacts without touching path logic again.

use std::path::{Path, PathBuf};

use cppl_core::paths::{ArtifactExt, UnitPaths};
use cppl_core::unit::unit_id_from_rel_path;
use cppl_core::Result;

use crate::config::DriverConfig;

/// Every path associated with one unit.
#[derive(Debug, Clone)]
pub struct FilesInfo {
    /// The unit identifier derived from the relative path.
    pub unit_id: String,
    /// Source file; absolute for external units.
    pub source: PathBuf,
    /// Root-relative path template the artifacts derive from.
    pub rel: UnitPaths,
    /// The source root this unit was collected under (project root or one
    /// of the library roots); passed to the front-end as `-cppl-src-root`.
    pub src_root: PathBuf,
    pub object: PathBuf,
    pub object_meta: PathBuf,
    pub decl_ast: PathBuf,
    pub decl_ast_meta: PathBuf,
    pub ldeps: PathBuf,
    pub ldeps_meta: PathBuf,
    /// Present when header generation is enabled.
    pub header: Option<PathBuf>,
    /// Present when declaration-surrogate generation is enabled.
    pub decl_surrogate: Option<PathBuf>,
    /// External units contribute no definition node and are never linked.
    pub is_external: bool,
}

impl FilesInfo {
    /// Bundle for a project unit whose `source` lives under the project
    /// root.
    pub fn project(config: &DriverConfig, source: &Path) -> Result<Self> {
        let rel = UnitPaths::from_source(source, &config.sources_root)?;
        Ok(Self::for_unit(
            config,
            source.to_path_buf(),
            config.sources_root.clone(),
            rel,
            &config.build_root,
            false,
        ))
    }

    /// Bundle for an external library unit collected under `lib_root`.
    /// Its artifacts live under the libs subdirectory of the build root
    /// and its source path is kept as given (absolute for absolute roots).
    pub fn external(config: &DriverConfig, lib_root: &Path, source: &Path) -> Result<Self> {
        let rel = UnitPaths::from_source(source, lib_root)?;
        Ok(Self::for_unit(
            config,
            source.to_path_buf(),
            lib_root.to_path_buf(),
            rel,
            &config.libs_root(),
            true,
        ))
    }

    fn for_unit(
        config: &DriverConfig,
        source: PathBuf,
        src_root: PathBuf,
        rel: UnitPaths,
        artifact_root: &Path,
        is_external: bool,
    ) -> Self {
        let unit_id = unit_id_from_rel_path(rel.rel());
        Self {
            unit_id,
            source,
            src_root,
            object: rel.artifact(artifact_root, ArtifactExt::Object),
            object_meta: rel.artifact(artifact_root, ArtifactExt::ObjectMeta),
            decl_ast: rel.artifact(artifact_root, ArtifactExt::DeclAst),
            decl_ast_meta: rel.artifact(artifact_root, ArtifactExt::DeclAstMeta),
            ldeps: rel.artifact(artifact_root, ArtifactExt::Ldeps),
            ldeps_meta: rel.artifact(artifact_root, ArtifactExt::LdepsMeta),
            header: config
                .headers_dir
                .as_ref()
                .map(|dir| rel.artifact(dir, ArtifactExt::Header)),
            decl_surrogate: config
                .decls_dir
                .as_ref()
                .map(|dir| rel.artifact(dir, ArtifactExt::DeclSurrogate)),
            rel,
            is_external,
        }
    }
}
