//! Source discovery.
//!
//! Walks a source root for unit files, skipping the build root when it is
//! nested inside the project. Results are sorted so that downstream hashing
//! and scheduling see a deterministic order regardless of directory
//! enumeration order.

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CoreError, Result};
use crate::paths::SOURCE_EXT;

/// Collect all unit sources under `root`, excluding anything under
/// `exclude` (the build root, when it lives inside the project).
pub fn collect_unit_sources(root: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        match exclude {
            Some(excluded) => entry.path() != excluded,
            None => true,
        }
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            CoreError::io(path, e.into())
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|s| s.to_str()) == Some(SOURCE_EXT) {
            sources.push(entry.into_path());
        }
    }

    sources.sort();
    debug!(root = %root.display(), count = sources.len(), "collected unit sources");
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn finds_nested_units_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("pkg/UnitB.cppl"));
        touch(&dir.path().join("pkg/UnitA.cppl"));
        touch(&dir.path().join("main.cppl"));
        touch(&dir.path().join("notes.txt"));

        let sources = collect_unit_sources(dir.path(), None).unwrap();
        let rels: Vec<_> = sources
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rels,
            vec![
                PathBuf::from("main.cppl"),
                PathBuf::from("pkg/UnitA.cppl"),
                PathBuf::from("pkg/UnitB.cppl"),
            ]
        );
    }

    #[test]
    fn build_root_is_excluded() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("main.cppl"));
        touch(&dir.path().join("build/copy.cppl"));

        let sources =
            collect_unit_sources(dir.path(), Some(&dir.path().join("build"))).unwrap();
        assert_eq!(sources, vec![dir.path().join("main.cppl")]);
    }
}
