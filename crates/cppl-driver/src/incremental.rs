//! Incremental up-to-date checks.
//!
//! An artifact is current when it exists, its meta decodes, the recorded
//! source hash matches the current source, the preamble was not rebuilt
//! this run, and none of the node's dependencies changed its declaration
//! artifact this run. Anything less forces a rebuild; a corrupt or missing
//! meta is never an error, only staleness.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use cppl_core::{md5_of_file, Meta};
use cppl_graph::NodeId;

/// Shared mutable state of one build run.
#[derive(Debug, Default)]
pub struct WalkState {
    /// Declaration nodes whose artifact hash changed this run; everything
    /// depending on them rebuilds.
    updated_nodes: Mutex<FxHashSet<NodeId>>,
    /// Set once the preamble is rebuilt; every later check fails.
    preamble_updated: AtomicBool,
    /// Set whenever any object is rebuilt; gates the link phase.
    objects_updated: AtomicBool,
    /// Child invocations performed this run (all phases).
    child_invocations: AtomicUsize,
}

impl WalkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_preamble_updated(&self) {
        self.preamble_updated.store(true, Ordering::SeqCst);
    }

    pub fn preamble_updated(&self) -> bool {
        self.preamble_updated.load(Ordering::SeqCst)
    }

    pub fn mark_objects_updated(&self) {
        self.objects_updated.store(true, Ordering::SeqCst);
    }

    pub fn objects_updated(&self) -> bool {
        self.objects_updated.load(Ordering::SeqCst)
    }

    pub fn mark_node_updated(&self, node: NodeId) {
        self.updated_nodes.lock().insert(node);
    }

    pub fn any_updated(&self, nodes: &FxHashSet<NodeId>) -> bool {
        let updated = self.updated_nodes.lock();
        nodes.iter().any(|n| updated.contains(n))
    }

    pub fn count_invocation(&self) {
        self.child_invocations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn child_invocations(&self) -> usize {
        self.child_invocations.load(Ordering::SeqCst)
    }
}

/// Outcome of a staleness check.
#[derive(Debug)]
pub struct Freshness {
    pub up_to_date: bool,
    /// The meta present before any rebuild, for artifact-hash comparison
    /// after the child runs. `None` when absent or undecodable.
    pub prior_meta: Option<Meta>,
}

/// Decide whether `artifact` is current with respect to `source`.
///
/// `dependencies` are the node's direct dependencies in the graph; any of
/// them appearing in the run's updated set forces a rebuild.
pub fn check_artifact(
    artifact: &Path,
    meta_path: &Path,
    source: &Path,
    state: &WalkState,
    dependencies: &FxHashSet<NodeId>,
) -> Freshness {
    let prior_meta = match Meta::load(meta_path) {
        Ok(meta) => meta,
        Err(err) => {
            debug!(meta = %meta_path.display(), %err, "meta unusable, rebuilding");
            None
        }
    };

    let stale = |reason: &str| {
        debug!(artifact = %artifact.display(), reason, "artifact stale");
    };

    let Some(meta) = prior_meta.as_ref() else {
        stale("meta absent or corrupt");
        return Freshness {
            up_to_date: false,
            prior_meta,
        };
    };

    if !artifact.exists() {
        stale("artifact missing");
        return Freshness {
            up_to_date: false,
            prior_meta,
        };
    }

    match md5_of_file(source) {
        Ok(hash) if hash == meta.source_hash => {}
        Ok(_) => {
            stale("source changed");
            return Freshness {
                up_to_date: false,
                prior_meta,
            };
        }
        Err(_) => {
            // A missing source becomes a hard failure once the child runs;
            // here it only means "not up to date".
            stale("source unreadable");
            return Freshness {
                up_to_date: false,
                prior_meta,
            };
        }
    }

    if state.preamble_updated() {
        stale("preamble rebuilt this run");
        return Freshness {
            up_to_date: false,
            prior_meta,
        };
    }

    if state.any_updated(dependencies) {
        stale("dependency declaration changed");
        return Freshness {
            up_to_date: false,
            prior_meta,
        };
    }

    Freshness {
        up_to_date: true,
        prior_meta,
    }
}

/// After a declaration rebuild: does the new artifact hash differ from the
/// one recorded before the rebuild? Absent prior meta counts as changed.
pub fn artifact_changed(prior: Option<&Meta>, new: &Meta) -> bool {
    prior.map(|m| m.artifact_hash) != Some(new.artifact_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cppl_core::md5_of;

    fn write_artifact(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn write_meta(dir: &Path, name: &str, source: &[u8], artifact: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        Meta::new(md5_of(source), md5_of(artifact)).save(&path).unwrap();
        path
    }

    #[test]
    fn fresh_artifact_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_artifact(dir.path(), "u.cppl", b"src");
        let artifact = write_artifact(dir.path(), "u.o", b"obj");
        let meta = write_meta(dir.path(), "u.o.meta", b"src", b"obj");

        let state = WalkState::new();
        let freshness = check_artifact(&artifact, &meta, &source, &state, &FxHashSet::default());
        assert!(freshness.up_to_date);
        assert!(freshness.prior_meta.is_some());
    }

    #[test]
    fn source_change_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_artifact(dir.path(), "u.cppl", b"src v2");
        let artifact = write_artifact(dir.path(), "u.o", b"obj");
        let meta = write_meta(dir.path(), "u.o.meta", b"src v1", b"obj");

        let state = WalkState::new();
        assert!(!check_artifact(&artifact, &meta, &source, &state, &FxHashSet::default()).up_to_date);
    }

    #[test]
    fn missing_meta_or_artifact_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_artifact(dir.path(), "u.cppl", b"src");
        let artifact = write_artifact(dir.path(), "u.o", b"obj");
        let meta = dir.path().join("u.o.meta");

        let state = WalkState::new();
        let freshness = check_artifact(&artifact, &meta, &source, &state, &FxHashSet::default());
        assert!(!freshness.up_to_date);
        assert!(freshness.prior_meta.is_none());

        let meta = write_meta(dir.path(), "u.o.meta", b"src", b"obj");
        std::fs::remove_file(&artifact).unwrap();
        let freshness = check_artifact(&artifact, &meta, &source, &state, &FxHashSet::default());
        assert!(!freshness.up_to_date);
        // The recorded meta survives for cascade comparison.
        assert!(freshness.prior_meta.is_some());
    }

    #[test]
    fn corrupt_meta_is_stale_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_artifact(dir.path(), "u.cppl", b"src");
        let artifact = write_artifact(dir.path(), "u.o", b"obj");
        let meta = write_artifact(dir.path(), "u.o.meta", b"garbage");

        let state = WalkState::new();
        let freshness = check_artifact(&artifact, &meta, &source, &state, &FxHashSet::default());
        assert!(!freshness.up_to_date);
        assert!(freshness.prior_meta.is_none());
    }

    #[test]
    fn preamble_rebuild_invalidates_everything() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_artifact(dir.path(), "u.cppl", b"src");
        let artifact = write_artifact(dir.path(), "u.o", b"obj");
        let meta = write_meta(dir.path(), "u.o.meta", b"src", b"obj");

        let state = WalkState::new();
        state.mark_preamble_updated();
        assert!(!check_artifact(&artifact, &meta, &source, &state, &FxHashSet::default()).up_to_date);
    }

    #[test]
    fn updated_dependency_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_artifact(dir.path(), "u.cppl", b"src");
        let artifact = write_artifact(dir.path(), "u.o", b"obj");
        let meta = write_meta(dir.path(), "u.o.meta", b"src", b"obj");

        let state = WalkState::new();
        state.mark_node_updated(7);
        assert!(!check_artifact(&artifact, &meta, &source, &state, &FxHashSet::from_iter([7])).up_to_date);
        assert!(check_artifact(&artifact, &meta, &source, &state, &FxHashSet::from_iter([8])).up_to_date);
    }

    #[test]
    fn artifact_hash_comparison() {
        let old = Meta::new(md5_of(b"s"), md5_of(b"decl v1"));
        let same = Meta::new(md5_of(b"s2"), md5_of(b"decl v1"));
        let changed = Meta::new(md5_of(b"s2"), md5_of(b"decl v2"));

        assert!(!artifact_changed(Some(&old), &same));
        assert!(artifact_changed(Some(&old), &changed));
        assert!(artifact_changed(None, &changed));
    }
}
