//! The build coordinator's phase sequence.
//!
//! Phases run in a fixed order and each one short-circuits on the first
//! recorded failure: collect sources, build the preamble, extract imports
//! in parallel, solve the dependency graph, walk it from terminals to
//! roots compiling stale declarations and objects, and finally link (or,
//! for library builds, let the headers and surrogates produced during the
//! walk stand as the output).

use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use cppl_core::collect::collect_unit_sources;
use cppl_core::{md5_of_file, Meta, ParsedImports, StringId, StringPool};
use cppl_graph::graph::{unit_of, Node, NodeKind, ParsedDependencies, UnitImports};
use cppl_graph::{dsf_jobs, DependenciesGraph, GraphError, SolvedDependencies};
use cppl_tasks::TaskManager;

use crate::commands::{self, CommandInfo};
use crate::config::DriverConfig;
use crate::error::{DriverError, Result};
use crate::exec::{DryRunExecutor, Executor, ProcessExecutor};
use crate::files::FilesInfo;
use crate::headergen::{self, DependencyRef, GeneratorInput, OutputMode};
use crate::incremental::{artifact_changed, check_artifact, WalkState};
use crate::status::Status;

/// What a finished run did.
#[derive(Debug)]
pub struct BuildSummary {
    /// Child processes launched across all phases.
    pub child_invocations: usize,
    /// True when the whole tree was already current.
    pub nothing_to_build: bool,
    /// Warnings accumulated during the run (already logged).
    pub warnings: Vec<String>,
}

/// The build coordinator.
pub struct Driver {
    config: DriverConfig,
    executor: Arc<dyn Executor>,
}

/// Read-only configuration plus the run's shared mutable state, handed to
/// every task through an `Arc`.
struct Shared {
    config: DriverConfig,
    executor: Arc<dyn Executor>,
    strings: Arc<StringPool>,
    files: FxHashMap<StringId, FilesInfo>,
    status: Status,
    state: WalkState,
}

impl Driver {
    /// A driver with the executor implied by the configuration.
    pub fn new(config: DriverConfig) -> Self {
        let executor: Arc<dyn Executor> = if config.dry_run {
            Arc::new(DryRunExecutor)
        } else {
            Arc::new(ProcessExecutor)
        };
        Self { config, executor }
    }

    /// A driver with an injected executor.
    pub fn with_executor(config: DriverConfig, executor: Arc<dyn Executor>) -> Self {
        Self { config, executor }
    }

    /// Run every phase; fails on the first unrecoverable error.
    pub fn run(&self) -> Result<BuildSummary> {
        self.config.dump_parameters();

        let (strings, files, order) = collect_sources(&self.config)?;
        let tasks = Arc::new(TaskManager::new(self.config.jobs)?);
        let shared = Arc::new(Shared {
            config: self.config.clone(),
            executor: self.executor.clone(),
            strings: Arc::new(strings),
            files,
            status: Status::new(),
            state: WalkState::new(),
        });

        build_preamble(&shared);
        parse_imports(&shared, &tasks, &order);

        if shared.status.is_valid() {
            let solved = solve(&shared, &order)?;
            codegen(&shared, &tasks, &solved);
            link_phase(&shared, &order);
        }

        let warnings = shared.status.take_warnings();
        for warning in &warnings {
            warn!("{warning}");
        }

        if let Some(message) = shared.status.error_message() {
            return Err(DriverError::BuildFailed(message));
        }

        let child_invocations = shared.state.child_invocations();
        let nothing_to_build = child_invocations == 0;
        if nothing_to_build {
            info!("Nothing to build.");
        }

        Ok(BuildSummary {
            child_invocations,
            nothing_to_build,
            warnings,
        })
    }
}

/// Phase 1: register project and library units.
fn collect_sources(
    config: &DriverConfig,
) -> Result<(StringPool, FxHashMap<StringId, FilesInfo>, Vec<StringId>)> {
    let strings = StringPool::new();
    let mut files: FxHashMap<StringId, FilesInfo> = FxHashMap::default();

    let mut register = |info: FilesInfo| -> Result<()> {
        let id = strings.intern(&info.unit_id);
        if let Some(existing) = files.get(&id) {
            return Err(DriverError::DuplicateUnit {
                unit: info.unit_id.clone(),
                first: existing.source.clone(),
                second: info.source.clone(),
            });
        }
        files.insert(id, info);
        Ok(())
    };

    let project_sources = collect_unit_sources(
        &config.sources_root,
        config.build_root_within_sources(),
    )?;
    for source in &project_sources {
        register(FilesInfo::project(config, source)?)?;
    }

    for lib_root in &config.lib_roots {
        for source in &collect_unit_sources(lib_root, None)? {
            register(FilesInfo::external(config, lib_root, source)?)?;
        }
    }

    let mut order: Vec<StringId> = files.keys().copied().collect();
    order.sort_by_key(|id| strings.resolve(*id));

    info!(
        "Found {} unit source files ({} external).",
        files.len(),
        files.values().filter(|f| f.is_external).count()
    );

    Ok((strings, files, order))
}

/// Phase 2: build the precompiled preamble when requested.
fn build_preamble(shared: &Arc<Shared>) {
    if !shared.status.is_valid() || !shared.config.preamble_requested() {
        return;
    }
    let source = shared
        .config
        .preamble_source
        .clone()
        .unwrap_or_default();
    let out = shared.config.preamble_output();
    let meta = shared.config.preamble_meta();

    let freshness = check_artifact(
        &out,
        &meta,
        &source,
        &shared.state,
        &rustc_hash::FxHashSet::default(),
    );
    if freshness.up_to_date {
        debug!("preamble up to date");
        return;
    }

    info!("PREAMBLE  {} -> {}", source.display(), out.display());
    let cmd = commands::preamble(&shared.config, &source, &out, &meta);
    if run_child(shared, cmd, "preamble") {
        shared.state.mark_preamble_updated();
    } else {
        shared.status.set_failure("preamble: phase failed");
    }
}

/// Phase 3: extract imports for every stale unit, in parallel.
fn parse_imports(shared: &Arc<Shared>, tasks: &Arc<TaskManager>, order: &[StringId]) {
    if !shared.status.is_valid() {
        return;
    }

    for &unit in order {
        let shared = Arc::clone(shared);
        tasks.add_task(move |ctx| {
            if !shared.status.is_valid() {
                return;
            }
            let files = &shared.files[&unit];
            if ldeps_current(files) {
                trace!(unit = %files.unit_id, "parsed imports up to date");
                return;
            }

            info!(
                "PARSE IMP {} -> {}",
                files.source.display(),
                files.ldeps.display()
            );
            let cmd = commands::parse_import(&shared.config, files);
            ctx.successful = run_child(&shared, cmd, "parse imports");
        });
    }

    if !tasks.wait_for_tasks() {
        shared.status.set_failure("parse imports: phase failed");
    }
}

/// The ldeps record is current when its meta decodes and still matches the
/// source. The preamble does not participate: import extraction does not
/// depend on it.
fn ldeps_current(files: &FilesInfo) -> bool {
    if !files.ldeps.exists() {
        return false;
    }
    let meta = match Meta::load(&files.ldeps_meta) {
        Ok(Some(meta)) => meta,
        Ok(None) | Err(_) => return false,
    };
    matches!(md5_of_file(&files.source), Ok(hash) if hash == meta.source_hash)
}

/// Phase 4: decode every ldeps record, build and solve the graph.
fn solve(shared: &Arc<Shared>, order: &[StringId]) -> Result<Arc<SolvedDependencies>> {
    let mut parsed = ParsedDependencies::default();

    for &unit in order {
        let files = &shared.files[&unit];
        let record = match ParsedImports::load(&files.ldeps)? {
            Some(record) => record,
            // A dry run never wrote the records; pretend the tree is
            // import-free so the remaining commands still get printed.
            None if shared.config.dry_run => ParsedImports::new(files.unit_id.clone()),
            None => {
                return Err(DriverError::MissingLdeps {
                    path: files.ldeps.clone(),
                })
            }
        };

        let imports = UnitImports {
            decl_imports: record
                .decl_imports
                .iter()
                .map(|target| shared.strings.intern(target))
                .collect(),
            body_imports: record
                .body_imports
                .iter()
                .map(|target| shared.strings.intern(target))
                .collect(),
            is_public: record.is_public,
            is_external: files.is_external,
        };
        parsed.insert(unit, imports);
    }

    let graph = DependenciesGraph::build(&parsed);
    trace!("dependencies graph:\n{}", graph.describe(&shared.strings));

    if graph.is_invalid() {
        return Err(GraphError::NoRoots.into());
    }
    let unknown = graph.unknown_units();
    if let Some(&first) = unknown.first() {
        return Err(GraphError::UnknownImport {
            unit: shared.strings.resolve(first).to_string(),
        }
        .into());
    }

    let solved = SolvedDependencies::solve(Arc::new(graph), &shared.strings)?;
    Ok(Arc::new(solved))
}

/// Phase 5: walk the graph and rebuild what is stale.
fn codegen(shared: &Arc<Shared>, tasks: &Arc<TaskManager>, solved: &Arc<SolvedDependencies>) {
    if !shared.status.is_valid() {
        return;
    }

    let shared_walk = Arc::clone(shared);
    let solved_walk = Arc::clone(solved);
    let ok = dsf_jobs(
        solved.graph().clone(),
        Arc::clone(tasks),
        move |node| process_node(&shared_walk, &solved_walk, node),
    );

    if !ok {
        shared.status.set_failure("codegen: phase failed");
    }
}

fn process_node(shared: &Arc<Shared>, solved: &Arc<SolvedDependencies>, node: &Node) -> bool {
    // Stop issuing work once anything has failed.
    if !shared.status.is_valid() {
        return false;
    }

    match node.kind {
        NodeKind::Definition => process_definition(shared, solved, node),
        NodeKind::Declaration => process_declaration(shared, solved, node),
    }
}

fn process_definition(shared: &Arc<Shared>, solved: &Arc<SolvedDependencies>, node: &Node) -> bool {
    let files = &shared.files[&node.unit];

    let freshness = check_artifact(
        &files.object,
        &files.object_meta,
        &files.source,
        &shared.state,
        &node.dependencies,
    );
    if freshness.up_to_date {
        return true;
    }

    info!(
        "BUILD OBJ  {} -> {}",
        files.unit_id,
        files.object.display()
    );
    let deps = dependency_artifacts(shared, solved, node);
    let cmd = commands::build_obj(&shared.config, files, &deps);
    let ok = run_child(shared, cmd, "build object");
    if ok {
        // Objects never cascade, but any rebuilt object forces the link.
        shared.state.mark_objects_updated();
    }
    ok
}

fn process_declaration(
    shared: &Arc<Shared>,
    solved: &Arc<SolvedDependencies>,
    node: &Node,
) -> bool {
    let files = &shared.files[&node.unit];

    let freshness = check_artifact(
        &files.decl_ast,
        &files.decl_ast_meta,
        &files.source,
        &shared.state,
        &node.dependencies,
    );
    if freshness.up_to_date {
        return true;
    }

    info!(
        "BUILD DECL {} -> {}",
        files.unit_id,
        files.decl_ast.display()
    );
    let deps = dependency_artifacts(shared, solved, node);
    // The same unit is also compiled for its definition unless it is
    // external; diagnostics would be reported twice.
    let suppress_warnings = !files.is_external;
    let cmd = commands::build_decl(&shared.config, files, &deps, suppress_warnings);
    if !run_child(shared, cmd, "build declaration") {
        return false;
    }
    if shared.config.dry_run {
        return true;
    }

    let new_meta = match Meta::load(&files.decl_ast_meta) {
        Ok(Some(meta)) => meta,
        Ok(None) => {
            shared.status.set_failure(format!(
                "build declaration: front-end produced no meta record at {}",
                files.decl_ast_meta.display()
            ));
            return false;
        }
        Err(err) => {
            shared
                .status
                .set_failure(format!("build declaration: {err}"));
            return false;
        }
    };

    // The cascade is driven by the artifact, not the source: a body-only
    // change leaves the declaration AST bytes identical and dependents
    // untouched.
    if artifact_changed(freshness.prior_meta.as_ref(), &new_meta) {
        shared.state.mark_node_updated(node.id);
    }

    let graph = solved.graph();
    if graph.is_public(node.id) {
        if shared.config.headers_requested()
            && !emit_export(shared, node, files, &new_meta, OutputMode::Header)
        {
            return false;
        }
        if shared.config.decls_requested()
            && !files.is_external
            && !emit_export(shared, node, files, &new_meta, OutputMode::DeclSurrogate)
        {
            return false;
        }
    }

    true
}

/// Generate the header or declaration surrogate for a public declaration.
fn emit_export(
    shared: &Arc<Shared>,
    node: &Node,
    files: &FilesInfo,
    meta: &Meta,
    mode: OutputMode,
) -> bool {
    let out_path = match mode {
        OutputMode::Header => files.header.as_ref(),
        OutputMode::DeclSurrogate => files.decl_surrogate.as_ref(),
    };
    let Some(out_path) = out_path else {
        return true;
    };

    let source = match std::fs::read(&files.source) {
        Ok(bytes) => bytes,
        Err(err) => {
            shared.status.set_failure(format!(
                "header generation: cannot read {}: {err}",
                files.source.display()
            ));
            return false;
        }
    };

    // Direct dependencies only; transitive ones arrive through the
    // included headers themselves.
    let mut dep_units: Vec<StringId> = node.dependencies.iter().map(|&d| unit_of(d)).collect();
    dep_units.sort_by_key(|id| shared.strings.resolve(*id));
    let dependencies: Vec<DependencyRef> = dep_units
        .iter()
        .map(|id| {
            let dep_files = &shared.files[id];
            DependencyRef {
                unit_id: dep_files.unit_id.clone(),
                include_path: dep_files
                    .rel
                    .rel_artifact(cppl_core::ArtifactExt::Header),
            }
        })
        .collect();

    let input = GeneratorInput {
        mode,
        unit_id: &files.unit_id,
        source: &source,
        fragments: &meta.fragments,
        dependencies: &dependencies,
        preamble_source: shared.config.preamble_source.as_deref(),
        origin: &files.decl_ast_meta,
    };

    match headergen::write_output(&input, out_path) {
        Ok(()) => {
            debug!(unit = %files.unit_id, out = %out_path.display(), "export written");
            true
        }
        Err(err) => {
            shared.status.set_failure(err.to_string());
            false
        }
    }
}

/// The node's full transitive dependency list as declaration-AST paths.
fn dependency_artifacts(
    shared: &Arc<Shared>,
    solved: &Arc<SolvedDependencies>,
    node: &Node,
) -> Vec<PathBuf> {
    solved
        .ranged_dependencies(node.id)
        .values()
        .map(|&dep| shared.files[&unit_of(dep)].decl_ast.clone())
        .collect()
}

/// Phase 6: link project objects, unless `-c` or nothing changed.
fn link_phase(shared: &Arc<Shared>, order: &[StringId]) {
    if !shared.status.is_valid() || !shared.config.link {
        return;
    }

    let output = shared.config.output_path();
    if !shared.state.objects_updated() && output.exists() {
        debug!("objects unchanged and output present, skipping link");
        return;
    }

    let objects: Vec<PathBuf> = order
        .iter()
        .filter(|&&id| !shared.files[&id].is_external)
        .map(|&id| shared.files[&id].object.clone())
        .collect();
    if objects.is_empty() {
        shared.status.set_failure("link: no project objects to link");
        return;
    }

    info!("LINK {} objects -> {}", objects.len(), output.display());
    let cmd = commands::link(&shared.config, &objects, &output);
    if !run_child(shared, cmd, "link") {
        shared.status.set_failure("link: phase failed");
    }
}

/// Launch one child and fold its outcome into the shared status.
///
/// Non-zero exit is a failure; stderr with a zero exit is only a warning.
fn run_child(shared: &Arc<Shared>, cmd: CommandInfo, what: &str) -> bool {
    shared.state.count_invocation();
    debug!("{}", cmd.render());

    match shared.executor.execute(&cmd) {
        Err(err) => {
            shared.status.set_failure(format!(
                "{what}: failed to execute {}: {err}",
                cmd.program().display()
            ));
            false
        }
        Ok(outcome) if !outcome.success() => {
            shared.status.set_failure(format!(
                "{what}: child exited with code {}{}",
                outcome.exit_code,
                if outcome.stderr.trim().is_empty() {
                    String::new()
                } else {
                    format!(": {}", outcome.stderr.trim())
                }
            ));
            false
        }
        Ok(outcome) => {
            if !outcome.stderr.trim().is_empty() {
                shared
                    .status
                    .warn(format!("{what}: {}", outcome.stderr.trim()));
            }
            true
        }
    }
}
