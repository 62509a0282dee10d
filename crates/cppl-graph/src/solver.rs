//! Transitive dependency solving.
//!
//! For every node the solver produces the full, deduplicated, topologically
//! ordered list of declaration artifacts that must be preloaded when the
//! node is compiled. The order key is the position a dependency reached in
//! the DFS finish order, so within any one node's list a dependency always
//! precedes everything that needs it.

use cppl_core::StringPool;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::graph::{describe_node_id, DependenciesGraph, NodeId};
use crate::{GraphError, Result};

/// Per-node transitive dependencies keyed by topological rank.
pub type RangedDependencies = BTreeMap<usize, NodeId>;

/// The graph plus every node's solved transitive dependency list.
#[derive(Debug)]
pub struct SolvedDependencies {
    graph: Arc<DependenciesGraph>,
    full_deps: FxHashMap<NodeId, RangedDependencies>,
}

impl SolvedDependencies {
    /// Solve the graph from its terminals.
    ///
    /// Fails on any cycle the graph's body-only edges did not cut. At most
    /// ten distinct cycles are reported.
    pub fn solve(graph: Arc<DependenciesGraph>, strings: &StringPool) -> Result<Self> {
        if graph.is_invalid() {
            return Err(GraphError::NoRoots);
        }

        let mut solver = Solver {
            graph: &graph,
            finished: FxHashMap::default(),
            full_deps: FxHashMap::default(),
            on_path: Vec::new(),
            on_path_set: FxHashSet::default(),
            cycles: Vec::new(),
            next_rank: 0,
        };

        for &terminal in graph.terminals() {
            solver.visit(terminal);
        }

        if !solver.cycles.is_empty() {
            return Err(GraphError::Cycle {
                description: solver.describe_cycles(strings),
            });
        }

        // Nodes unreachable from any terminal can only sit on a cycle that
        // feeds no terminal.
        if solver.finished.len() != graph.len() {
            let stranded: Vec<String> = graph
                .nodes()
                .filter(|n| !solver.finished.contains_key(&n.id))
                .map(|n| describe_node_id(n.id, strings))
                .collect();
            return Err(GraphError::Cycle {
                description: format!("units unreachable from any terminal: {}", stranded.join(", ")),
            });
        }

        debug!(nodes = graph.len(), "dependencies solved");
        let full_deps = solver.full_deps;
        Ok(Self { graph, full_deps })
    }

    pub fn graph(&self) -> &Arc<DependenciesGraph> {
        &self.graph
    }

    /// The node's full transitive dependency list in topological order.
    pub fn ranged_dependencies(&self, id: NodeId) -> &RangedDependencies {
        &self.full_deps[&id]
    }
}

const MAX_REPORTED_CYCLES: usize = 10;

struct Solver<'g> {
    graph: &'g DependenciesGraph,
    /// DFS finish rank per completed node.
    finished: FxHashMap<NodeId, usize>,
    full_deps: FxHashMap<NodeId, RangedDependencies>,
    on_path: Vec<NodeId>,
    on_path_set: FxHashSet<NodeId>,
    cycles: Vec<Vec<NodeId>>,
    next_rank: usize,
}

impl Solver<'_> {
    fn visit(&mut self, id: NodeId) {
        if self.finished.contains_key(&id) {
            return;
        }
        if !self.on_path_set.insert(id) {
            self.record_cycle(id);
            return;
        }
        self.on_path.push(id);

        let node = self.graph.node(id);
        for &dep in &node.dependencies {
            self.visit(dep);
        }

        self.on_path.pop();
        self.on_path_set.remove(&id);

        let mut full = RangedDependencies::new();
        for &dep in &node.dependencies {
            if let Some(dep_full) = self.full_deps.get(&dep) {
                full.extend(dep_full.iter().map(|(&rank, &nid)| (rank, nid)));
            }
            if let Some(&rank) = self.finished.get(&dep) {
                full.insert(rank, dep);
            }
        }

        self.finished.insert(id, self.next_rank);
        self.next_rank += 1;
        self.full_deps.insert(id, full);
    }

    fn record_cycle(&mut self, entry: NodeId) {
        if self.cycles.len() >= MAX_REPORTED_CYCLES {
            return;
        }
        let start = self
            .on_path
            .iter()
            .position(|&n| n == entry)
            .unwrap_or(0);
        let mut cycle = self.on_path[start..].to_vec();
        cycle.push(entry);
        self.cycles.push(cycle);
    }

    fn describe_cycles(&self, strings: &StringPool) -> String {
        self.cycles
            .iter()
            .map(|cycle| {
                cycle
                    .iter()
                    .map(|&id| describe_node_id(id, strings))
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{node_id, NodeKind, ParsedDependencies, UnitImports};
    use cppl_core::StringId;

    fn imports(decl: &[StringId], body: &[StringId]) -> UnitImports {
        UnitImports {
            decl_imports: decl.to_vec(),
            body_imports: body.to_vec(),
            is_public: false,
            is_external: false,
        }
    }

    #[test]
    fn chain_dependencies_are_transitive_and_ordered() {
        let pool = StringPool::new();
        let a = pool.intern("a");
        let b = pool.intern("b");
        let c = pool.intern("c");

        let mut parsed = ParsedDependencies::default();
        parsed.insert(a, imports(&[], &[]));
        parsed.insert(b, imports(&[a], &[]));
        parsed.insert(c, imports(&[b], &[]));

        let graph = Arc::new(DependenciesGraph::build(&parsed));
        let solved = SolvedDependencies::solve(graph, &pool).unwrap();

        let decl_a = node_id(NodeKind::Declaration, a);
        let decl_b = node_id(NodeKind::Declaration, b);
        let def_c = node_id(NodeKind::Definition, c);

        let deps: Vec<NodeId> = solved.ranged_dependencies(def_c).values().copied().collect();
        assert_eq!(deps, vec![decl_a, decl_b]);

        // Direct-only dependency still solves to a single entry.
        let decl_b_deps: Vec<NodeId> =
            solved.ranged_dependencies(decl_b).values().copied().collect();
        assert_eq!(decl_b_deps, vec![decl_a]);

        // Roots solve to empty lists.
        assert!(solved.ranged_dependencies(decl_a).is_empty());
    }

    #[test]
    fn diamond_deduplicates_shared_dependency() {
        let pool = StringPool::new();
        let a = pool.intern("a");
        let l = pool.intern("l");
        let r = pool.intern("r");
        let top = pool.intern("top");

        let mut parsed = ParsedDependencies::default();
        parsed.insert(a, imports(&[], &[]));
        parsed.insert(l, imports(&[a], &[]));
        parsed.insert(r, imports(&[a], &[]));
        parsed.insert(top, imports(&[l, r], &[]));

        let graph = Arc::new(DependenciesGraph::build(&parsed));
        let solved = SolvedDependencies::solve(graph, &pool).unwrap();

        let deps: Vec<NodeId> = solved
            .ranged_dependencies(node_id(NodeKind::Definition, top))
            .values()
            .copied()
            .collect();

        let decl_a = node_id(NodeKind::Declaration, a);
        assert_eq!(deps.iter().filter(|&&d| d == decl_a).count(), 1);
        assert_eq!(deps.len(), 3);
        // The shared leaf precedes both of its dependents.
        assert_eq!(deps[0], decl_a);
    }

    #[test]
    fn cycle_reachable_from_terminal_is_an_error() {
        let pool = StringPool::new();
        let a = pool.intern("a");
        let b = pool.intern("b");
        let c = pool.intern("c");

        // a and b import each other; c keeps the graph rooted.
        let mut parsed = ParsedDependencies::default();
        parsed.insert(a, imports(&[b], &[]));
        parsed.insert(b, imports(&[a], &[]));
        parsed.insert(c, imports(&[], &[]));

        let graph = Arc::new(DependenciesGraph::build(&parsed));
        let err = SolvedDependencies::solve(graph, &pool).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn rootless_graph_is_rejected() {
        let pool = StringPool::new();
        let a = pool.intern("a");
        let b = pool.intern("b");

        let mut parsed = ParsedDependencies::default();
        parsed.insert(a, imports(&[b], &[]));
        parsed.insert(b, imports(&[a], &[]));

        let graph = Arc::new(DependenciesGraph::build(&parsed));
        assert!(graph.is_invalid());
        let err = SolvedDependencies::solve(graph, &pool).unwrap_err();
        assert!(matches!(err, GraphError::NoRoots));
    }

    #[test]
    fn body_only_cycle_solves() {
        let pool = StringPool::new();
        let a = pool.intern("a");
        let b = pool.intern("b");

        let mut parsed = ParsedDependencies::default();
        parsed.insert(a, imports(&[], &[b]));
        parsed.insert(b, imports(&[a], &[]));

        let graph = Arc::new(DependenciesGraph::build(&parsed));
        let solved = SolvedDependencies::solve(graph, &pool).unwrap();

        // Definition of a preloads b's declaration, and transitively its
        // own declaration, which b's declaration imports.
        let deps: Vec<NodeId> = solved
            .ranged_dependencies(node_id(NodeKind::Definition, a))
            .values()
            .copied()
            .collect();
        assert_eq!(
            deps,
            vec![
                node_id(NodeKind::Declaration, a),
                node_id(NodeKind::Declaration, b),
            ]
        );
    }
}
