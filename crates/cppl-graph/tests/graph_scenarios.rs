//! Graph-level build scenarios: cycle breaking and external units.

use std::sync::Arc;

use cppl_core::{StringId, StringPool};
use cppl_graph::graph::{node_id, NodeKind, ParsedDependencies, UnitImports};
use cppl_graph::{DependenciesGraph, GraphError, SolvedDependencies};

fn imports(decl: &[StringId], body: &[StringId]) -> UnitImports {
    UnitImports {
        decl_imports: decl.to_vec(),
        body_imports: body.to_vec(),
        is_public: false,
        is_external: false,
    }
}

#[test]
fn mutual_reference_with_one_body_import_builds_four_nodes_three_edges() {
    let pool = StringPool::new();
    let a = pool.intern("UnitA");
    let b = pool.intern("UnitB");

    // UnitA references UnitB only from its body; UnitB imports UnitA.
    let mut parsed = ParsedDependencies::default();
    parsed.insert(a, imports(&[], &[b]));
    parsed.insert(b, imports(&[a], &[]));

    let graph = Arc::new(DependenciesGraph::build(&parsed));
    assert!(!graph.is_invalid());
    assert_eq!(graph.len(), 4);
    let edges: usize = graph.nodes().map(|n| n.dependencies.len()).sum();
    assert_eq!(edges, 3);

    // The solved walk plan exists for every node.
    let solved = SolvedDependencies::solve(graph.clone(), &pool).unwrap();
    for node in graph.nodes() {
        let _ = solved.ranged_dependencies(node.id);
    }
}

#[test]
fn dropping_the_body_annotation_turns_the_graph_invalid() {
    let pool = StringPool::new();
    let a = pool.intern("UnitA");
    let b = pool.intern("UnitB");

    let mut parsed = ParsedDependencies::default();
    parsed.insert(a, imports(&[b], &[]));
    parsed.insert(b, imports(&[a], &[]));

    let graph = Arc::new(DependenciesGraph::build(&parsed));
    assert!(graph.is_invalid());
    assert!(matches!(
        SolvedDependencies::solve(graph, &pool),
        Err(GraphError::NoRoots)
    ));
}

#[test]
fn external_unit_feeds_project_compiles_without_a_definition() {
    let pool = StringPool::new();
    let x = pool.intern("lib::X");
    let a = pool.intern("pkg::UnitA");

    let mut parsed = ParsedDependencies::default();
    parsed.insert(
        x,
        UnitImports {
            decl_imports: Vec::new(),
            body_imports: Vec::new(),
            is_public: true,
            is_external: true,
        },
    );
    parsed.insert(a, imports(&[x], &[]));

    let graph = Arc::new(DependenciesGraph::build(&parsed));
    // Declaration-only for the external unit: three nodes total.
    assert_eq!(graph.len(), 3);
    assert!(graph.unit_nodes(x).unwrap().definition.is_none());

    let solved = SolvedDependencies::solve(graph.clone(), &pool).unwrap();
    let decl_x = node_id(NodeKind::Declaration, x);
    for kind in [NodeKind::Declaration, NodeKind::Definition] {
        let deps: Vec<_> = solved
            .ranged_dependencies(node_id(kind, a))
            .values()
            .copied()
            .collect();
        assert_eq!(deps, vec![decl_x]);
    }
}
