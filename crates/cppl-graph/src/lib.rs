//! Dependency graph construction and traversal for the cppl build
//! coordinator.
//!
//! Each unit contributes a declaration node and, unless it is an external
//! library unit, a definition node. Ordinary imports constrain both nodes
//! of the importer; body-only imports constrain only the definition, which
//! is the language's mechanism for breaking mutual references. The solver
//! computes per-node transitive dependency lists and the walk schedules
//! per-node work dependency-first across the task pool.

pub mod graph;
pub mod solver;
pub mod walk;

pub use graph::{
    DependenciesGraph, Node, NodeId, NodeKind, ParsedDependencies, UnitImports, UnitNodes,
};
pub use solver::SolvedDependencies;
pub use walk::dsf_jobs;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// A dependency cycle not cut by any body-only import.
    #[error("dependency cycle among unit declarations:\n{description}")]
    Cycle { description: String },

    /// Every unit participates in a cycle (the graph has no roots).
    #[error("dependency graph has no roots; every unit participates in an import cycle")]
    NoRoots,

    /// A unit imports a target no parsed-imports record was found for.
    #[error("unknown import target '{unit}'")]
    UnknownImport { unit: String },
}

pub type Result<T, E = GraphError> = std::result::Result<T, E>;
