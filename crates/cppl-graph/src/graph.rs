//! The bipartite declaration/definition dependency graph.

use cppl_core::{StringId, StringPool};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

/// Node identifier: kind tag and unit ID packed into one word.
///
/// The top bit carries the kind (0 = declaration, 1 = definition), the low
/// 63 bits the interned unit ID, so the encoding is bijective.
pub type NodeId = u64;

const KIND_SHIFT: u32 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Declaration,
    Definition,
}

impl NodeKind {
    fn tag(self) -> u64 {
        match self {
            Self::Declaration => 0,
            Self::Definition => 1,
        }
    }
}

/// Pack a kind and unit ID into a node ID.
pub fn node_id(kind: NodeKind, unit: StringId) -> NodeId {
    (kind.tag() << KIND_SHIFT) | u64::from(unit.0)
}

/// The kind component of a node ID.
pub fn kind_of(id: NodeId) -> NodeKind {
    if id >> KIND_SHIFT == 0 {
        NodeKind::Declaration
    } else {
        NodeKind::Definition
    }
}

/// The unit component of a node ID.
pub fn unit_of(id: NodeId) -> StringId {
    StringId((id & !(1u64 << KIND_SHIFT)) as u32)
}

/// One unit's parsed imports, resolved to interned IDs.
#[derive(Debug, Clone, Default)]
pub struct UnitImports {
    pub decl_imports: Vec<StringId>,
    pub body_imports: Vec<StringId>,
    pub is_public: bool,
    pub is_external: bool,
}

/// All units' parsed imports, keyed by unit ID.
pub type ParsedDependencies = FxHashMap<StringId, UnitImports>;

/// A graph node: one side of a unit.
#[derive(Debug)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub unit: StringId,
    /// Outgoing edges: the declarations this node needs preloaded.
    pub dependencies: FxHashSet<NodeId>,
    /// Incoming edges: the nodes that need this one.
    pub dependents: FxHashSet<NodeId>,
}

impl Node {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            kind: kind_of(id),
            unit: unit_of(id),
            dependencies: FxHashSet::default(),
            dependents: FxHashSet::default(),
        }
    }
}

/// The nodes a unit contributed to the graph.
#[derive(Debug, Clone, Copy)]
pub struct UnitNodes {
    pub unit: StringId,
    pub declaration: NodeId,
    /// Absent for external units; their objects are never built here.
    pub definition: Option<NodeId>,
}

/// Bipartite dependency graph over declaration and definition nodes.
#[derive(Debug, Default)]
pub struct DependenciesGraph {
    nodes: FxHashMap<NodeId, Node>,
    units: FxHashMap<StringId, UnitNodes>,
    /// Nodes without dependencies; their absence in a non-empty graph
    /// means every unit sits on a cycle.
    roots: FxHashSet<NodeId>,
    /// Nodes without dependents; the walk starts from these.
    terminals: FxHashSet<NodeId>,
    public_nodes: FxHashSet<NodeId>,
    external_nodes: FxHashSet<NodeId>,
    invalid: bool,
}

impl DependenciesGraph {
    /// Build the graph from every unit's parsed imports.
    pub fn build(parsed: &ParsedDependencies) -> Self {
        let mut graph = Self::default();

        for (&unit, imports) in parsed {
            trace!(unit = %unit, "adding unit to graph");
            let unit_nodes = graph.create_unit_nodes(unit, imports.is_external);

            if imports.decl_imports.is_empty() {
                graph.roots.insert(unit_nodes.declaration);
                if imports.body_imports.is_empty() {
                    if let Some(definition) = unit_nodes.definition {
                        graph.roots.insert(definition);
                    }
                }
            }

            graph.add_dependencies(unit_nodes.declaration, &imports.decl_imports);
            if let Some(definition) = unit_nodes.definition {
                // The definition re-parses the full source, so it needs both
                // the ordinary and the body-only imports, but never its own
                // declaration AST.
                graph.add_dependencies(definition, &imports.decl_imports);
                graph.add_dependencies(definition, &imports.body_imports);
            }

            if imports.is_public {
                graph.public_nodes.insert(unit_nodes.declaration);
            }
            if imports.is_external {
                graph.external_nodes.insert(unit_nodes.declaration);
            }
        }

        if !graph.nodes.is_empty() && graph.roots.is_empty() {
            graph.invalid = true;
        }

        graph.collect_terminals();
        graph.collect_public_closure();
        graph
    }

    fn create_unit_nodes(&mut self, unit: StringId, is_external: bool) -> UnitNodes {
        let declaration = self.get_or_create_node(node_id(NodeKind::Declaration, unit));
        let definition = if is_external {
            None
        } else {
            Some(self.get_or_create_node(node_id(NodeKind::Definition, unit)))
        };

        let unit_nodes = UnitNodes {
            unit,
            declaration,
            definition,
        };
        self.units.insert(unit, unit_nodes);
        unit_nodes
    }

    fn get_or_create_node(&mut self, id: NodeId) -> NodeId {
        self.nodes.entry(id).or_insert_with(|| Node::new(id));
        id
    }

    fn add_dependencies(&mut self, dependent: NodeId, targets: &[StringId]) {
        for &target in targets {
            let target_id = self.get_or_create_node(node_id(NodeKind::Declaration, target));
            if let Some(node) = self.nodes.get_mut(&dependent) {
                node.dependencies.insert(target_id);
            }
            if let Some(node) = self.nodes.get_mut(&target_id) {
                node.dependents.insert(dependent);
            }
        }
    }

    fn collect_terminals(&mut self) {
        for (&id, node) in &self.nodes {
            if node.dependents.is_empty() {
                self.terminals.insert(id);
            }
        }
    }

    /// Public is closed under dependency edges: everything a public
    /// declaration needs is part of the library interface too.
    fn collect_public_closure(&mut self) {
        let mut worklist: Vec<NodeId> = self.public_nodes.iter().copied().collect();
        while let Some(id) = worklist.pop() {
            for dep in self.nodes[&id].dependencies.iter().copied() {
                if self.public_nodes.insert(dep) {
                    worklist.push(dep);
                }
            }
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[&id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn unit_nodes(&self, unit: StringId) -> Option<&UnitNodes> {
        self.units.get(&unit)
    }

    pub fn roots(&self) -> &FxHashSet<NodeId> {
        &self.roots
    }

    pub fn terminals(&self) -> &FxHashSet<NodeId> {
        &self.terminals
    }

    pub fn is_public(&self, id: NodeId) -> bool {
        self.public_nodes.contains(&id)
    }

    pub fn is_external(&self, id: NodeId) -> bool {
        self.external_nodes.contains(&id)
    }

    /// True when the graph is non-empty but rootless, i.e. cyclic.
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Units referenced by an import but lacking a parsed-imports record.
    pub fn unknown_units(&self) -> Vec<StringId> {
        let mut unknown: Vec<StringId> = self
            .nodes
            .values()
            .filter(|n| !self.units.contains_key(&n.unit))
            .map(|n| n.unit)
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }

    /// Breadth-first walk from roots towards terminals over dependent
    /// edges, visiting every reachable node once.
    pub fn bsf_walk(&self, mut on_node: impl FnMut(&Node)) {
        let mut visited: FxHashSet<NodeId> = FxHashSet::default();
        let mut worklist: Vec<NodeId> = self.roots.iter().copied().collect();

        while let Some(id) = worklist.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = &self.nodes[&id];
            on_node(node);
            worklist.extend(node.dependents.iter().copied());
        }
    }

    /// Render the graph for trace diagnostics.
    pub fn describe(&self, strings: &StringPool) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        if self.nodes.is_empty() {
            out.push_str("(empty)\n");
            return out;
        }

        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort();
        for id in ids {
            let node = &self.nodes[&id];
            let _ = writeln!(
                out,
                "{}{} {}: deps={} dependents={}{}{}",
                if self.roots.contains(&id) { "(root) " } else { "" },
                describe_node_id(id, strings),
                match node.kind {
                    NodeKind::Declaration => "DECL",
                    NodeKind::Definition => "DEF",
                },
                node.dependencies.len(),
                node.dependents.len(),
                if self.is_public(id) { " public" } else { "" },
                if self.is_external(id) { " external" } else { "" },
            );
        }
        out
    }
}

/// Short `unit:KIND` form used in diagnostics and cycle reports.
pub fn describe_node_id(id: NodeId, strings: &StringPool) -> String {
    format!(
        "{}:{}",
        strings.resolve(unit_of(id)),
        match kind_of(id) {
            NodeKind::Declaration => "DECL",
            NodeKind::Definition => "DEF",
        }
    )
}
