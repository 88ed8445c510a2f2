//! Minimal BEL graph: typed nodes in a namespace and labeled, deduplicated edges.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

pub const KEGG_NAMESPACE: &str = "kegg";
pub const HGNC_NAMESPACE: &str = "hgnc";
pub const KEGG_GENES_NAMESPACE: &str = "kegg.genes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    Protein,
    Gene,
    BiologicalProcess,
}

impl Function {
    fn short(self) -> &'static str {
        match self {
            Function::Protein => "p",
            Function::Gene => "g",
            Function::BiologicalProcess => "bp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    PartOf,
    Increases,
    Decreases,
    Association,
}

/// A BEL term. Identity is the function, namespace and name; the optional
/// identifier is carried along but ignored for equality.
#[derive(Debug, Clone, Serialize)]
pub struct BelNode {
    pub function: Function,
    pub namespace: String,
    pub name: String,
    pub identifier: Option<String>,
}

impl BelNode {
    pub fn new(function: Function, namespace: &str, name: &str) -> Self {
        Self {
            function,
            namespace: namespace.to_string(),
            name: name.to_string(),
            identifier: None,
        }
    }

    pub fn protein(namespace: &str, name: &str) -> Self {
        Self::new(Function::Protein, namespace, name)
    }

    pub fn gene(namespace: &str, name: &str) -> Self {
        Self::new(Function::Gene, namespace, name)
    }

    pub fn bioprocess(namespace: &str, name: &str) -> Self {
        Self::new(Function::BiologicalProcess, namespace, name)
    }

    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifier = Some(identifier.to_string());
        self
    }
}

impl PartialEq for BelNode {
    fn eq(&self, other: &Self) -> bool {
        self.function == other.function
            && self.namespace == other.namespace
            && self.name == other.name
    }
}

impl Eq for BelNode {}

impl std::hash::Hash for BelNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.function.hash(state);
        self.namespace.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for BelNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:\"{}\")", self.function.short(), self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BelEdge {
    pub source: usize,
    pub target: usize,
    pub relation: Relation,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BelGraph {
    pub name: Option<String>,
    nodes: IndexSet<BelNode>,
    edges: IndexSet<BelEdge>,
}

impl BelGraph {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Adds a node if absent and returns its index.
    pub fn add_node(&mut self, node: BelNode) -> usize {
        self.nodes.insert_full(node).0
    }

    /// Adds an edge between two nodes. An identical edge is stored once.
    pub fn add_edge(&mut self, source: BelNode, target: BelNode, relation: Relation) -> bool {
        let source = self.add_node(source);
        let target = self.add_node(target);
        self.edges.insert(BelEdge {
            source,
            target,
            relation,
        })
    }

    pub fn add_part_of(&mut self, member: BelNode, whole: BelNode) -> bool {
        self.add_edge(member, whole, Relation::PartOf)
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn number_of_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &BelNode> {
        self.nodes.iter()
    }

    pub fn contains(&self, node: &BelNode) -> bool {
        self.nodes.contains(node)
    }

    pub fn edges(&self) -> impl Iterator<Item = (&BelNode, &BelNode, Relation)> {
        self.edges.iter().filter_map(|edge| {
            Some((
                self.nodes.get_index(edge.source)?,
                self.nodes.get_index(edge.target)?,
                edge.relation,
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_edges_are_deduplicated() {
        let mut graph = BelGraph::new("test");
        let pfkp = BelNode::protein(HGNC_NAMESPACE, "PFKP");
        let pathway = BelNode::bioprocess(KEGG_NAMESPACE, "Glycolysis");
        assert!(graph.add_part_of(pfkp.clone(), pathway.clone()));
        assert!(!graph.add_part_of(pfkp.clone(), pathway.clone().with_identifier("hsa00010")));
        assert!(graph.add_edge(pfkp, pathway, Relation::Association));
        assert_eq!(graph.number_of_nodes(), 2);
        assert_eq!(graph.number_of_edges(), 2);
    }
}
