#![forbid(unsafe_code)]

use crate::graph::{Edge, Node, TreeOp, TreeSnapshot};
use crate::ids::AnalysisId;
use std::collections::{BTreeMap, HashMap};

/// The external source of truth a session reads from and writes to.
///
/// Ids come from the backend so an undo/redo cycle can recreate nodes under
/// the same ids.
pub trait TreeBackend {
    type Error: std::fmt::Display;

    fn load_tree(&mut self, analysis: &AnalysisId) -> Result<TreeSnapshot, Self::Error>;
    fn allocate_node_id(&mut self, analysis: &AnalysisId) -> Result<String, Self::Error>;
    fn allocate_edge_id(&mut self, analysis: &AnalysisId) -> Result<String, Self::Error>;
    fn persist(&mut self, analysis: &AnalysisId, ops: &[TreeOp]) -> Result<(), Self::Error>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryBackendError {
    /// Raised once after `fail_next_persist`.
    Injected,
}

impl std::fmt::Display for MemoryBackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Injected => write!(f, "persist rejected"),
        }
    }
}

impl std::error::Error for MemoryBackendError {}

/// One analysis held in memory. Every id keeps the order key it was first
/// stored with, also after deletion, so a re-inserted node or edge lands
/// back in its old place.
#[derive(Clone, Debug, Default)]
struct MemoryTree {
    snapshot: TreeSnapshot,
    node_ord: HashMap<String, u64>,
    edge_ord: HashMap<String, u64>,
    next_ord: u64,
}

impl MemoryTree {
    fn from_snapshot(snapshot: TreeSnapshot) -> Self {
        let mut tree = Self::default();
        for node in &snapshot.nodes {
            tree.ord_of_node(&node.id);
        }
        for edge in &snapshot.edges {
            tree.ord_of_edge(&edge.id);
        }
        tree.snapshot = snapshot;
        tree
    }

    fn ord_of_node(&mut self, id: &str) -> u64 {
        let next = &mut self.next_ord;
        *self.node_ord.entry(id.to_string()).or_insert_with(|| {
            *next += 1;
            *next
        })
    }

    fn ord_of_edge(&mut self, id: &str) -> u64 {
        let next = &mut self.next_ord;
        *self.edge_ord.entry(id.to_string()).or_insert_with(|| {
            *next += 1;
            *next
        })
    }

    fn upsert_node(&mut self, node: Node) {
        if let Some(slot) = self.snapshot.nodes.iter_mut().find(|n| n.id == node.id) {
            *slot = node;
            return;
        }
        let ord = self.ord_of_node(&node.id);
        let at = self
            .snapshot
            .nodes
            .iter()
            .position(|n| self.node_ord.get(&n.id).is_some_and(|o| *o > ord))
            .unwrap_or(self.snapshot.nodes.len());
        self.snapshot.nodes.insert(at, node);
    }

    fn upsert_edge(&mut self, edge: Edge) {
        if let Some(slot) = self.snapshot.edges.iter_mut().find(|e| e.id == edge.id) {
            *slot = edge;
            return;
        }
        let ord = self.ord_of_edge(&edge.id);
        let at = self
            .snapshot
            .edges
            .iter()
            .position(|e| self.edge_ord.get(&e.id).is_some_and(|o| *o > ord))
            .unwrap_or(self.snapshot.edges.len());
        self.snapshot.edges.insert(at, edge);
    }
}

/// In-process backend keeping one snapshot per analysis.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    trees: BTreeMap<String, MemoryTree>,
    next_node: u64,
    next_edge: u64,
    fail_next: bool,
    persisted: Vec<TreeOp>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(analysis: &AnalysisId, snapshot: TreeSnapshot) -> Self {
        let mut backend = Self::new();
        backend
            .trees
            .insert(analysis.as_str().to_string(), MemoryTree::from_snapshot(snapshot));
        backend
    }

    pub fn snapshot(&self, analysis: &AnalysisId) -> TreeSnapshot {
        self.trees
            .get(analysis.as_str())
            .map(|tree| tree.snapshot.clone())
            .unwrap_or_default()
    }

    /// Every op accepted so far, in order.
    pub fn persisted_ops(&self) -> &[TreeOp] {
        &self.persisted
    }

    pub fn fail_next_persist(&mut self) {
        self.fail_next = true;
    }
}

impl TreeBackend for MemoryBackend {
    type Error = MemoryBackendError;

    fn load_tree(&mut self, analysis: &AnalysisId) -> Result<TreeSnapshot, Self::Error> {
        Ok(self.snapshot(analysis))
    }

    fn allocate_node_id(&mut self, _analysis: &AnalysisId) -> Result<String, Self::Error> {
        self.next_node += 1;
        Ok(format!("N-{}", self.next_node))
    }

    fn allocate_edge_id(&mut self, _analysis: &AnalysisId) -> Result<String, Self::Error> {
        self.next_edge += 1;
        Ok(format!("E-{}", self.next_edge))
    }

    fn persist(&mut self, analysis: &AnalysisId, ops: &[TreeOp]) -> Result<(), Self::Error> {
        if std::mem::take(&mut self.fail_next) {
            return Err(MemoryBackendError::Injected);
        }
        let tree = self.trees.entry(analysis.as_str().to_string()).or_default();
        for op in ops {
            match op {
                // collapse is view state and is not stored
                TreeOp::NodeUpsert(node) => tree.upsert_node(Node {
                    collapsed: false,
                    ..node.clone()
                }),
                TreeOp::NodeDelete { id } => {
                    tree.snapshot.nodes.retain(|n| &n.id != id);
                    tree.snapshot.edges.retain(|e| !e.touches(id));
                }
                TreeOp::EdgeUpsert(edge) => tree.upsert_edge(edge.clone()),
                TreeOp::EdgeDelete { id } => tree.snapshot.edges.retain(|e| &e.id != id),
            }
        }
        self.persisted.extend_from_slice(ops);
        Ok(())
    }
}
