#![forbid(unsafe_code)]

//! In-memory structural view of one analysis: nodes, parent→child edges,
//! collapse-derived visibility and multi-select.
//!
//! The store is a cache of the external source of truth. Local mutations are
//! applied optimistically; `initialize_from` replaces everything with the
//! authoritative snapshot. All traversals are iterative and carry a visited
//! set so malformed (cyclic) input cannot hang them.

mod error;
mod selection;
mod validate;

pub use error::TreeError;
pub use selection::Selection;
pub use validate::{TreeIssue, TreeValidation};

use crate::graph::{
    Edge, Node, NodePatch, NodeType, Position, TreeSnapshot, normalize_tags, validate_id,
};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Clone, Debug, Default)]
pub struct TreeStore {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    selection: Selection,
    initialized: bool,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: TreeSnapshot) -> Self {
        let mut store = Self::new();
        store.initialize_from(snapshot);
        store
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn top_event(&self) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.node_type == NodeType::TopEvent)
    }

    /// First edge targeting `id` whose source exists.
    pub fn parent_edge(&self, id: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.target_id == id && self.contains_node(&e.source_id))
    }

    pub fn parent(&self, id: &str) -> Option<&Node> {
        self.parent_edge(id).and_then(|e| self.node(&e.source_id))
    }

    /// Direct children in edge insertion order.
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.edges
            .iter()
            .filter(|e| e.source_id == id)
            .filter_map(|e| self.node(&e.target_id))
            .collect()
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn select(&mut self, id: &str, additive: bool) -> Result<(), TreeError> {
        if !self.contains_node(id) {
            return Err(TreeError::UnknownNode(id.to_string()));
        }
        self.selection.click(id, additive);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// source id -> target ids, in edge order, restricted to edges whose
    /// endpoints both exist.
    pub(crate) fn child_map(&self) -> HashMap<&str, Vec<&str>> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        let mut out: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            let (source, target) = (edge.source_id.as_str(), edge.target_id.as_str());
            if ids.contains(source) && ids.contains(target) {
                out.entry(source).or_default().push(target);
            }
        }
        out
    }

    /// All descendants of `id` (excluding `id`), breadth-first.
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let children = self.child_map();
        descendants_in(&children, id)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn children_count(&self, id: &str) -> usize {
        descendants_in(&self.child_map(), id).len()
    }

    /// Ids hidden because some ancestor is collapsed. Overlapping collapsed
    /// subtrees union; a collapsed node itself stays visible.
    pub fn hidden_ids(&self) -> HashSet<String> {
        let children = self.child_map();
        let mut hidden = HashSet::new();
        for node in self.nodes.iter().filter(|n| n.collapsed) {
            for id in descendants_in(&children, &node.id) {
                hidden.insert(id.to_string());
            }
        }
        hidden
    }

    pub fn visible_nodes(&self) -> Vec<&Node> {
        let hidden = self.hidden_ids();
        self.nodes
            .iter()
            .filter(|n| !hidden.contains(&n.id))
            .collect()
    }

    pub fn visible_edges(&self) -> Vec<&Edge> {
        let hidden = self.hidden_ids();
        self.edges
            .iter()
            .filter(|e| !hidden.contains(&e.source_id) && !hidden.contains(&e.target_id))
            .collect()
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), TreeError> {
        self.insert_node_at(self.nodes.len(), node)
    }

    /// Like `add_node` but places the node at `index` in node order, clamped
    /// to the end. Used to put a deleted node back where it was.
    pub fn insert_node_at(&mut self, index: usize, mut node: Node) -> Result<(), TreeError> {
        validate_id(&node.id)?;
        if self.contains_node(&node.id) {
            return Err(TreeError::DuplicateNode(node.id));
        }
        if node.node_type == NodeType::TopEvent && self.top_event().is_some() {
            return Err(TreeError::MultipleTopEvents);
        }
        node.risk.validate()?;
        node.tags = normalize_tags(&node.tags)?;
        self.nodes.insert(index.min(self.nodes.len()), node);
        Ok(())
    }

    /// Applies `patch` and returns the node as it was before.
    pub fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<Node, TreeError> {
        let mut next = self
            .node(id)
            .cloned()
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        patch.apply_to(&mut next);
        self.replace_node(next)
    }

    /// Replaces the stored node with the same id and returns the previous
    /// value. The collapsed flag is view state and survives replacement.
    pub fn replace_node(&mut self, mut next: Node) -> Result<Node, TreeError> {
        let index = self
            .node_index(&next.id)
            .ok_or_else(|| TreeError::UnknownNode(next.id.clone()))?;
        if next.node_type == NodeType::TopEvent && self.nodes[index].node_type != NodeType::TopEvent
        {
            if self.top_event().is_some() {
                return Err(TreeError::MultipleTopEvents);
            }
            if self.edges.iter().any(|e| e.target_id == next.id) {
                return Err(TreeError::EdgeIntoTopEvent(next.id));
            }
        }
        next.risk.validate()?;
        next.tags = normalize_tags(&next.tags)?;
        next.collapsed = self.nodes[index].collapsed;
        Ok(std::mem::replace(&mut self.nodes[index], next))
    }

    /// Removes a node together with every edge that references it.
    pub fn delete_node(&mut self, id: &str) -> Result<(Node, Vec<Edge>), TreeError> {
        let (mut nodes, edges) = self.delete_nodes(&[id])?;
        let node = nodes
            .pop()
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        Ok((node, edges))
    }

    /// All-or-nothing: fails without touching the store if any id is unknown.
    pub fn delete_nodes<S: AsRef<str>>(
        &mut self,
        ids: &[S],
    ) -> Result<(Vec<Node>, Vec<Edge>), TreeError> {
        for id in ids {
            if !self.contains_node(id.as_ref()) {
                return Err(TreeError::UnknownNode(id.as_ref().to_string()));
            }
        }
        let doomed: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();

        let (removed_edges, kept_edges): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| {
                doomed.contains(e.source_id.as_str()) || doomed.contains(e.target_id.as_str())
            });
        self.edges = kept_edges;

        let (removed_nodes, kept_nodes): (Vec<Node>, Vec<Node>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|n| doomed.contains(n.id.as_str()));
        self.nodes = kept_nodes;

        self.selection.retain(|id| !doomed.contains(id));
        Ok((removed_nodes, removed_edges))
    }

    pub fn add_edge(&mut self, edge: Edge) -> Result<(), TreeError> {
        self.insert_edge_at(self.edges.len(), edge)
    }

    /// Like `add_edge` but places the edge at `index` in edge order, clamped
    /// to the end. Edge order is child order.
    pub fn insert_edge_at(&mut self, index: usize, edge: Edge) -> Result<(), TreeError> {
        validate_id(&edge.id)?;
        if self.edge(&edge.id).is_some() {
            return Err(TreeError::DuplicateEdge(edge.id));
        }
        let Some(source) = self.node(&edge.source_id) else {
            return Err(TreeError::UnknownNode(edge.source_id));
        };
        let Some(target) = self.node(&edge.target_id) else {
            return Err(TreeError::UnknownNode(edge.target_id));
        };
        if source.id == target.id {
            return Err(TreeError::SelfLoop(edge.source_id));
        }
        if target.node_type == NodeType::TopEvent {
            return Err(TreeError::EdgeIntoTopEvent(edge.target_id));
        }
        if self
            .edges
            .iter()
            .any(|e| e.source_id == edge.source_id && e.target_id == edge.target_id)
        {
            return Err(TreeError::DuplicateLink {
                source: edge.source_id,
                target: edge.target_id,
            });
        }
        let children = self.child_map();
        if descendants_in(&children, &edge.target_id).contains(&edge.source_id.as_str()) {
            return Err(TreeError::WouldCycle {
                source: edge.source_id,
                target: edge.target_id,
            });
        }
        self.edges.insert(index.min(self.edges.len()), edge);
        Ok(())
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<Edge, TreeError> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| TreeError::UnknownEdge(id.to_string()))?;
        Ok(self.edges.remove(index))
    }

    /// Returns the previous position.
    pub fn update_node_position(
        &mut self,
        id: &str,
        position: Position,
    ) -> Result<Position, TreeError> {
        let index = self
            .node_index(id)
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        Ok(std::mem::replace(&mut self.nodes[index].position, position))
    }

    pub fn set_collapsed(&mut self, id: &str, collapsed: bool) -> Result<(), TreeError> {
        let index = self
            .node_index(id)
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        self.nodes[index].collapsed = collapsed;
        Ok(())
    }

    /// Returns the new collapsed state.
    pub fn toggle_collapsed(&mut self, id: &str) -> Result<bool, TreeError> {
        let index = self
            .node_index(id)
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        let node = &mut self.nodes[index];
        node.collapsed = !node.collapsed;
        Ok(node.collapsed)
    }

    /// Replaces the whole node/edge set with the authoritative snapshot.
    ///
    /// Selection survives only for ids that still exist; on the first load it
    /// starts empty. Collapsed flags of surviving nodes are kept.
    pub fn initialize_from(&mut self, snapshot: TreeSnapshot) {
        let collapsed: HashSet<String> = self
            .nodes
            .iter()
            .filter(|n| n.collapsed)
            .map(|n| n.id.clone())
            .collect();

        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        for node in &mut self.nodes {
            node.collapsed = node.collapsed || collapsed.contains(&node.id);
        }

        if self.initialized {
            let live: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
            self.selection.retain(|id| live.contains(id));
        } else {
            self.selection.clear();
        }
        self.initialized = true;

        tracing::debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            selected = self.selection.len(),
            "tree initialized from snapshot"
        );
    }

    fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

pub(crate) fn descendants_in<'a>(
    children: &HashMap<&'a str, Vec<&'a str>>,
    root: &str,
) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(root);
    let mut queue: VecDeque<&'a str> = children
        .get(root)
        .into_iter()
        .flatten()
        .copied()
        .collect();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        out.push(id);
        if let Some(next) = children.get(id) {
            queue.extend(next.iter().copied());
        }
    }
    out
}

#[cfg(test)]
mod tests;
