#![forbid(unsafe_code)]

//! Bounded linear undo/redo over tree mutations.
//!
//! Every command carries full before/after state, including ids assigned by
//! the external store, so its inverse is exact.

use crate::graph::{Edge, Node, Position, TreeOp};
use crate::tree::{TreeError, TreeStore};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeUpdate {
    pub before: Node,
    pub after: Node,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeMove {
    pub id: String,
    pub before: Position,
    pub after: Position,
}

impl NodeMove {
    fn swapped(&self) -> Self {
        Self {
            id: self.id.clone(),
            before: self.after,
            after: self.before,
        }
    }
}

/// Positions in node and edge order that removed items held, ascending and
/// parallel to the command's `nodes` / `edges`. Re-adding with slots puts
/// every item back where it was, so sibling order and row order survive a
/// delete and its undo. Empty slots append.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Slots {
    pub nodes: Vec<usize>,
    pub edges: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Nodes plus the edges that attach them.
    AddNode {
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        slots: Slots,
    },
    /// Removed nodes plus every edge that touched them.
    DeleteNode {
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        slots: Slots,
    },
    UpdateNode { updates: Vec<NodeUpdate> },
    MoveNode(NodeMove),
    AddEdge { edge: Edge, slot: Option<usize> },
    DeleteEdge { edge: Edge, slot: Option<usize> },
    BatchMove { moves: Vec<NodeMove> },
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddNode { .. } => "ADD_NODE",
            Self::DeleteNode { .. } => "DELETE_NODE",
            Self::UpdateNode { .. } => "UPDATE_NODE",
            Self::MoveNode(_) => "MOVE_NODE",
            Self::AddEdge { .. } => "ADD_EDGE",
            Self::DeleteEdge { .. } => "DELETE_EDGE",
            Self::BatchMove { .. } => "BATCH_MOVE",
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            Self::AddNode {
                nodes,
                edges,
                slots,
            } => Self::DeleteNode {
                nodes: nodes.clone(),
                edges: edges.clone(),
                slots: slots.clone(),
            },
            Self::DeleteNode {
                nodes,
                edges,
                slots,
            } => Self::AddNode {
                nodes: nodes.clone(),
                edges: edges.clone(),
                slots: slots.clone(),
            },
            Self::UpdateNode { updates } => Self::UpdateNode {
                updates: updates
                    .iter()
                    .rev()
                    .map(|u| NodeUpdate {
                        before: u.after.clone(),
                        after: u.before.clone(),
                    })
                    .collect(),
            },
            Self::MoveNode(m) => Self::MoveNode(m.swapped()),
            Self::AddEdge { edge, slot } => Self::DeleteEdge {
                edge: edge.clone(),
                slot: *slot,
            },
            Self::DeleteEdge { edge, slot } => Self::AddEdge {
                edge: edge.clone(),
                slot: *slot,
            },
            Self::BatchMove { moves } => Self::BatchMove {
                moves: moves.iter().map(NodeMove::swapped).collect(),
            },
        }
    }

    /// Applies the command as one step: on error the tree is left untouched.
    pub fn apply(&self, tree: &mut TreeStore) -> Result<(), TreeError> {
        let mut next = tree.clone();
        self.apply_in_place(&mut next)?;
        *tree = next;
        Ok(())
    }

    fn apply_in_place(&self, tree: &mut TreeStore) -> Result<(), TreeError> {
        match self {
            Self::AddNode {
                nodes,
                edges,
                slots,
            } => {
                for (i, node) in nodes.iter().enumerate() {
                    match slots.nodes.get(i) {
                        Some(&at) => tree.insert_node_at(at, node.clone())?,
                        None => tree.add_node(node.clone())?,
                    }
                }
                for (i, edge) in edges.iter().enumerate() {
                    match slots.edges.get(i) {
                        Some(&at) => tree.insert_edge_at(at, edge.clone())?,
                        None => tree.add_edge(edge.clone())?,
                    }
                }
            }
            Self::DeleteNode { nodes, .. } => {
                let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
                tree.delete_nodes(&ids)?;
            }
            Self::UpdateNode { updates } => {
                for update in updates {
                    tree.replace_node(update.after.clone())?;
                }
            }
            Self::MoveNode(m) => {
                tree.update_node_position(&m.id, m.after)?;
            }
            Self::AddEdge { edge, slot } => match slot {
                Some(at) => tree.insert_edge_at(*at, edge.clone())?,
                None => tree.add_edge(edge.clone())?,
            },
            Self::DeleteEdge { edge, .. } => {
                tree.delete_edge(&edge.id)?;
            }
            Self::BatchMove { moves } => {
                for m in moves {
                    tree.update_node_position(&m.id, m.after)?;
                }
            }
        }
        Ok(())
    }

    /// Persistence operations for this command once applied to `tree`.
    /// Ordered deletes first (edges before nodes), then node upserts, then
    /// edge upserts, so the store never sees an edge without its endpoints.
    pub fn persist_ops(&self, tree: &TreeStore) -> Vec<TreeOp> {
        let current = |id: &str| tree.node(id).cloned();
        let mut ops = Vec::new();
        match self {
            Self::AddNode { nodes, edges, .. } => {
                ops.extend(
                    nodes
                        .iter()
                        .map(|n| TreeOp::NodeUpsert(current(&n.id).unwrap_or_else(|| n.clone()))),
                );
                ops.extend(edges.iter().cloned().map(TreeOp::EdgeUpsert));
            }
            Self::DeleteNode { nodes, edges, .. } => {
                ops.extend(edges.iter().map(|e| TreeOp::EdgeDelete { id: e.id.clone() }));
                ops.extend(nodes.iter().map(|n| TreeOp::NodeDelete { id: n.id.clone() }));
            }
            Self::UpdateNode { updates } => {
                ops.extend(
                    updates
                        .iter()
                        .filter_map(|u| current(&u.after.id))
                        .map(TreeOp::NodeUpsert),
                );
            }
            Self::MoveNode(m) => ops.extend(current(&m.id).map(TreeOp::NodeUpsert)),
            Self::AddEdge { edge, .. } => ops.push(TreeOp::EdgeUpsert(edge.clone())),
            Self::DeleteEdge { edge, .. } => ops.push(TreeOp::EdgeDelete {
                id: edge.id.clone(),
            }),
            Self::BatchMove { moves } => {
                ops.extend(moves.iter().filter_map(|m| current(&m.id)).map(TreeOp::NodeUpsert));
            }
        }
        ops.sort_by_key(op_rank);
        ops
    }
}

fn op_rank(op: &TreeOp) -> u8 {
    match op {
        TreeOp::EdgeDelete { .. } => 0,
        TreeOp::NodeDelete { .. } => 1,
        TreeOp::NodeUpsert(_) => 2,
        TreeOp::EdgeUpsert(_) => 3,
    }
}

#[derive(Clone, Debug)]
pub struct History {
    undo: VecDeque<Command>,
    redo: Vec<Command>,
    capacity: usize,
    replaying: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity,
            replaying: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Records a user mutation and clears the redo stack. Ignored while a
    /// command is being replayed.
    pub fn push(&mut self, command: Command) {
        if self.replaying {
            tracing::debug!(kind = command.kind(), "history push ignored during replay");
            return;
        }
        self.redo.clear();
        self.push_undo(command);
    }

    fn push_undo(&mut self, command: Command) {
        self.undo.push_back(command);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Runs `f` with pushes suppressed.
    pub fn while_replaying<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.replaying, true);
        let out = f(self);
        self.replaying = previous;
        out
    }

    /// Reverts the latest command. Returns the command that was applied to
    /// the tree (the inverse), or `None` when there is nothing to undo. A
    /// command whose inverse no longer applies is dropped.
    pub fn undo(&mut self, tree: &mut TreeStore) -> Result<Option<Command>, TreeError> {
        let Some(command) = self.undo.pop_back() else {
            return Ok(None);
        };
        let inverse = command.inverse();
        match self.while_replaying(|_| inverse.apply(tree)) {
            Ok(()) => {
                self.redo.push(command);
                Ok(Some(inverse))
            }
            Err(err) => {
                tracing::warn!(kind = command.kind(), error = %err, "undo failed; entry dropped");
                Err(err)
            }
        }
    }

    /// Re-applies the latest undone command and returns it.
    pub fn redo(&mut self, tree: &mut TreeStore) -> Result<Option<Command>, TreeError> {
        let Some(command) = self.redo.pop() else {
            return Ok(None);
        };
        match self.while_replaying(|_| command.apply(tree)) {
            Ok(()) => {
                self.push_undo(command.clone());
                Ok(Some(command))
            }
            Err(err) => {
                tracing::warn!(kind = command.kind(), error = %err, "redo failed; entry dropped");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeType, TreeSnapshot};

    fn base() -> TreeStore {
        TreeStore::from_snapshot(TreeSnapshot {
            nodes: vec![
                Node::new("top", NodeType::TopEvent, "Pump Failure"),
                Node::new("a", NodeType::IntermediateEvent, "Mechanical Failure"),
            ],
            edges: vec![Edge::new("e1", "top", "a")],
        })
    }

    fn add_leaf() -> Command {
        Command::AddNode {
            nodes: vec![Node::new("N-7", NodeType::BasicEvent, "Seal worn")],
            edges: vec![Edge::new("E-7", "a", "N-7")],
            slots: Slots::default(),
        }
    }

    #[test]
    fn undo_redo_round_trip_for_add() {
        let mut tree = base();
        let mut history = History::default();
        let cmd = add_leaf();
        cmd.apply(&mut tree).unwrap();
        history.push(cmd);
        let after = tree.snapshot();

        let applied = history.undo(&mut tree).unwrap().unwrap();
        assert_eq!(applied.kind(), "DELETE_NODE");
        assert_eq!(tree.snapshot(), base().snapshot());
        assert!(history.can_redo());

        history.redo(&mut tree).unwrap();
        assert_eq!(tree.snapshot(), after);
        assert!(tree.contains_node("N-7"));
    }

    #[test]
    fn undone_delete_returns_to_its_slot() {
        let mut tree = TreeStore::from_snapshot(TreeSnapshot {
            nodes: vec![
                Node::new("top", NodeType::TopEvent, "Pump Failure"),
                Node::new("a", NodeType::BasicEvent, "Seal worn"),
                Node::new("b", NodeType::BasicEvent, "Bearing seized"),
                Node::new("c", NodeType::BasicEvent, "Impeller cracked"),
            ],
            edges: vec![
                Edge::new("e1", "top", "a"),
                Edge::new("e2", "top", "b"),
                Edge::new("e3", "top", "c"),
            ],
        });
        let original = tree.snapshot();
        let mut history = History::default();

        let cmd = Command::DeleteNode {
            nodes: vec![original.nodes[1].clone()],
            edges: vec![original.edges[0].clone()],
            slots: Slots {
                nodes: vec![1],
                edges: vec![0],
            },
        };
        cmd.apply(&mut tree).unwrap();
        history.push(cmd);
        history.undo(&mut tree).unwrap();
        assert_eq!(tree.snapshot(), original);

        let cmd = Command::DeleteEdge {
            edge: original.edges[1].clone(),
            slot: Some(1),
        };
        cmd.apply(&mut tree).unwrap();
        history.push(cmd);
        history.undo(&mut tree).unwrap();
        let children: Vec<&str> = tree.children("top").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(children, vec!["a", "b", "c"]);
    }

    #[test]
    fn push_clears_redo_and_respects_capacity() {
        let mut tree = base();
        let mut history = History::new(2);
        for i in 0..3 {
            let cmd = Command::MoveNode(NodeMove {
                id: "a".into(),
                before: Position::new(f64::from(i), 0.0),
                after: Position::new(f64::from(i + 1), 0.0),
            });
            cmd.apply(&mut tree).unwrap();
            history.push(cmd);
        }
        assert_eq!(history.undo_len(), 2);
        history.undo(&mut tree).unwrap();
        assert_eq!(history.redo_len(), 1);
        history.push(Command::AddEdge {
            edge: Edge::new("e9", "top", "a"),
            slot: None,
        });
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn pushes_during_replay_are_ignored() {
        let mut history = History::default();
        history.while_replaying(|h| h.push(add_leaf()));
        assert!(!history.can_undo());
        assert!(!history.is_replaying());
    }

    #[test]
    fn batch_move_inverts_atomically() {
        let mut tree = base();
        let cmd = Command::BatchMove {
            moves: vec![
                NodeMove {
                    id: "top".into(),
                    before: Position::default(),
                    after: Position::new(10.0, 0.0),
                },
                NodeMove {
                    id: "a".into(),
                    before: Position::default(),
                    after: Position::new(10.0, 80.0),
                },
            ],
        };
        cmd.apply(&mut tree).unwrap();
        cmd.inverse().apply(&mut tree).unwrap();
        assert_eq!(tree.snapshot(), base().snapshot());

        let broken = Command::BatchMove {
            moves: vec![
                NodeMove {
                    id: "a".into(),
                    before: Position::default(),
                    after: Position::new(1.0, 1.0),
                },
                NodeMove {
                    id: "ghost".into(),
                    before: Position::default(),
                    after: Position::new(1.0, 1.0),
                },
            ],
        };
        assert!(broken.apply(&mut tree).is_err());
        assert_eq!(tree.node("a").unwrap().position, Position::default());
    }

    #[test]
    fn failed_undo_drops_the_entry() {
        let mut tree = base();
        let mut history = History::default();
        history.push(Command::AddEdge {
            edge: Edge::new("e-missing", "top", "a"),
            slot: None,
        });
        assert!(history.undo(&mut tree).is_err());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo(&mut tree).unwrap(), None);
    }

    #[test]
    fn persist_ops_are_ordered_deletes_first() {
        let tree = base();
        let cmd = Command::DeleteNode {
            nodes: vec![Node::new("a", NodeType::IntermediateEvent, "Mechanical Failure")],
            edges: vec![Edge::new("e1", "top", "a")],
            slots: Slots::default(),
        };
        let ops = cmd.persist_ops(&tree);
        assert_eq!(
            ops,
            vec![
                TreeOp::EdgeDelete { id: "e1".into() },
                TreeOp::NodeDelete { id: "a".into() },
            ]
        );

        let ops = add_leaf().persist_ops(&tree);
        assert!(matches!(ops[0], TreeOp::NodeUpsert(_)));
        assert!(matches!(ops[1], TreeOp::EdgeUpsert(_)));
    }
}
