#![forbid(unsafe_code)]

//! Translation between tree structure and the table's why-chain columns.
//!
//! Column 0 is the top event (`failure_mode_top`), column `k` is depth `k`
//! from the root. Upward walks are capped by a hop limit and a visited set.

use crate::graph::NodeType;
use crate::table::MAX_WHY_LEVELS;
use crate::tree::TreeStore;
use std::collections::HashSet;

pub const DEFAULT_MAX_HOPS: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    UnknownNode(String),
    /// The parent chain ends at a node that is not a top event.
    Detached(String),
    CycleDetected(String),
    TooDeep { id: String, max_hops: usize },
}

impl PathError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownNode(_) => "UNKNOWN_NODE",
            Self::Detached(_) => "DETACHED",
            Self::CycleDetected(_) => "CYCLE_DETECTED",
            Self::TooDeep { .. } => "TOO_DEEP",
        }
    }
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::Detached(id) => write!(f, "node {id} does not reach a top event"),
            Self::CycleDetected(id) => write!(f, "parent chain of {id} loops"),
            Self::TooDeep { id, max_hops } => {
                write!(f, "parent chain of {id} exceeds {max_hops} hops")
            }
        }
    }
}

impl std::error::Error for PathError {}

/// Root-to-node chain; `node_ids[0]` is the top event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WhyChain {
    pub node_ids: Vec<String>,
    pub labels: Vec<String>,
}

impl WhyChain {
    pub fn depth(&self) -> usize {
        self.node_ids.len().saturating_sub(1)
    }
}

pub fn why_chain(tree: &TreeStore, id: &str, max_hops: usize) -> Result<WhyChain, PathError> {
    let mut node = tree
        .node(id)
        .ok_or_else(|| PathError::UnknownNode(id.to_string()))?;
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(node.id.as_str());
    let mut chain = vec![node];

    while node.node_type != NodeType::TopEvent {
        let Some(parent) = tree.parent(&node.id) else {
            return Err(PathError::Detached(id.to_string()));
        };
        if chain.len() > max_hops {
            return Err(PathError::TooDeep {
                id: id.to_string(),
                max_hops,
            });
        }
        if !visited.insert(parent.id.as_str()) {
            return Err(PathError::CycleDetected(id.to_string()));
        }
        chain.push(parent);
        node = parent;
    }

    chain.reverse();
    Ok(WhyChain {
        node_ids: chain.iter().map(|n| n.id.clone()).collect(),
        labels: chain.iter().map(|n| n.label.clone()).collect(),
    })
}

/// Root-to-node labels.
pub fn get_path(tree: &TreeStore, id: &str, max_hops: usize) -> Result<Vec<String>, PathError> {
    why_chain(tree, id, max_hops).map(|chain| chain.labels)
}

pub fn depth_of(tree: &TreeStore, id: &str, max_hops: usize) -> Result<usize, PathError> {
    why_chain(tree, id, max_hops).map(|chain| chain.depth())
}

/// Ids of every node `depth` edges below a top event, in first-seen order.
/// Leaves are included even though the table shows them in `leaf_label`
/// rather than a why column. A node reachable along paths of different
/// lengths appears at each of those depths.
pub fn nodes_at_depth(tree: &TreeStore, depth: usize) -> Vec<String> {
    let children = tree.child_map();
    let mut layer: Vec<&str> = tree
        .nodes()
        .iter()
        .filter(|n| n.node_type == NodeType::TopEvent)
        .map(|n| n.id.as_str())
        .collect();
    for _ in 0..depth {
        let mut seen = HashSet::new();
        let mut next = Vec::new();
        for id in &layer {
            for child in children.get(id).into_iter().flatten() {
                if seen.insert(*child) {
                    next.push(*child);
                }
            }
        }
        if next.is_empty() {
            return Vec::new();
        }
        layer = next;
    }
    layer.into_iter().map(str::to_string).collect()
}

/// An edit typed into why-column `position` of one table row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableEdit {
    pub position: usize,
    /// Previous cell text; empty for a blank cell.
    pub old_label: String,
    pub new_label: String,
    /// The row's cells for columns `0..position` (failure_mode_top first).
    pub row_context: Vec<Option<String>>,
}

impl TableEdit {
    pub fn new(
        position: usize,
        old_label: impl Into<String>,
        new_label: impl Into<String>,
        row_context: Vec<Option<String>>,
    ) -> Self {
        Self {
            position,
            old_label: old_label.into(),
            new_label: new_label.into(),
            row_context,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoOpReason {
    EmptyLabel,
    Unchanged,
    OutOfRange,
    /// The row does not carry enough ancestor labels to place new nodes.
    MissingContext,
    /// The whole chain, including the new label, already exists.
    AlreadyPresent,
}

impl NoOpReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyLabel => "empty_label",
            Self::Unchanged => "unchanged",
            Self::OutOfRange => "out_of_range",
            Self::MissingContext => "missing_context",
            Self::AlreadyPresent => "already_present",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableEditPlan {
    /// Every node at the edited depth carrying the old label.
    Relabel {
        node_ids: Vec<String>,
        new_label: String,
    },
    /// Create `labels` as a parent-to-child chain under `parent_id`. A `None`
    /// parent means the first label becomes the top event.
    CreateChain {
        parent_id: Option<String>,
        labels: Vec<String>,
    },
    NoOp(NoOpReason),
}

/// Decides what a table edit does to the tree.
///
/// Cells that share a label at the same depth are rendered as one merged
/// cell, so a relabel applies to all of them. When nothing carries the old
/// label the row's ancestor chain is walked from the top event, reusing an
/// existing same-label child at every depth; only the missing tail is
/// created. Labels compare with surrounding whitespace ignored. Must be
/// called against current state right before applying.
pub fn resolve_table_edit(tree: &TreeStore, edit: &TableEdit) -> TableEditPlan {
    let new_label = edit.new_label.trim();
    if new_label.is_empty() {
        return TableEditPlan::NoOp(NoOpReason::EmptyLabel);
    }
    if edit.position > MAX_WHY_LEVELS {
        return TableEditPlan::NoOp(NoOpReason::OutOfRange);
    }
    let old_label = edit.old_label.trim();
    if old_label == new_label {
        return TableEditPlan::NoOp(NoOpReason::Unchanged);
    }

    if !old_label.is_empty() {
        let node_ids: Vec<String> = nodes_at_depth(tree, edit.position)
            .into_iter()
            .filter(|id| tree.node(id).is_some_and(|n| n.label.trim() == old_label))
            .collect();
        if !node_ids.is_empty() {
            return TableEditPlan::Relabel {
                node_ids,
                new_label: new_label.to_string(),
            };
        }
    }

    plan_chain(tree, edit.position, &edit.row_context, new_label)
}

fn plan_chain(
    tree: &TreeStore,
    position: usize,
    row_context: &[Option<String>],
    new_label: &str,
) -> TableEditPlan {
    let context_label = |depth: usize| {
        row_context
            .get(depth)
            .and_then(|cell| cell.as_deref())
            .map(str::trim)
            .filter(|label| !label.is_empty())
    };

    let top = tree.top_event();
    if position == 0 {
        return match top {
            None => TableEditPlan::CreateChain {
                parent_id: None,
                labels: vec![new_label.to_string()],
            },
            Some(top) if top.label.trim() == new_label => {
                TableEditPlan::NoOp(NoOpReason::AlreadyPresent)
            }
            Some(_) => TableEditPlan::NoOp(NoOpReason::MissingContext),
        };
    }

    let Some(root_label) = context_label(0) else {
        return TableEditPlan::NoOp(NoOpReason::MissingContext);
    };
    let mut missing: Vec<String> = Vec::new();
    let parent_id = match top {
        Some(top) if top.label.trim() == root_label => {
            let mut current = top.id.as_str();
            for depth in 1..position {
                let Some(label) = context_label(depth) else {
                    return TableEditPlan::NoOp(NoOpReason::MissingContext);
                };
                if !missing.is_empty() {
                    missing.push(label.to_string());
                    continue;
                }
                match tree.children(current).into_iter().find(|c| c.label.trim() == label) {
                    Some(child) => current = child.id.as_str(),
                    None => missing.push(label.to_string()),
                }
            }
            if missing.is_empty()
                && tree
                    .children(current)
                    .iter()
                    .any(|c| c.label.trim() == new_label)
            {
                return TableEditPlan::NoOp(NoOpReason::AlreadyPresent);
            }
            Some(current.to_string())
        }
        Some(_) => return TableEditPlan::NoOp(NoOpReason::MissingContext),
        None => {
            for depth in 0..position {
                let Some(label) = context_label(depth) else {
                    return TableEditPlan::NoOp(NoOpReason::MissingContext);
                };
                missing.push(label.to_string());
            }
            None
        }
    };

    missing.push(new_label.to_string());
    TableEditPlan::CreateChain {
        parent_id,
        labels: missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, TreeSnapshot};

    fn pump_tree() -> TreeStore {
        TreeStore::from_snapshot(TreeSnapshot {
            nodes: vec![
                Node::new("top", NodeType::TopEvent, "Pump Failure"),
                Node::new("m1", NodeType::IntermediateEvent, "Mechanical Failure"),
                Node::new("b1", NodeType::IntermediateEvent, "Bearing Failure"),
                Node::new("l1", NodeType::BasicEvent, "Insufficient Lubrication"),
                Node::new("e1", NodeType::IntermediateEvent, "Electrical Failure"),
                Node::new("m2", NodeType::IntermediateEvent, "Mechanical Failure"),
            ],
            edges: vec![
                Edge::new("x1", "top", "m1"),
                Edge::new("x2", "m1", "b1"),
                Edge::new("x3", "b1", "l1"),
                Edge::new("x4", "top", "e1"),
                Edge::new("x5", "e1", "m2"),
            ],
        })
    }

    #[test]
    fn path_walks_to_the_top_event() {
        let tree = pump_tree();
        assert_eq!(
            get_path(&tree, "l1", DEFAULT_MAX_HOPS).unwrap(),
            vec![
                "Pump Failure",
                "Mechanical Failure",
                "Bearing Failure",
                "Insufficient Lubrication"
            ]
        );
        assert_eq!(depth_of(&tree, "top", DEFAULT_MAX_HOPS).unwrap(), 0);
        assert_eq!(depth_of(&tree, "m2", DEFAULT_MAX_HOPS).unwrap(), 2);
    }

    #[test]
    fn path_errors_are_bounded() {
        let tree = TreeStore::from_snapshot(TreeSnapshot {
            nodes: vec![
                Node::new("a", NodeType::IntermediateEvent, "a"),
                Node::new("b", NodeType::IntermediateEvent, "b"),
                Node::new("c", NodeType::IntermediateEvent, "c"),
            ],
            edges: vec![Edge::new("e1", "a", "b"), Edge::new("e2", "b", "a")],
        });
        assert_eq!(
            why_chain(&tree, "a", DEFAULT_MAX_HOPS).unwrap_err(),
            PathError::CycleDetected("a".into())
        );
        assert_eq!(
            why_chain(&tree, "c", DEFAULT_MAX_HOPS).unwrap_err(),
            PathError::Detached("c".into())
        );
        assert_eq!(
            why_chain(&tree, "zz", DEFAULT_MAX_HOPS).unwrap_err().code(),
            "UNKNOWN_NODE"
        );
        assert!(matches!(
            why_chain(&pump_tree(), "l1", 2).unwrap_err(),
            PathError::TooDeep { max_hops: 2, .. }
        ));
    }

    #[test]
    fn relabel_targets_every_match_at_depth() {
        let tree = pump_tree();
        let plan = resolve_table_edit(
            &tree,
            &TableEdit::new(1, "Mechanical Failure", "Structural Failure", vec![]),
        );
        assert_eq!(
            plan,
            TableEditPlan::Relabel {
                node_ids: vec!["m1".into()],
                new_label: "Structural Failure".into(),
            }
        );

        let plan = resolve_table_edit(
            &tree,
            &TableEdit::new(2, "Mechanical Failure", "Seal Failure", vec![]),
        );
        assert_eq!(
            plan,
            TableEditPlan::Relabel {
                node_ids: vec!["m2".into()],
                new_label: "Seal Failure".into(),
            }
        );
    }

    #[test]
    fn padded_labels_still_match_their_cell() {
        let tree = TreeStore::from_snapshot(TreeSnapshot {
            nodes: vec![
                Node::new("top", NodeType::TopEvent, "Pump Failure "),
                Node::new("m", NodeType::IntermediateEvent, "Mechanical Failure "),
                Node::new("x", NodeType::BasicEvent, "Seal worn"),
            ],
            edges: vec![Edge::new("e1", "top", "m"), Edge::new("e2", "m", "x")],
        });
        let context = vec![Some("Pump Failure ".to_string())];
        let plan = resolve_table_edit(
            &tree,
            &TableEdit::new(1, "Mechanical Failure ", "Structural Failure", context),
        );
        assert_eq!(
            plan,
            TableEditPlan::Relabel {
                node_ids: vec!["m".into()],
                new_label: "Structural Failure".into(),
            }
        );

        let context = vec![
            Some("Pump Failure".to_string()),
            Some("Mechanical Failure".to_string()),
        ];
        let plan = resolve_table_edit(&tree, &TableEdit::new(2, "", "Seal worn", context));
        assert_eq!(plan, TableEditPlan::NoOp(NoOpReason::AlreadyPresent));
    }

    #[test]
    fn blank_cell_reuses_existing_prefix() {
        let tree = pump_tree();
        let context = vec![
            Some("Pump Failure".to_string()),
            Some("Mechanical Failure".to_string()),
            Some("Seal Failure".to_string()),
        ];
        let plan = resolve_table_edit(&tree, &TableEdit::new(3, "", "Worn lip", context));
        assert_eq!(
            plan,
            TableEditPlan::CreateChain {
                parent_id: Some("m1".into()),
                labels: vec!["Seal Failure".into(), "Worn lip".into()],
            }
        );
    }

    #[test]
    fn blank_cell_with_existing_chain_is_noop() {
        let tree = pump_tree();
        let context = vec![
            Some("Pump Failure".to_string()),
            Some("Mechanical Failure".to_string()),
        ];
        let plan = resolve_table_edit(&tree, &TableEdit::new(2, "", "Bearing Failure", context));
        assert_eq!(plan, TableEditPlan::NoOp(NoOpReason::AlreadyPresent));
    }

    #[test]
    fn edits_without_usable_context_do_nothing() {
        let tree = pump_tree();
        let cases = [
            (TableEdit::new(1, "Mechanical Failure", "  ", vec![]), NoOpReason::EmptyLabel),
            (TableEdit::new(1, "Same", "Same", vec![]), NoOpReason::Unchanged),
            (TableEdit::new(10, "", "x", vec![]), NoOpReason::OutOfRange),
            (TableEdit::new(2, "Nope", "x", vec![]), NoOpReason::MissingContext),
            (
                TableEdit::new(
                    2,
                    "",
                    "x",
                    vec![Some("Other Top".into()), Some("Mechanical Failure".into())],
                ),
                NoOpReason::MissingContext,
            ),
            (
                TableEdit::new(2, "", "x", vec![Some("Pump Failure".into()), None]),
                NoOpReason::MissingContext,
            ),
            (TableEdit::new(0, "", "Second Top", vec![]), NoOpReason::MissingContext),
        ];
        for (edit, reason) in cases {
            assert_eq!(
                resolve_table_edit(&tree, &edit),
                TableEditPlan::NoOp(reason),
                "{edit:?}"
            );
        }
    }

    #[test]
    fn empty_tree_creates_from_the_top() {
        let tree = TreeStore::new();
        let plan = resolve_table_edit(
            &tree,
            &TableEdit::new(1, "", "Seal leak", vec![Some("Pump Failure".into())]),
        );
        assert_eq!(
            plan,
            TableEditPlan::CreateChain {
                parent_id: None,
                labels: vec!["Pump Failure".into(), "Seal leak".into()],
            }
        );
    }
}
