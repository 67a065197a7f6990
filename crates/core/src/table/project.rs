#![forbid(unsafe_code)]

use super::{MAX_WHY_LEVELS, TableRow};
use crate::graph::{Node, NodeType};
use crate::risk::{ApRule, resolve_ap_category};
use crate::tree::TreeStore;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProjectionReport {
    /// Leaves not reachable from any top event.
    pub skipped_leaves: Vec<String>,
    /// Rows whose chain was deeper than the why columns allow.
    pub truncated_rows: usize,
    /// Deepest leaf depth seen.
    pub max_depth: usize,
    /// Edges ignored because they would revisit a node on the current path.
    pub cycle_edges: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection {
    pub rows: Vec<TableRow>,
    pub report: ProjectionReport,
}

fn is_leaf(node: &Node, children: &HashMap<&str, Vec<&str>>) -> bool {
    node.node_type == NodeType::BasicEvent
        || children.get(node.id.as_str()).is_none_or(|c| c.is_empty())
}

/// Flattens the tree into one row per root-to-leaf path.
///
/// Rows come out in depth-first pre-order from each top event with children
/// in edge order, which is what row-span grouping relies on. A basic event
/// with children still gets a row and its subtree is still walked. Malformed
/// parts (cycles, unreachable leaves) are left out of the table and counted
/// in the report.
pub fn project(tree: &TreeStore, rules: &[ApRule]) -> Projection {
    let children = tree.child_map();
    let by_id: HashMap<&str, &Node> = tree.nodes().iter().map(|n| (n.id.as_str(), n)).collect();
    let mut report = ProjectionReport::default();
    let mut rows = Vec::new();
    let mut reached: HashSet<&str> = HashSet::new();

    for top in tree
        .nodes()
        .iter()
        .filter(|n| n.node_type == NodeType::TopEvent)
    {
        let mut path: Vec<&Node> = Vec::new();
        let mut stack: Vec<(&str, usize)> = vec![(top.id.as_str(), 0)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = by_id.get(id).copied() else {
                continue;
            };
            path.truncate(depth);
            if path.iter().any(|n| n.id == node.id) {
                report.cycle_edges += 1;
                tracing::debug!(node = id, "cycle in cause tree skipped during projection");
                continue;
            }
            path.push(node);
            reached.insert(id);

            if is_leaf(node, &children) {
                let row = build_row(&path, rules);
                if row.truncated_levels > 0 {
                    report.truncated_rows += 1;
                }
                report.max_depth = report.max_depth.max(depth);
                rows.push(row);
            }
            if let Some(next) = children.get(id) {
                stack.extend(next.iter().rev().map(|child| (*child, depth + 1)));
            }
        }
    }

    report.skipped_leaves = tree
        .nodes()
        .iter()
        .filter(|n| n.node_type != NodeType::TopEvent)
        .filter(|n| is_leaf(n, &children) && !reached.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();
    if !report.skipped_leaves.is_empty() {
        tracing::debug!(
            count = report.skipped_leaves.len(),
            "leaves unreachable from a top event left out of the table"
        );
    }
    if report.truncated_rows > 0 {
        tracing::warn!(
            rows = report.truncated_rows,
            max_depth = report.max_depth,
            max_levels = MAX_WHY_LEVELS,
            "cause chains deeper than the why columns were truncated"
        );
    }

    Projection { rows, report }
}

/// `path` runs from the top event to the leaf.
fn build_row(path: &[&Node], rules: &[ApRule]) -> TableRow {
    let (leaf, ancestors) = match path.split_last() {
        Some((leaf, rest)) if !rest.is_empty() => (*leaf, rest),
        Some((leaf, _)) => (*leaf, path),
        None => return TableRow::default(),
    };

    let mut row = TableRow {
        failure_mode_top: ancestors[0].label.clone(),
        leaf_id: leaf.id.clone(),
        leaf_label: leaf.label.clone(),
        leaf_type: Some(leaf.node_type),
        path_ids: path.iter().map(|n| n.id.clone()).collect(),
        severity: leaf.risk.severity,
        occurrence: leaf.risk.occurrence,
        detection: leaf.risk.detection,
        rpn: leaf.risk.rpn(),
        units: leaf.units.clone(),
        specification: leaf.specification.clone(),
        notes: leaf.notes.clone(),
        evidence_status: leaf.evidence_status,
        action: leaf.action.clone(),
        ..TableRow::default()
    };
    for (level, node) in ancestors.iter().enumerate().skip(1) {
        match row.whys.get_mut(level - 1) {
            Some(slot) => *slot = Some(node.label.clone()),
            None => row.truncated_levels += 1,
        }
    }
    if let Some(result) = resolve_ap_category(rules, &leaf.risk) {
        row.ap_category = Some(result.category.clone());
        row.ap_priority = Some(result.priority);
        row.ap_color = Some(result.color.clone());
    }
    row
}
