#![forbid(unsafe_code)]

use super::{TreeStore, descendants_in};
use crate::graph::{Edge, NodeType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeIssue {
    pub code: &'static str,
    pub message: String,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TreeValidation {
    pub ok: bool,
    pub nodes: usize,
    pub edges: usize,
    pub issues: Vec<TreeIssue>,
}

impl TreeStore {
    /// Structural health report. Snapshots loaded from the external store are
    /// accepted as-is, so this is where malformed data becomes visible.
    pub fn validate(&self) -> TreeValidation {
        let mut issues = Vec::new();
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        let tops: Vec<&str> = self
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::TopEvent)
            .map(|n| n.id.as_str())
            .collect();
        if tops.is_empty() && !self.nodes.is_empty() {
            issues.push(TreeIssue {
                code: "NO_TOP_EVENT",
                message: "tree has no top event".to_string(),
                key: String::new(),
            });
        }
        for extra in tops.iter().skip(1) {
            issues.push(TreeIssue {
                code: "MULTIPLE_TOP_EVENTS",
                message: "additional top event".to_string(),
                key: extra.to_string(),
            });
        }

        let mut incoming: HashMap<&str, usize> = HashMap::new();
        for edge in &self.edges {
            if !ids.contains(edge.source_id.as_str()) || !ids.contains(edge.target_id.as_str()) {
                issues.push(TreeIssue {
                    code: "EDGE_ENDPOINT_MISSING",
                    message: "edge endpoint is missing".to_string(),
                    key: edge.id.clone(),
                });
                continue;
            }
            if tops.contains(&edge.target_id.as_str()) {
                issues.push(TreeIssue {
                    code: "TOP_EVENT_HAS_PARENT",
                    message: "top event is the target of an edge".to_string(),
                    key: edge.id.clone(),
                });
            }
            *incoming.entry(edge.target_id.as_str()).or_default() += 1;
        }
        for node in &self.nodes {
            if incoming.get(node.id.as_str()).copied().unwrap_or(0) > 1 {
                issues.push(TreeIssue {
                    code: "MULTIPLE_PARENTS",
                    message: "node has more than one parent edge".to_string(),
                    key: node.id.clone(),
                });
            }
        }

        for edge in self.back_edges() {
            issues.push(TreeIssue {
                code: "CYCLE_DETECTED",
                message: format!("edge {} -> {} closes a cycle", edge.source_id, edge.target_id),
                key: edge.id.clone(),
            });
        }

        let children = self.child_map();
        let mut reachable: HashSet<&str> = tops.iter().copied().collect();
        for top in &tops {
            reachable.extend(descendants_in(&children, top));
        }
        for node in &self.nodes {
            if !reachable.contains(node.id.as_str()) {
                issues.push(TreeIssue {
                    code: "NODE_DETACHED",
                    message: "node is not reachable from the top event".to_string(),
                    key: node.id.clone(),
                });
            }
        }

        TreeValidation {
            ok: issues.is_empty(),
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            issues,
        }
    }

    /// Edges that point back into the current DFS stack.
    fn back_edges(&self) -> Vec<&Edge> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Open,
            Done,
        }

        let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in &self.edges {
            outgoing.entry(edge.source_id.as_str()).or_default().push(edge);
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut back = Vec::new();
        for node in &self.nodes {
            let start = node.id.as_str();
            if marks.contains_key(start) {
                continue;
            }
            marks.insert(start, Mark::Open);
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
            while let Some(&(id, next)) = stack.last() {
                let out = outgoing.get(id).map(Vec::as_slice).unwrap_or(&[]);
                if next < out.len() {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let edge = out[next];
                    let target = edge.target_id.as_str();
                    match marks.get(target) {
                        Some(Mark::Open) => back.push(edge),
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(target, Mark::Open);
                            stack.push((target, 0));
                        }
                    }
                } else {
                    marks.insert(id, Mark::Done);
                    stack.pop();
                }
            }
        }
        back
    }
}
