use super::*;
use crate::graph::{Edge, Node, NodePatch, NodeType, Position, TreeSnapshot};
use crate::risk::RiskScore;

fn node(id: &str, ty: NodeType, label: &str) -> Node {
    Node::new(id, ty, label)
}

fn edge(id: &str, source: &str, target: &str) -> Edge {
    Edge::new(id, source, target)
}

/// top -> a -> {b -> {d, e}, c}
fn small_tree() -> TreeStore {
    TreeStore::from_snapshot(TreeSnapshot {
        nodes: vec![
            node("top", NodeType::TopEvent, "Pump Failure"),
            node("a", NodeType::IntermediateEvent, "Mechanical Failure"),
            node("b", NodeType::IntermediateEvent, "Bearing Failure"),
            node("c", NodeType::BasicEvent, "Shaft misalignment 0.3 mm"),
            node("d", NodeType::BasicEvent, "Insufficient Lubrication"),
            node("e", NodeType::BasicEvent, "Contaminated grease"),
        ],
        edges: vec![
            edge("e1", "top", "a"),
            edge("e2", "a", "b"),
            edge("e3", "a", "c"),
            edge("e4", "b", "d"),
            edge("e5", "b", "e"),
        ],
    })
}

/// A straight chain of `n` nodes: n0 (top) -> n1 -> ... -> n{n-1}.
fn chain(n: usize) -> TreeStore {
    let mut nodes = vec![node("n0", NodeType::TopEvent, "top")];
    let mut edges = Vec::new();
    for i in 1..n {
        nodes.push(node(&format!("n{i}"), NodeType::IntermediateEvent, &format!("why {i}")));
        edges.push(edge(&format!("e{i}"), &format!("n{}", i - 1), &format!("n{i}")));
    }
    TreeStore::from_snapshot(TreeSnapshot { nodes, edges })
}

#[test]
fn children_count_counts_all_descendants() {
    let tree = small_tree();
    assert_eq!(tree.children_count("top"), 5);
    assert_eq!(tree.children_count("a"), 4);
    assert_eq!(tree.children_count("b"), 2);
    assert_eq!(tree.children_count("d"), 0);
    assert_eq!(tree.children_count("missing"), 0);
}

#[test]
fn collapsing_hides_exactly_the_descendants() {
    let mut tree = small_tree();
    let before = tree.visible_nodes().len();
    let n = tree.children_count("b");

    tree.toggle_collapsed("b").unwrap();
    assert_eq!(tree.visible_nodes().len(), before - n);
    assert!(tree.visible_nodes().iter().any(|n| n.id == "b"));
    assert_eq!(tree.visible_edges().len(), 3);

    tree.toggle_collapsed("b").unwrap();
    assert_eq!(tree.visible_nodes().len(), before);
}

#[test]
fn overlapping_collapsed_ancestors_union() {
    let mut tree = small_tree();
    tree.set_collapsed("b", true).unwrap();
    tree.set_collapsed("a", true).unwrap();
    let visible: Vec<_> = tree.visible_nodes().iter().map(|n| n.id.clone()).collect();
    assert_eq!(visible, vec!["top".to_string(), "a".to_string()]);

    tree.set_collapsed("a", false).unwrap();
    let visible: Vec<_> = tree.visible_nodes().iter().map(|n| n.id.clone()).collect();
    assert_eq!(visible, vec!["top", "a", "b", "c"]);
}

#[test]
fn collapsing_top_of_ten_node_tree_leaves_one_visible() {
    let mut tree = chain(10);
    assert_eq!(tree.visible_nodes().len(), 10);
    tree.toggle_collapsed("n0").unwrap();
    assert_eq!(tree.visible_nodes().len(), 1);
    assert!(tree.visible_edges().is_empty());
}

#[test]
fn deep_chain_traversal_does_not_recurse() {
    let tree = chain(20_000);
    assert_eq!(tree.children_count("n0"), 19_999);
}

#[test]
fn cyclic_input_terminates() {
    let tree = TreeStore::from_snapshot(TreeSnapshot {
        nodes: vec![
            node("x", NodeType::IntermediateEvent, "x"),
            node("y", NodeType::IntermediateEvent, "y"),
        ],
        edges: vec![edge("e1", "x", "y"), edge("e2", "y", "x")],
    });
    assert_eq!(tree.children_count("x"), 1);
}

#[test]
fn delete_node_cascades_edges_and_selection() {
    let mut tree = small_tree();
    tree.select("b", false).unwrap();
    tree.select("c", true).unwrap();

    let (removed, edges) = tree.delete_node("b").unwrap();
    assert_eq!(removed.id, "b");
    let mut edge_ids: Vec<_> = edges.iter().map(|e| e.id.as_str()).collect();
    edge_ids.sort();
    assert_eq!(edge_ids, vec!["e2", "e4", "e5"]);
    assert!(tree.edges().iter().all(|e| !e.touches("b")));
    assert!(!tree.selection().contains("b"));
    assert_eq!(tree.selection().primary(), Some("c"));
}

#[test]
fn delete_nodes_is_all_or_nothing() {
    let mut tree = small_tree();
    let err = tree.delete_nodes(&["c", "nope"]).unwrap_err();
    assert_eq!(err, TreeError::UnknownNode("nope".to_string()));
    assert!(tree.contains_node("c"));

    let (nodes, _) = tree.delete_nodes(&["d", "e"]).unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(tree.nodes().len(), 4);
}

#[test]
fn insert_at_restores_sibling_order() {
    let mut tree = small_tree();
    let original = tree.snapshot();
    let (removed, edges) = tree.delete_node("b").unwrap();
    assert_eq!(tree.children("a").iter().map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["c"]);

    tree.insert_node_at(2, removed).unwrap();
    for (index, edge) in [1, 3, 4].into_iter().zip(edges) {
        tree.insert_edge_at(index, edge).unwrap();
    }
    assert_eq!(tree.snapshot(), original);
    assert_eq!(
        tree.children("a").iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
        vec!["b", "c"]
    );

    tree.insert_edge_at(99, edge("e9", "c", "x")).unwrap_err();
    tree.insert_node_at(99, node("x", NodeType::BasicEvent, "Bolt loose")).unwrap();
    assert_eq!(tree.nodes().last().map(|n| n.id.as_str()), Some("x"));
}

#[test]
fn add_edge_rejects_structural_violations() {
    let mut tree = small_tree();
    assert_eq!(
        tree.add_edge(edge("x1", "d", "a")).unwrap_err(),
        TreeError::WouldCycle {
            source: "d".into(),
            target: "a".into()
        }
    );
    assert_eq!(
        tree.add_edge(edge("x2", "c", "c")).unwrap_err(),
        TreeError::SelfLoop("c".into())
    );
    assert_eq!(
        tree.add_edge(edge("x3", "c", "top")).unwrap_err(),
        TreeError::EdgeIntoTopEvent("top".into())
    );
    assert_eq!(
        tree.add_edge(edge("x4", "a", "b")).unwrap_err(),
        TreeError::DuplicateLink {
            source: "a".into(),
            target: "b".into()
        }
    );
    assert_eq!(
        tree.add_edge(edge("e1", "c", "d")).unwrap_err(),
        TreeError::DuplicateEdge("e1".into())
    );
    assert_eq!(
        tree.add_edge(edge("x5", "c", "ghost")).unwrap_err(),
        TreeError::UnknownNode("ghost".into())
    );
    assert!(tree.add_edge(edge("x6", "c", "d")).is_ok());
}

#[test]
fn single_top_event_is_enforced() {
    let mut tree = small_tree();
    assert_eq!(
        tree.add_node(node("top2", NodeType::TopEvent, "Other")).unwrap_err(),
        TreeError::MultipleTopEvents
    );
    let patch = NodePatch {
        node_type: Some(NodeType::TopEvent),
        ..NodePatch::default()
    };
    assert_eq!(
        tree.update_node("c", &patch).unwrap_err(),
        TreeError::MultipleTopEvents
    );
}

#[test]
fn add_node_normalizes_and_validates() {
    let mut tree = TreeStore::new();
    let mut n = node("n1", NodeType::BasicEvent, "Seal worn");
    n.tags = vec!["Seal".into(), "#seal".into()];
    tree.add_node(n).unwrap();
    assert_eq!(tree.node("n1").unwrap().tags, vec!["seal".to_string()]);

    let bad = node("n2", NodeType::BasicEvent, "x").with_risk(RiskScore {
        severity: Some(11),
        ..RiskScore::default()
    });
    assert!(matches!(
        tree.add_node(bad).unwrap_err(),
        TreeError::InvalidRisk(_)
    ));
    assert!(matches!(
        tree.add_node(node("a|b", NodeType::BasicEvent, "x")).unwrap_err(),
        TreeError::InvalidId(_)
    ));
}

#[test]
fn update_returns_previous_and_keeps_collapse() {
    let mut tree = small_tree();
    tree.set_collapsed("b", true).unwrap();
    let before = tree.update_node("b", &NodePatch::label("Bearing seized")).unwrap();
    assert_eq!(before.label, "Bearing Failure");
    let after = tree.node("b").unwrap();
    assert_eq!(after.label, "Bearing seized");
    assert!(after.collapsed);

    let old = tree
        .update_node_position("b", Position::new(5.0, 6.0))
        .unwrap();
    assert_eq!(old, Position::default());
}

#[test]
fn initialize_preserves_selection_only_for_surviving_ids() {
    let mut tree = small_tree();
    tree.select("c", false).unwrap();
    tree.select("d", true).unwrap();
    tree.set_collapsed("a", true).unwrap();

    let mut snapshot = tree.snapshot();
    snapshot.nodes.retain(|n| n.id != "d");
    snapshot.edges.retain(|e| !e.touches("d"));
    tree.initialize_from(snapshot);

    assert_eq!(tree.selection().ids().len(), 1);
    assert!(tree.selection().contains("c"));
    assert_eq!(tree.selection().primary(), Some("c"));
    assert!(tree.node("a").unwrap().collapsed);
}

#[test]
fn first_initialization_starts_with_empty_selection() {
    let mut tree = TreeStore::new();
    tree.add_node(node("top", NodeType::TopEvent, "t")).unwrap();
    tree.select("top", false).unwrap();
    assert!(!tree.is_initialized());

    tree.initialize_from(TreeSnapshot {
        nodes: vec![node("top", NodeType::TopEvent, "t")],
        edges: Vec::new(),
    });
    assert!(tree.is_initialized());
    assert!(tree.selection().is_empty());
}

#[test]
fn select_rejects_unknown_ids() {
    let mut tree = small_tree();
    assert_eq!(
        tree.select("ghost", false).unwrap_err(),
        TreeError::UnknownNode("ghost".into())
    );
}

#[test]
fn validate_reports_malformed_snapshot() {
    let tree = TreeStore::from_snapshot(TreeSnapshot {
        nodes: vec![
            node("top", NodeType::TopEvent, "t"),
            node("a", NodeType::IntermediateEvent, "a"),
            node("b", NodeType::IntermediateEvent, "b"),
            node("x", NodeType::IntermediateEvent, "x"),
            node("y", NodeType::IntermediateEvent, "y"),
        ],
        edges: vec![
            edge("e1", "top", "a"),
            edge("e2", "top", "b"),
            edge("e3", "a", "b"),
            edge("e4", "x", "y"),
            edge("e5", "y", "x"),
            edge("e6", "a", "ghost"),
        ],
    });
    let report = tree.validate();
    assert!(!report.ok);
    let codes: Vec<_> = report
        .issues
        .iter()
        .map(|i| (i.code, i.key.as_str()))
        .collect();
    assert!(codes.contains(&("EDGE_ENDPOINT_MISSING", "e6")));
    assert!(codes.contains(&("MULTIPLE_PARENTS", "b")));
    assert!(codes.contains(&("CYCLE_DETECTED", "e5")));
    assert!(codes.contains(&("NODE_DETACHED", "x")));
    assert!(codes.contains(&("NODE_DETACHED", "y")));

    assert!(small_tree().validate().ok);
}
