#![forbid(unsafe_code)]

use fta_core::config::EngineConfig;
use fta_core::graph::{Edge, Node, NodePatch, NodeType, TreeSnapshot};
use fta_core::ids::AnalysisId;
use fta_core::path::TableEdit;
use fta_core::risk::RiskScore;
use fta_core::session::{AnalysisSession, NewNode, SessionError, TableEditOutcome};
use fta_storage::{IssueStatus, SqliteStore};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("fta_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn seeded_store(storage_dir: &PathBuf, analysis: &AnalysisId) -> SqliteStore {
    let mut store = SqliteStore::open(storage_dir).expect("open store");
    store
        .tree_import(
            analysis,
            &TreeSnapshot {
                nodes: vec![
                    Node::new("top", NodeType::TopEvent, "Pump Failure"),
                    Node::new("m1", NodeType::IntermediateEvent, "Mechanical Failure"),
                    Node::new("b1", NodeType::BasicEvent, "Operator error")
                        .with_risk(RiskScore::new(7, 6, 4).expect("score")),
                ],
                edges: vec![Edge::new("e1", "top", "m1"), Edge::new("e2", "m1", "b1")],
            },
        )
        .expect("seed tree");
    store
}

fn leaf_order(session: &AnalysisSession<SqliteStore>) -> Vec<String> {
    session
        .projection()
        .rows
        .iter()
        .map(|row| row.leaf_id.clone())
        .collect()
}

#[test]
fn session_edits_survive_reopen() {
    let storage_dir = temp_dir("session_edits_survive_reopen");
    let analysis = AnalysisId::try_new("pump").expect("analysis id");
    let store = seeded_store(&storage_dir, &analysis);

    let mut session = AnalysisSession::open(store, analysis.clone(), EngineConfig::default())
        .expect("open session");
    let seal = session
        .add_node(NewNode::new(NodeType::BasicEvent, "Seal lip worn 0.3 mm").under("m1"))
        .expect("add node");
    assert_eq!(seal, "NODE-0001");
    session
        .update_node("b1", &NodePatch::label("Bearing preload below 200 N"))
        .expect("update");
    let outcome = session
        .apply_table_edit(&TableEdit::new(
            1,
            "Mechanical Failure",
            "Structural Failure",
            vec![Some("Pump Failure".to_string())],
        ))
        .expect("table edit");
    assert_eq!(outcome, TableEditOutcome::Relabeled(1));
    session.undo().expect("undo table edit");
    drop(session.dispose());

    let store = SqliteStore::open(&storage_dir).expect("reopen store");
    let session =
        AnalysisSession::open(store, analysis, EngineConfig::default()).expect("reopen session");
    let tree = session.tree();
    assert_eq!(tree.parent(&seal).map(|n| n.id.as_str()), Some("m1"));
    assert_eq!(tree.node("b1").map(|n| n.label.as_str()), Some("Bearing preload below 200 N"));
    assert_eq!(tree.node("m1").map(|n| n.label.as_str()), Some("Mechanical Failure"));
    assert_eq!(session.projection().rows.len(), 2);
}

#[test]
fn undone_delete_keeps_row_order_across_reopen() {
    let storage_dir = temp_dir("undone_delete_keeps_row_order_across_reopen");
    let analysis = AnalysisId::try_new("pump").expect("analysis id");
    let store = seeded_store(&storage_dir, &analysis);
    let mut session = AnalysisSession::open(store, analysis.clone(), EngineConfig::default())
        .expect("open session");
    session
        .add_node(NewNode::new(NodeType::BasicEvent, "Seal lip worn").under("m1"))
        .expect("add node");
    let before = leaf_order(&session);
    assert_eq!(before, vec!["b1".to_string(), "NODE-0001".to_string()]);

    session.delete_node("b1").expect("delete");
    session.undo().expect("undo");
    assert_eq!(leaf_order(&session), before);
    drop(session.dispose());

    let store = SqliteStore::open(&storage_dir).expect("reopen store");
    let session =
        AnalysisSession::open(store, analysis, EngineConfig::default()).expect("reopen session");
    assert_eq!(leaf_order(&session), before);
}

#[test]
fn rejected_edit_never_reaches_the_store() {
    let storage_dir = temp_dir("rejected_edit_never_reaches_the_store");
    let analysis = AnalysisId::try_new("pump").expect("analysis id");
    let store = seeded_store(&storage_dir, &analysis);
    let mut session = AnalysisSession::open(store, analysis.clone(), EngineConfig::default())
        .expect("open session");

    let bad = RiskScore {
        severity: Some(11),
        occurrence: None,
        detection: None,
    };
    let err = session.set_risk("b1", bad).expect_err("rejected");
    assert!(matches!(err, SessionError::Tree(_)));
    assert!(!session.history().can_undo());

    let store = session.dispose();
    let stored = store.tree_load(&analysis).expect("load");
    let b1 = stored.nodes.iter().find(|n| n.id == "b1").expect("b1 stored");
    assert_eq!(b1.risk.severity, Some(7));
}

#[test]
fn review_results_are_tracked_in_the_store() {
    let storage_dir = temp_dir("review_results_are_tracked_in_the_store");
    let analysis = AnalysisId::try_new("pump").expect("analysis id");
    let store = seeded_store(&storage_dir, &analysis);
    let session = AnalysisSession::open(store, analysis.clone(), EngineConfig::default())
        .expect("open session");

    let issues = session.review_quality();
    assert!(!issues.is_empty());
    let mut store = session.dispose();
    let summary = store
        .quality_issues_record(&analysis, &issues)
        .expect("record");
    assert_eq!(summary.inserted, issues.len());
    assert_eq!(
        store
            .quality_issues_list(&analysis, Some(IssueStatus::Open))
            .expect("list")
            .len(),
        issues.len()
    );
}
