#![forbid(unsafe_code)]

use super::{
    SqliteStore, StoreError, ensure_analysis_tx, next_counter_tx, now_ms, touch_analysis_tx,
};
use fta_core::fields::FieldValue;
use fta_core::graph::{
    ActionItem, Edge, EvidenceStatus, GateType, Node, NodeType, Position, TreeOp, TreeSnapshot,
};
use fta_core::ids::AnalysisId;
use fta_core::risk::RiskScore;
use rusqlite::{OptionalExtension, Transaction, params};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdKind {
    Node,
    Edge,
}

impl IdKind {
    fn counter(self) -> &'static str {
        match self {
            Self::Node => "node_seq",
            Self::Edge => "edge_seq",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Self::Node => "NODE",
            Self::Edge => "EDGE",
        }
    }

    fn ord_counter(self) -> &'static str {
        match self {
            Self::Node => "node_ord",
            Self::Edge => "edge_ord",
        }
    }

    fn retired_kind(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
        }
    }

    fn table(self) -> &'static str {
        match self {
            Self::Node => "tree_nodes",
            Self::Edge => "tree_edges",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeApplySummary {
    pub nodes_upserted: usize,
    pub nodes_deleted: usize,
    pub edges_upserted: usize,
    pub edges_deleted: usize,
}

impl SqliteStore {
    /// Allocates the next id of `kind` for the analysis. Ids are never
    /// reused, even after the node or edge is deleted.
    pub fn allocate_id(
        &mut self,
        analysis: &AnalysisId,
        kind: IdKind,
    ) -> Result<String, StoreError> {
        let tx = self.conn.transaction()?;
        ensure_analysis_tx(&tx, analysis.as_str(), now_ms())?;
        let id = allocate_id_tx(&tx, analysis.as_str(), kind)?;
        tx.commit()?;
        Ok(id)
    }

    /// Current node and edge sets in insertion order. An unknown analysis
    /// loads as an empty tree.
    pub fn tree_load(&self, analysis: &AnalysisId) -> Result<TreeSnapshot, StoreError> {
        let mut nodes = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT id, node_type, label, pos_x, pos_y, units, specification, notes, tags_json, \
                    evidence_status, gate_type, severity, occurrence, detection, action_json, custom_fields_json \
             FROM tree_nodes WHERE analysis=?1 ORDER BY ord ASC",
        )?;
        let mut rows = stmt.query(params![analysis.as_str()])?;
        while let Some(row) = rows.next()? {
            let id = row.get::<_, String>(0)?;
            let corrupt = |message: &'static str| StoreError::CorruptRow {
                table: "tree_nodes",
                id: id.clone(),
                message,
            };
            let node_type = NodeType::parse(&row.get::<_, String>(1)?)
                .ok_or_else(|| corrupt("invalid node_type"))?;
            let evidence_status = match row.get::<_, Option<String>>(9)? {
                Some(raw) => Some(
                    EvidenceStatus::parse(&raw)
                        .ok_or_else(|| corrupt("invalid evidence_status"))?,
                ),
                None => None,
            };
            let gate_type = parse_gate(row.get::<_, Option<String>>(10)?).map_err(corrupt)?;
            let action = match row.get::<_, Option<String>>(14)? {
                Some(raw) => Some(serde_json::from_str::<ActionItem>(&raw)?),
                None => None,
            };
            let tags: Vec<String> = serde_json::from_str(&row.get::<_, String>(8)?)?;
            let custom_fields: BTreeMap<String, FieldValue> =
                serde_json::from_str(&row.get::<_, String>(15)?)?;

            nodes.push(Node {
                node_type,
                label: row.get(2)?,
                position: Position::new(row.get(3)?, row.get(4)?),
                units: row.get(5)?,
                specification: row.get(6)?,
                notes: row.get(7)?,
                tags,
                evidence_status,
                gate_type,
                collapsed: false,
                risk: RiskScore {
                    severity: row.get(11)?,
                    occurrence: row.get(12)?,
                    detection: row.get(13)?,
                },
                action,
                custom_fields,
                id,
            });
        }

        let mut edges = Vec::new();
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, target_id, gate_type FROM tree_edges WHERE analysis=?1 ORDER BY ord ASC",
        )?;
        let mut rows = stmt.query(params![analysis.as_str()])?;
        while let Some(row) = rows.next()? {
            let id = row.get::<_, String>(0)?;
            let gate_type = parse_gate(row.get::<_, Option<String>>(3)?).map_err(|message| {
                StoreError::CorruptRow {
                    table: "tree_edges",
                    id: id.clone(),
                    message,
                }
            })?;
            edges.push(Edge {
                id,
                source_id: row.get(1)?,
                target_id: row.get(2)?,
                gate_type,
            });
        }

        Ok(TreeSnapshot { nodes, edges })
    }

    /// Applies persistence ops in one transaction; either all land or none.
    /// Deleting a node also deletes every edge touching it. A deleted node or
    /// edge that is upserted again keeps its old position in load order.
    pub fn tree_apply_ops(
        &mut self,
        analysis: &AnalysisId,
        ops: &[TreeOp],
    ) -> Result<TreeApplySummary, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        ensure_analysis_tx(&tx, analysis.as_str(), now_ms)?;

        let mut summary = TreeApplySummary::default();
        for op in ops {
            match op {
                TreeOp::NodeUpsert(node) => {
                    upsert_node_tx(&tx, analysis.as_str(), node, now_ms)?;
                    summary.nodes_upserted += 1;
                }
                TreeOp::NodeDelete { id } => {
                    tx.execute(
                        "INSERT OR REPLACE INTO tree_retired(analysis, kind, id, ord) \
                         SELECT analysis, 'edge', id, ord FROM tree_edges \
                         WHERE analysis=?1 AND (source_id=?2 OR target_id=?2)",
                        params![analysis.as_str(), id],
                    )?;
                    tx.execute(
                        "DELETE FROM tree_edges WHERE analysis=?1 AND (source_id=?2 OR target_id=?2)",
                        params![analysis.as_str(), id],
                    )?;
                    retire_tx(&tx, analysis.as_str(), IdKind::Node, id)?;
                    summary.nodes_deleted += tx.execute(
                        "DELETE FROM tree_nodes WHERE analysis=?1 AND id=?2",
                        params![analysis.as_str(), id],
                    )?;
                }
                TreeOp::EdgeUpsert(edge) => {
                    upsert_edge_tx(&tx, analysis.as_str(), edge)?;
                    summary.edges_upserted += 1;
                }
                TreeOp::EdgeDelete { id } => {
                    retire_tx(&tx, analysis.as_str(), IdKind::Edge, id)?;
                    summary.edges_deleted += tx.execute(
                        "DELETE FROM tree_edges WHERE analysis=?1 AND id=?2",
                        params![analysis.as_str(), id],
                    )?;
                }
            }
        }

        touch_analysis_tx(&tx, analysis.as_str(), now_ms)?;
        tx.commit()?;
        tracing::debug!(
            analysis = %analysis,
            ops = ops.len(),
            nodes_upserted = summary.nodes_upserted,
            nodes_deleted = summary.nodes_deleted,
            edges_upserted = summary.edges_upserted,
            edges_deleted = summary.edges_deleted,
            "tree ops applied"
        );
        Ok(summary)
    }

    /// Replaces the whole stored tree with `snapshot`.
    pub fn tree_import(
        &mut self,
        analysis: &AnalysisId,
        snapshot: &TreeSnapshot,
    ) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        ensure_analysis_tx(&tx, analysis.as_str(), now_ms)?;
        tx.execute(
            "DELETE FROM tree_edges WHERE analysis=?1",
            params![analysis.as_str()],
        )?;
        tx.execute(
            "DELETE FROM tree_nodes WHERE analysis=?1",
            params![analysis.as_str()],
        )?;
        tx.execute(
            "DELETE FROM tree_retired WHERE analysis=?1",
            params![analysis.as_str()],
        )?;
        for node in &snapshot.nodes {
            upsert_node_tx(&tx, analysis.as_str(), node, now_ms)?;
        }
        for edge in &snapshot.edges {
            upsert_edge_tx(&tx, analysis.as_str(), edge)?;
        }
        touch_analysis_tx(&tx, analysis.as_str(), now_ms)?;
        tx.commit()?;
        Ok(())
    }
}

pub(super) fn allocate_id_tx(
    tx: &Transaction<'_>,
    analysis: &str,
    kind: IdKind,
) -> Result<String, StoreError> {
    let seq = next_counter_tx(tx, analysis, kind.counter())?;
    Ok(format!("{}-{:04}", kind.prefix(), seq))
}

fn parse_gate(raw: Option<String>) -> Result<Option<GateType>, &'static str> {
    match raw {
        Some(raw) => GateType::parse(&raw).map(Some).ok_or("invalid gate_type"),
        None => Ok(None),
    }
}

/// Remembers the order key of a row about to be deleted.
fn retire_tx(
    tx: &Transaction<'_>,
    analysis: &str,
    kind: IdKind,
    id: &str,
) -> Result<(), StoreError> {
    tx.execute(
        &format!(
            "INSERT OR REPLACE INTO tree_retired(analysis, kind, id, ord) \
             SELECT analysis, ?3, id, ord FROM {} WHERE analysis=?1 AND id=?2",
            kind.table()
        ),
        params![analysis, id, kind.retired_kind()],
    )?;
    Ok(())
}

/// Order key for a row being inserted: its retired key when it is coming
/// back, otherwise a fresh one.
fn claim_ord_tx(
    tx: &Transaction<'_>,
    analysis: &str,
    kind: IdKind,
    id: &str,
) -> Result<i64, StoreError> {
    let retired = tx
        .query_row(
            "SELECT ord FROM tree_retired WHERE analysis=?1 AND kind=?2 AND id=?3",
            params![analysis, kind.retired_kind(), id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    match retired {
        Some(ord) => {
            tx.execute(
                "DELETE FROM tree_retired WHERE analysis=?1 AND kind=?2 AND id=?3",
                params![analysis, kind.retired_kind(), id],
            )?;
            Ok(ord)
        }
        None => next_counter_tx(tx, analysis, kind.ord_counter()),
    }
}

fn node_exists_tx(tx: &Transaction<'_>, analysis: &str, id: &str) -> Result<bool, StoreError> {
    Ok(tx
        .query_row(
            "SELECT 1 FROM tree_nodes WHERE analysis=?1 AND id=?2",
            params![analysis, id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn upsert_node_tx(
    tx: &Transaction<'_>,
    analysis: &str,
    node: &Node,
    now_ms: i64,
) -> Result<(), StoreError> {
    if node.id.trim().is_empty() {
        return Err(StoreError::InvalidInput("node id must not be empty"));
    }
    node.risk
        .validate()
        .map_err(|_| StoreError::InvalidInput("risk score out of range"))?;
    let tags_json = serde_json::to_string(&node.tags)?;
    let action_json = node.action.as_ref().map(serde_json::to_string).transpose()?;
    let custom_fields_json = serde_json::to_string(&node.custom_fields)?;

    let updated = tx.execute(
        "UPDATE tree_nodes SET node_type=?3, label=?4, pos_x=?5, pos_y=?6, units=?7, specification=?8, notes=?9, \
                tags_json=?10, evidence_status=?11, gate_type=?12, severity=?13, occurrence=?14, detection=?15, \
                action_json=?16, custom_fields_json=?17, updated_at_ms=?18 \
         WHERE analysis=?1 AND id=?2",
        params![
            analysis,
            node.id,
            node.node_type.as_str(),
            node.label,
            node.position.x,
            node.position.y,
            node.units,
            node.specification,
            node.notes,
            tags_json,
            node.evidence_status.map(EvidenceStatus::as_str),
            node.gate_type.map(GateType::as_str),
            node.risk.severity,
            node.risk.occurrence,
            node.risk.detection,
            action_json,
            custom_fields_json,
            now_ms,
        ],
    )?;
    if updated > 0 {
        return Ok(());
    }

    let ord = claim_ord_tx(tx, analysis, IdKind::Node, &node.id)?;
    tx.execute(
        "INSERT INTO tree_nodes(analysis, id, ord, node_type, label, pos_x, pos_y, units, specification, notes, \
                tags_json, evidence_status, gate_type, severity, occurrence, detection, action_json, \
                custom_fields_json, updated_at_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            analysis,
            node.id,
            ord,
            node.node_type.as_str(),
            node.label,
            node.position.x,
            node.position.y,
            node.units,
            node.specification,
            node.notes,
            tags_json,
            node.evidence_status.map(EvidenceStatus::as_str),
            node.gate_type.map(GateType::as_str),
            node.risk.severity,
            node.risk.occurrence,
            node.risk.detection,
            action_json,
            custom_fields_json,
            now_ms,
        ],
    )?;
    Ok(())
}

fn upsert_edge_tx(tx: &Transaction<'_>, analysis: &str, edge: &Edge) -> Result<(), StoreError> {
    if edge.id.trim().is_empty() {
        return Err(StoreError::InvalidInput("edge id must not be empty"));
    }
    if edge.source_id == edge.target_id {
        return Err(StoreError::InvalidInput("edge must not loop onto its source"));
    }
    for endpoint in [&edge.source_id, &edge.target_id] {
        if !node_exists_tx(tx, analysis, endpoint)? {
            return Err(StoreError::InvalidInput("edge endpoint does not exist"));
        }
    }

    let updated = tx.execute(
        "UPDATE tree_edges SET source_id=?3, target_id=?4, gate_type=?5 WHERE analysis=?1 AND id=?2",
        params![
            analysis,
            edge.id,
            edge.source_id,
            edge.target_id,
            edge.gate_type.map(GateType::as_str),
        ],
    )?;
    if updated > 0 {
        return Ok(());
    }

    let ord = claim_ord_tx(tx, analysis, IdKind::Edge, &edge.id)?;
    tx.execute(
        "INSERT INTO tree_edges(analysis, id, ord, source_id, target_id, gate_type) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            analysis,
            edge.id,
            ord,
            edge.source_id,
            edge.target_id,
            edge.gate_type.map(GateType::as_str),
        ],
    )?;
    Ok(())
}
