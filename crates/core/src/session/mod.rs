#![forbid(unsafe_code)]

//! One open analysis: the tree cache, its undo log and the persistence seam.
//!
//! Mutations are applied locally first, recorded, then persisted. When the
//! backend rejects a write the session reconciles by reloading the
//! authoritative tree and clears its history, since the recorded commands no
//! longer describe that state.

mod backend;

pub use backend::{MemoryBackend, MemoryBackendError, TreeBackend};

use crate::config::EngineConfig;
use crate::fields::{FieldError, validate_custom_fields};
use crate::graph::{
    ActionItem, Edge, GateType, Node, NodePatch, NodeType, Position, TreeOp,
};
use crate::history::{Command, History, NodeMove, NodeUpdate, Slots};
use crate::ids::AnalysisId;
use crate::path::{NoOpReason, PathError, TableEdit, TableEditPlan, get_path, resolve_table_edit};
use crate::quality::{QualityEngine, QualityError, QualityIssue};
use crate::risk::{ApResult, RiskScore, resolve_ap_category};
use crate::table::{Projection, TableView, project};
use crate::tree::{TreeError, TreeStore, TreeValidation};
use std::collections::HashSet;

/// Vertical gap between generated chain nodes on the canvas.
const CHAIN_SPACING: f64 = 120.0;

#[derive(Clone, Debug, PartialEq)]
pub enum SessionError {
    Tree(TreeError),
    Path(PathError),
    Fields(Vec<FieldError>),
    Quality(QualityError),
    Backend(String),
    /// The backend rejected a write. `reconciled` tells whether the local
    /// tree was reloaded from the backend afterwards.
    Persist { message: String, reconciled: bool },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tree(err) => write!(f, "{err}"),
            Self::Path(err) => write!(f, "{err}"),
            Self::Fields(errors) => {
                write!(f, "custom fields:")?;
                for err in errors {
                    write!(f, " {err};")?;
                }
                Ok(())
            }
            Self::Quality(err) => write!(f, "{err}"),
            Self::Backend(message) => write!(f, "backend: {message}"),
            Self::Persist {
                message,
                reconciled,
            } => {
                write!(f, "persist failed: {message}")?;
                if !reconciled {
                    write!(f, " (local tree may be stale)")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<TreeError> for SessionError {
    fn from(value: TreeError) -> Self {
        Self::Tree(value)
    }
}

impl From<PathError> for SessionError {
    fn from(value: PathError) -> Self {
        Self::Path(value)
    }
}

impl From<QualityError> for SessionError {
    fn from(value: QualityError) -> Self {
        Self::Quality(value)
    }
}

/// Input for a user-created node.
#[derive(Clone, Debug, PartialEq)]
pub struct NewNode {
    pub node_type: NodeType,
    pub label: String,
    pub position: Position,
    pub parent_id: Option<String>,
    pub gate_type: Option<GateType>,
}

impl NewNode {
    pub fn new(node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            node_type,
            label: label.into(),
            position: Position::default(),
            parent_id: None,
            gate_type: None,
        }
    }

    pub fn under(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableEditOutcome {
    Relabeled(usize),
    /// Ids of the created nodes, parent first.
    Created(Vec<String>),
    NoOp(NoOpReason),
}

pub struct AnalysisSession<B: TreeBackend> {
    backend: B,
    analysis: AnalysisId,
    config: EngineConfig,
    quality: QualityEngine,
    tree: TreeStore,
    history: History,
}

impl<B: TreeBackend> AnalysisSession<B> {
    pub fn open(
        backend: B,
        analysis: AnalysisId,
        config: EngineConfig,
    ) -> Result<Self, SessionError> {
        let quality = config.quality_engine()?;
        let history = History::new(config.history_capacity);
        let mut session = Self {
            backend,
            analysis,
            config,
            quality,
            tree: TreeStore::new(),
            history,
        };
        session.refresh()?;
        tracing::debug!(
            analysis = %session.analysis,
            nodes = session.tree.nodes().len(),
            "analysis session opened"
        );
        Ok(session)
    }

    /// Reloads the tree from the backend. Selection and collapse state of
    /// surviving nodes are kept.
    pub fn refresh(&mut self) -> Result<(), SessionError> {
        let snapshot = self
            .backend
            .load_tree(&self.analysis)
            .map_err(|err| SessionError::Backend(err.to_string()))?;
        self.tree.initialize_from(snapshot);
        Ok(())
    }

    /// Ends the session and hands the backend back.
    pub fn dispose(self) -> B {
        tracing::debug!(analysis = %self.analysis, "analysis session disposed");
        self.backend
    }

    pub fn analysis_id(&self) -> &AnalysisId {
        &self.analysis
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn add_node(&mut self, new: NewNode) -> Result<String, SessionError> {
        if let Some(parent) = &new.parent_id
            && !self.tree.contains_node(parent)
        {
            return Err(TreeError::UnknownNode(parent.clone()).into());
        }
        let id = self.allocate_node_id()?;
        let mut node = Node::new(id.clone(), new.node_type, new.label).at(new.position);
        node.gate_type = new.gate_type;
        let mut edges = Vec::new();
        if let Some(parent) = new.parent_id {
            edges.push(Edge::new(self.allocate_edge_id()?, parent, id.clone()));
        }
        self.execute(Command::AddNode {
            nodes: vec![node],
            edges,
            slots: Slots::default(),
        })?;
        Ok(id)
    }

    pub fn update_node(&mut self, id: &str, patch: &NodePatch) -> Result<(), SessionError> {
        if let Some(fields) = &patch.custom_fields {
            let errors = validate_custom_fields(&self.config.field_definitions, fields);
            if !errors.is_empty() {
                return Err(SessionError::Fields(errors));
            }
        }
        let before = self
            .tree
            .node(id)
            .cloned()
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        let mut after = before.clone();
        patch.apply_to(&mut after);
        self.execute(Command::UpdateNode {
            updates: vec![NodeUpdate { before, after }],
        })
    }

    pub fn set_risk(&mut self, id: &str, risk: RiskScore) -> Result<(), SessionError> {
        self.update_node(id, &NodePatch::risk(risk))
    }

    pub fn set_action(&mut self, id: &str, action: Option<ActionItem>) -> Result<(), SessionError> {
        let patch = NodePatch {
            action: Some(action),
            ..NodePatch::default()
        };
        self.update_node(id, &patch)
    }

    pub fn delete_node(&mut self, id: &str) -> Result<(), SessionError> {
        self.delete_nodes(&[id])
    }

    /// Removes the nodes and every edge touching them as one undoable step.
    /// Slots are recorded so an undo restores node and edge order.
    pub fn delete_nodes<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<(), SessionError> {
        for id in ids {
            let id = id.as_ref();
            if !self.tree.contains_node(id) {
                return Err(TreeError::UnknownNode(id.to_string()).into());
            }
        }
        let doomed: HashSet<&str> = ids.iter().map(|id| id.as_ref()).collect();
        let mut slots = Slots::default();
        let mut nodes = Vec::new();
        for (index, node) in self.tree.nodes().iter().enumerate() {
            if doomed.contains(node.id.as_str()) {
                slots.nodes.push(index);
                nodes.push(node.clone());
            }
        }
        let mut edges = Vec::new();
        for (index, edge) in self.tree.edges().iter().enumerate() {
            if doomed.contains(edge.source_id.as_str())
                || doomed.contains(edge.target_id.as_str())
            {
                slots.edges.push(index);
                edges.push(edge.clone());
            }
        }
        self.execute(Command::DeleteNode {
            nodes,
            edges,
            slots,
        })
    }

    pub fn add_edge(
        &mut self,
        source_id: &str,
        target_id: &str,
        gate_type: Option<GateType>,
    ) -> Result<String, SessionError> {
        for id in [source_id, target_id] {
            if !self.tree.contains_node(id) {
                return Err(TreeError::UnknownNode(id.to_string()).into());
            }
        }
        let mut edge = Edge::new(self.allocate_edge_id()?, source_id, target_id);
        edge.gate_type = gate_type;
        let id = edge.id.clone();
        self.execute(Command::AddEdge { edge, slot: None })?;
        Ok(id)
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<(), SessionError> {
        let slot = self
            .tree
            .edges()
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| TreeError::UnknownEdge(id.to_string()))?;
        let edge = self.tree.edges()[slot].clone();
        self.execute(Command::DeleteEdge {
            edge,
            slot: Some(slot),
        })
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<(), SessionError> {
        let before = self
            .tree
            .node(id)
            .map(|n| n.position)
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        self.execute(Command::MoveNode(NodeMove {
            id: id.to_string(),
            before,
            after: position,
        }))
    }

    /// Moves several nodes as one undoable step (auto-layout).
    pub fn batch_move(&mut self, moves: &[(String, Position)]) -> Result<(), SessionError> {
        let mut out = Vec::with_capacity(moves.len());
        for (id, after) in moves {
            let before = self
                .tree
                .node(id)
                .map(|n| n.position)
                .ok_or_else(|| TreeError::UnknownNode(id.clone()))?;
            out.push(NodeMove {
                id: id.clone(),
                before,
                after: *after,
            });
        }
        self.execute(Command::BatchMove { moves: out })
    }

    /// View state only: neither recorded nor persisted.
    pub fn toggle_collapsed(&mut self, id: &str) -> Result<bool, SessionError> {
        Ok(self.tree.toggle_collapsed(id)?)
    }

    /// View state only: neither recorded nor persisted.
    pub fn select(&mut self, id: &str, additive: bool) -> Result<(), SessionError> {
        Ok(self.tree.select(id, additive)?)
    }

    pub fn clear_selection(&mut self) {
        self.tree.clear_selection();
    }

    /// Resolves a table edit against the current tree and applies it as a
    /// single undoable command.
    pub fn apply_table_edit(&mut self, edit: &TableEdit) -> Result<TableEditOutcome, SessionError> {
        match resolve_table_edit(&self.tree, edit) {
            TableEditPlan::Relabel {
                node_ids,
                new_label,
            } => {
                let mut updates = Vec::with_capacity(node_ids.len());
                for id in &node_ids {
                    let before = self
                        .tree
                        .node(id)
                        .cloned()
                        .ok_or_else(|| TreeError::UnknownNode(id.clone()))?;
                    let after = Node {
                        label: new_label.clone(),
                        ..before.clone()
                    };
                    updates.push(NodeUpdate { before, after });
                }
                self.execute(Command::UpdateNode { updates })?;
                tracing::debug!(
                    nodes = node_ids.len(),
                    position = edit.position,
                    "table edit relabeled"
                );
                Ok(TableEditOutcome::Relabeled(node_ids.len()))
            }
            TableEditPlan::CreateChain { parent_id, labels } => {
                let ids = self.create_chain(parent_id, &labels)?;
                tracing::debug!(
                    nodes = ids.len(),
                    position = edit.position,
                    "table edit created chain"
                );
                Ok(TableEditOutcome::Created(ids))
            }
            TableEditPlan::NoOp(reason) => {
                tracing::debug!(reason = reason.as_str(), "table edit ignored");
                Ok(TableEditOutcome::NoOp(reason))
            }
        }
    }

    fn create_chain(
        &mut self,
        parent_id: Option<String>,
        labels: &[String],
    ) -> Result<Vec<String>, SessionError> {
        let origin = parent_id
            .as_deref()
            .and_then(|id| self.tree.node(id))
            .map(|n| n.position)
            .unwrap_or_default();
        let mut nodes = Vec::with_capacity(labels.len());
        let mut edges = Vec::new();
        let mut parent = parent_id;
        for (index, label) in labels.iter().enumerate() {
            let node_type = if parent.is_none() {
                NodeType::TopEvent
            } else {
                NodeType::IntermediateEvent
            };
            let id = self.allocate_node_id()?;
            let position = Position::new(origin.x, origin.y + CHAIN_SPACING * (index as f64 + 1.0));
            nodes.push(Node::new(id.clone(), node_type, label.clone()).at(position));
            if let Some(parent) = &parent {
                edges.push(Edge::new(self.allocate_edge_id()?, parent.clone(), id.clone()));
            }
            parent = Some(id);
        }
        let ids = nodes.iter().map(|n| n.id.clone()).collect();
        self.execute(Command::AddNode {
            nodes,
            edges,
            slots: Slots::default(),
        })?;
        Ok(ids)
    }

    /// Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool, SessionError> {
        match self.history.undo(&mut self.tree)? {
            Some(applied) => {
                let ops = applied.persist_ops(&self.tree);
                self.persist(ops)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns `false` when there was nothing to redo.
    pub fn redo(&mut self) -> Result<bool, SessionError> {
        match self.history.redo(&mut self.tree)? {
            Some(applied) => {
                let ops = applied.persist_ops(&self.tree);
                self.persist(ops)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn projection(&self) -> Projection {
        project(&self.tree, &self.config.ap_rules)
    }

    pub fn table_view(&self, query: &str) -> TableView {
        let projection = self.projection();
        TableView::build(&projection.rows, query, self.config.groupable_columns)
    }

    pub fn ap_category(&self, id: &str) -> Option<&ApResult> {
        let node = self.tree.node(id)?;
        resolve_ap_category(&self.config.ap_rules, &node.risk)
    }

    pub fn review_quality(&self) -> Vec<QualityIssue> {
        self.quality.review_tree(&self.tree)
    }

    pub fn validate(&self) -> TreeValidation {
        self.tree.validate()
    }

    pub fn get_path(&self, id: &str) -> Result<Vec<String>, SessionError> {
        Ok(get_path(&self.tree, id, self.config.max_path_hops)?)
    }

    fn allocate_node_id(&mut self) -> Result<String, SessionError> {
        self.backend
            .allocate_node_id(&self.analysis)
            .map_err(|err| SessionError::Backend(err.to_string()))
    }

    fn allocate_edge_id(&mut self) -> Result<String, SessionError> {
        self.backend
            .allocate_edge_id(&self.analysis)
            .map_err(|err| SessionError::Backend(err.to_string()))
    }

    /// Apply locally, record, persist.
    fn execute(&mut self, command: Command) -> Result<(), SessionError> {
        command.apply(&mut self.tree)?;
        let ops = command.persist_ops(&self.tree);
        self.history.push(command);
        self.persist(ops)
    }

    fn persist(&mut self, ops: Vec<TreeOp>) -> Result<(), SessionError> {
        if ops.is_empty() {
            return Ok(());
        }
        let Err(err) = self.backend.persist(&self.analysis, &ops) else {
            return Ok(());
        };
        let message = err.to_string();
        tracing::warn!(
            analysis = %self.analysis,
            ops = ops.len(),
            error = %message,
            "persist failed; reloading tree from backend"
        );
        self.history.clear();
        let reconciled = match self.refresh() {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(analysis = %self.analysis, error = %err, "reconcile reload failed");
                false
            }
        };
        Err(SessionError::Persist {
            message,
            reconciled,
        })
    }
}
