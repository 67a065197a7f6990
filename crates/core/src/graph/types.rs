#![forbid(unsafe_code)]

use crate::fields::FieldValue;
use crate::risk::RiskScore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    TopEvent,
    IntermediateEvent,
    BasicEvent,
    Gate,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopEvent => "top_event",
            Self::IntermediateEvent => "intermediate_event",
            Self::BasicEvent => "basic_event",
            Self::Gate => "gate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "top_event" => Some(Self::TopEvent),
            "intermediate_event" => Some(Self::IntermediateEvent),
            "basic_event" => Some(Self::BasicEvent),
            "gate" => Some(Self::Gate),
            _ => None,
        }
    }

    /// Top events and gates are structural; they carry no cause statement of
    /// their own and are never scored or linted.
    pub fn is_structural(self) -> bool {
        matches!(self, Self::TopEvent | Self::Gate)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateType {
    And,
    Or,
}

impl GateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if value.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    Hypothesis,
    Verified,
}

impl EvidenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hypothesis => "hypothesis",
            Self::Verified => "verified",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "hypothesis" => Some(Self::Hypothesis),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Corrective action / investigation record attached to a cause.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investigation_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investigation_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_status: Option<EvidenceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_type: Option<GateType>,
    /// View state only; never persisted.
    #[serde(default, skip_serializing)]
    pub collapsed: bool,
    #[serde(default)]
    pub risk: RiskScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionItem>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_fields: BTreeMap<String, FieldValue>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: NodeType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type,
            label: label.into(),
            position: Position::default(),
            units: None,
            specification: None,
            notes: None,
            tags: Vec::new(),
            evidence_status: None,
            gate_type: None,
            collapsed: false,
            risk: RiskScore::default(),
            action: None,
            custom_fields: BTreeMap::new(),
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_risk(mut self, risk: RiskScore) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_action(mut self, action: ActionItem) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_type: Option<GateType>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            gate_type: None,
        }
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }
}

/// Partial update of a node. `None` leaves a field untouched; the nested
/// `Option` on clearable fields distinguishes "clear" from "keep".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub label: Option<String>,
    pub node_type: Option<NodeType>,
    pub units: Option<Option<String>>,
    pub specification: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub evidence_status: Option<Option<EvidenceStatus>>,
    pub gate_type: Option<Option<GateType>>,
    pub risk: Option<RiskScore>,
    pub action: Option<Option<ActionItem>>,
    pub custom_fields: Option<BTreeMap<String, FieldValue>>,
}

impl NodePatch {
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn risk(risk: RiskScore) -> Self {
        Self {
            risk: Some(risk),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, node: &mut Node) {
        if let Some(label) = &self.label {
            node.label = label.clone();
        }
        if let Some(node_type) = self.node_type {
            node.node_type = node_type;
        }
        if let Some(units) = &self.units {
            node.units = units.clone();
        }
        if let Some(specification) = &self.specification {
            node.specification = specification.clone();
        }
        if let Some(notes) = &self.notes {
            node.notes = notes.clone();
        }
        if let Some(tags) = &self.tags {
            node.tags = tags.clone();
        }
        if let Some(evidence_status) = self.evidence_status {
            node.evidence_status = evidence_status;
        }
        if let Some(gate_type) = self.gate_type {
            node.gate_type = gate_type;
        }
        if let Some(risk) = self.risk {
            node.risk = risk;
        }
        if let Some(action) = &self.action {
            node.action = action.clone();
        }
        if let Some(custom_fields) = &self.custom_fields {
            node.custom_fields = custom_fields.clone();
        }
    }
}

/// Full node/edge set for one analysis as held by the external store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// Persistence operation derived from a local mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeOp {
    NodeUpsert(Node),
    NodeDelete { id: String },
    EdgeUpsert(Edge),
    EdgeDelete { id: String },
}
