#![forbid(unsafe_code)]

use crate::graph::{IdError, TagError};
use crate::risk::RiskError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    InvalidId(IdError),
    InvalidTag(TagError),
    InvalidRisk(RiskError),
    UnknownNode(String),
    UnknownEdge(String),
    DuplicateNode(String),
    DuplicateEdge(String),
    MultipleTopEvents,
    SelfLoop(String),
    EdgeIntoTopEvent(String),
    DuplicateLink { source: String, target: String },
    WouldCycle { source: String, target: String },
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(err) => write!(f, "invalid id: {err}"),
            Self::InvalidTag(err) => write!(f, "invalid tag: {err}"),
            Self::InvalidRisk(err) => write!(f, "invalid risk: {err}"),
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::UnknownEdge(id) => write!(f, "unknown edge {id}"),
            Self::DuplicateNode(id) => write!(f, "node {id} already exists"),
            Self::DuplicateEdge(id) => write!(f, "edge {id} already exists"),
            Self::MultipleTopEvents => write!(f, "a tree has exactly one top event"),
            Self::SelfLoop(id) => write!(f, "node {id} cannot be its own child"),
            Self::EdgeIntoTopEvent(id) => write!(f, "top event {id} cannot have a parent"),
            Self::DuplicateLink { source, target } => {
                write!(f, "{source} is already linked to {target}")
            }
            Self::WouldCycle { source, target } => {
                write!(f, "linking {source} -> {target} would create a cycle")
            }
        }
    }
}

impl std::error::Error for TreeError {}

impl From<IdError> for TreeError {
    fn from(value: IdError) -> Self {
        Self::InvalidId(value)
    }
}

impl From<TagError> for TreeError {
    fn from(value: TagError) -> Self {
        Self::InvalidTag(value)
    }
}

impl From<RiskError> for TreeError {
    fn from(value: RiskError) -> Self {
        Self::InvalidRisk(value)
    }
}
