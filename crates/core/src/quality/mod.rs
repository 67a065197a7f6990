#![forbid(unsafe_code)]

//! Advisory text heuristics for cause statements and investigation items.
//!
//! Findings never block an edit. Suggestions are template-based and
//! deterministic so a stored issue can be matched against a fresh run.

mod investigation;
mod lexicon;
mod text;
mod why;

pub use investigation::improve_investigation;
pub use lexicon::{Lexicons, Replacement};

use crate::tree::TreeStore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use text::{Phrase, compile_phrases, compile_replacements, first_match};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    Blamey,
    Vague,
    SymptomRestatement,
    Testability,
    TooBroad,
    NoHypothesis,
    NoCriteria,
    NoEvidence,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blamey => "BLAMEY",
            Self::Vague => "VAGUE",
            Self::SymptomRestatement => "SYMPTOM_RESTATEMENT",
            Self::Testability => "TESTABILITY",
            Self::TooBroad => "TOO_BROAD",
            Self::NoHypothesis => "NO_HYPOTHESIS",
            Self::NoCriteria => "NO_CRITERIA",
            Self::NoEvidence => "NO_EVIDENCE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            Self::Blamey,
            Self::Vague,
            Self::SymptomRestatement,
            Self::Testability,
            Self::TooBroad,
            Self::NoHypothesis,
            Self::NoCriteria,
            Self::NoEvidence,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == value.trim())
    }

    fn evidence_required(self) -> &'static str {
        match self {
            Self::Blamey => "Work instruction and records for the step where the deviation occurred",
            Self::Vague => "Measured value compared with the specified value",
            Self::SymptomRestatement => "Observation of the physical mechanism behind the parent event",
            Self::Testability => "Measurement or test result with units",
            Self::TooBroad => "One named hypothesis to test",
            Self::NoHypothesis => "Stated suspected cause and test method",
            Self::NoCriteria => "Pass/fail limit for the check",
            Self::NoEvidence => "Photo, measurement log or test report",
        }
    }

    fn verification_method(self) -> &'static str {
        match self {
            Self::Blamey | Self::NoHypothesis => "Reproduce the condition under the stated procedure",
            Self::Vague | Self::Testability | Self::NoCriteria => {
                "Measure against the drawing or specification limit"
            }
            Self::SymptomRestatement => "Ask why once more and confirm the mechanism on the part",
            Self::TooBroad => "Split into one investigation item per hypothesis",
            Self::NoEvidence => "Attach the record to the action",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub target_id: String,
    pub issue_kind: IssueKind,
    pub original_text: String,
    pub suggested_text: String,
    pub confidence: Confidence,
    pub evidence_required: String,
    pub verification_method: String,
}

impl QualityIssue {
    pub fn new(
        target_id: &str,
        issue_kind: IssueKind,
        original_text: &str,
        suggested_text: String,
        confidence: Confidence,
    ) -> Self {
        Self {
            target_id: target_id.to_string(),
            issue_kind,
            original_text: original_text.to_string(),
            suggested_text,
            confidence,
            evidence_required: issue_kind.evidence_required().to_string(),
            verification_method: issue_kind.verification_method().to_string(),
        }
    }

    /// Stable hex digest of target, kind and original text.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.target_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.issue_kind.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.original_text.as_bytes());
        let out = hasher.finalize();
        let mut s = String::with_capacity(64);
        for b in out {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QualityError {
    EmptyPhrase,
    InvalidPattern { phrase: String, message: String },
}

impl std::fmt::Display for QualityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPhrase => write!(f, "lexicon contains an empty phrase"),
            Self::InvalidPattern { phrase, message } => {
                write!(f, "lexicon phrase {phrase:?} does not compile: {message}")
            }
        }
    }
}

impl std::error::Error for QualityError {}

/// Lexicons compiled once into regexes.
#[derive(Clone, Debug)]
pub struct QualityEngine {
    blame: Vec<Phrase>,
    vague: Vec<Phrase>,
    stopwords: BTreeSet<String>,
    testability_markers: Vec<Phrase>,
    broad_phrases: Vec<Phrase>,
    vague_verbs: Vec<Phrase>,
    method_markers: Vec<Phrase>,
    hypothesis_markers: Vec<Phrase>,
    criteria_markers: Vec<Phrase>,
    evidence_markers: Vec<Phrase>,
}

impl QualityEngine {
    pub fn new(lexicons: &Lexicons) -> Result<Self, QualityError> {
        Ok(Self {
            blame: compile_replacements(&lexicons.blame)?,
            vague: compile_replacements(&lexicons.vague)?,
            stopwords: lexicons
                .stopwords
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
            testability_markers: compile_phrases(&lexicons.testability_markers)?,
            broad_phrases: compile_phrases(&lexicons.broad_phrases)?,
            vague_verbs: compile_phrases(&lexicons.vague_verbs)?,
            method_markers: compile_phrases(&lexicons.method_markers)?,
            hypothesis_markers: compile_phrases(&lexicons.hypothesis_markers)?,
            criteria_markers: compile_phrases(&lexicons.criteria_markers)?,
            evidence_markers: compile_phrases(&lexicons.evidence_markers)?,
        })
    }

    /// Lexicon phrase that triggered a blame or vague finding, if any.
    pub fn matched_phrase(&self, statement: &str) -> Option<&str> {
        first_match(&self.blame, statement)
            .or_else(|| first_match(&self.vague, statement))
            .map(|p| p.text.as_str())
    }

    /// Runs both passes over every node, in node order. Each cause yields at
    /// most one why finding and one investigation finding.
    pub fn review_tree(&self, tree: &TreeStore) -> Vec<QualityIssue> {
        let mut issues = Vec::new();
        for node in tree.nodes() {
            let parent = tree.parent(&node.id).map(|p| p.label.as_str());
            if let Some(issue) = self.check_why(&node.id, node.node_type, &node.label, parent) {
                issues.push(issue);
            }
            if let Some(action) = &node.action
                && let Some(issue) = self.check_investigation(&node.id, action)
            {
                issues.push(issue);
            }
        }
        tracing::debug!(
            nodes = tree.nodes().len(),
            issues = issues.len(),
            "quality review finished"
        );
        issues
    }
}
