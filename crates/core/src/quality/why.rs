#![forbid(unsafe_code)]

use super::text::{
    any_match, collapse_whitespace, first_match, overlap_ratio, rewrite, significant_words,
    word_count,
};
use super::{Confidence, IssueKind, QualityEngine, QualityIssue};
use crate::graph::NodeType;

const SYMPTOM_RATIO: f64 = 0.5;
const SYMPTOM_RATIO_HIGH: f64 = 0.8;
const TESTABILITY_MIN_WORDS: usize = 3;

impl QualityEngine {
    /// First-hit classification of a cause statement: blame, then vague
    /// language, then symptom restatement of the parent, then testability.
    /// Top events and gates are never checked.
    pub fn check_why(
        &self,
        target_id: &str,
        node_type: NodeType,
        text: &str,
        parent_text: Option<&str>,
    ) -> Option<QualityIssue> {
        let text = text.trim();
        if node_type.is_structural() || text.is_empty() {
            return None;
        }
        let issue = |kind: IssueKind, suggested_text: String, confidence: Confidence| {
            QualityIssue::new(target_id, kind, text, suggested_text, confidence)
        };

        if first_match(&self.blame, text).is_some() {
            let suggestion = rewrite(&self.blame, text).unwrap_or_else(|| mechanism_template(text));
            return Some(issue(IssueKind::Blamey, suggestion, Confidence::High));
        }
        if first_match(&self.vague, text).is_some() {
            let suggestion = rewrite(&self.vague, text).unwrap_or_else(|| mechanism_template(text));
            return Some(issue(IssueKind::Vague, suggestion, Confidence::Medium));
        }
        if let Some(parent) = parent_text.map(str::trim).filter(|p| !p.is_empty()) {
            let ratio = overlap_ratio(
                &significant_words(text, &self.stopwords),
                &significant_words(parent, &self.stopwords),
            );
            if ratio >= SYMPTOM_RATIO {
                let confidence = if ratio >= SYMPTOM_RATIO_HIGH {
                    Confidence::High
                } else {
                    Confidence::Medium
                };
                return Some(issue(
                    IssueKind::SymptomRestatement,
                    format!("What physically causes \"{parent}\"? <mechanism>"),
                    confidence,
                ));
            }
        }
        if !self.is_testable(text) && word_count(text) >= TESTABILITY_MIN_WORDS {
            return Some(issue(
                IssueKind::Testability,
                format!("{text} (measured <value> against limit <spec>)"),
                Confidence::Low,
            ));
        }
        None
    }

    /// Deterministic rewrite of a cause statement: blame phrases first, then
    /// vague phrases, each through its fixed replacement table. Text with
    /// nothing to replace gets the mechanism template.
    pub fn improve_why(&self, text: &str) -> String {
        let text = collapse_whitespace(text);
        let after_blame = rewrite(&self.blame, &text);
        let base = after_blame.as_deref().unwrap_or(&text);
        match (rewrite(&self.vague, base), after_blame.is_some()) {
            (Some(out), _) => out,
            (None, true) => base.to_string(),
            (None, false) => mechanism_template(&text),
        }
    }

    fn is_testable(&self, text: &str) -> bool {
        text.chars().any(|c| c.is_ascii_digit()) || any_match(&self.testability_markers, text)
    }
}

fn mechanism_template(text: &str) -> String {
    format!("Mechanism: {text} because <specific physical condition>")
}
