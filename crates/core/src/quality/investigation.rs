#![forbid(unsafe_code)]

use super::text::{any_match, collapse_whitespace};
use super::{Confidence, IssueKind, QualityEngine, QualityIssue};
use crate::graph::ActionItem;

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl QualityEngine {
    /// Checks an investigation item. Only the first failing check reports:
    /// too broad, vague verb without a method, no hypothesis, no pass/fail
    /// criteria, no evidence type. Structured fields on the action count as
    /// satisfying the matching check.
    pub fn check_investigation(
        &self,
        target_id: &str,
        action: &ActionItem,
    ) -> Option<QualityIssue> {
        let item = action.investigation_item.as_deref().map(str::trim)?;
        if item.is_empty() {
            return None;
        }
        let (kind, confidence) = self.classify_investigation(item, action)?;
        Some(QualityIssue::new(
            target_id,
            kind,
            item,
            improve_investigation(kind, item),
            confidence,
        ))
    }

    fn classify_investigation(
        &self,
        item: &str,
        action: &ActionItem,
    ) -> Option<(IssueKind, Confidence)> {
        if any_match(&self.broad_phrases, item) {
            return Some((IssueKind::TooBroad, Confidence::High));
        }
        let has_method =
            filled(&action.investigation_method) || any_match(&self.method_markers, item);
        if any_match(&self.vague_verbs, item) && !has_method {
            return Some((IssueKind::NoHypothesis, Confidence::Medium));
        }
        if !any_match(&self.hypothesis_markers, item) {
            return Some((IssueKind::NoHypothesis, Confidence::Low));
        }
        let has_criteria = filled(&action.criteria)
            || item.chars().any(|c| c.is_ascii_digit())
            || any_match(&self.criteria_markers, item);
        if !has_criteria {
            return Some((IssueKind::NoCriteria, Confidence::Medium));
        }
        if !filled(&action.evidence_type) && !any_match(&self.evidence_markers, item) {
            return Some((IssueKind::NoEvidence, Confidence::Low));
        }
        None
    }
}

/// Template rewrite for an investigation item flagged with `kind`.
pub fn improve_investigation(kind: IssueKind, item: &str) -> String {
    let item = collapse_whitespace(item);
    let item = item.trim_end_matches(['.', ';']);
    match kind {
        IssueKind::TooBroad => {
            format!("Confirm whether <one suspected cause> explains: {item}")
        }
        IssueKind::NoHypothesis => {
            format!("{item} using <method> to confirm whether <suspected cause>")
        }
        IssueKind::NoCriteria => format!("{item}; pass if <measured value> is within <limit>"),
        IssueKind::NoEvidence => format!("{item}; record <photo/measurement log/test report>"),
        _ => item.to_string(),
    }
}
