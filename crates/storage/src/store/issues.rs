#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, ensure_analysis_tx, next_counter_tx, now_ms};
use fta_core::ids::AnalysisId;
use fta_core::quality::{Confidence, IssueKind, QualityIssue};
use rusqlite::{OptionalExtension, Transaction, params};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssueStatus {
    Open,
    Accepted,
    Dismissed,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Accepted => "accepted",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "open" => Some(Self::Open),
            "accepted" => Some(Self::Accepted),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredIssue {
    pub seq: i64,
    pub issue: QualityIssue,
    pub fingerprint: String,
    pub status: IssueStatus,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub resolved_at_ms: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IssueRecordSummary {
    /// New open issues.
    pub inserted: usize,
    /// Open issues for the same target and kind whose text was replaced.
    pub refreshed: usize,
    /// Already accepted or dismissed with identical text.
    pub suppressed: usize,
}

impl SqliteStore {
    /// Records a review pass.
    ///
    /// At most one open issue exists per (target, kind): a new finding for
    /// that pair refreshes the open row in place. A finding whose fingerprint
    /// matches an issue the user already accepted or dismissed is not raised
    /// again.
    pub fn quality_issues_record(
        &mut self,
        analysis: &AnalysisId,
        issues: &[QualityIssue],
    ) -> Result<IssueRecordSummary, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        ensure_analysis_tx(&tx, analysis.as_str(), now_ms)?;

        let mut summary = IssueRecordSummary::default();
        for issue in issues {
            let fingerprint = issue.fingerprint();
            if resolved_fingerprint_exists_tx(&tx, analysis.as_str(), &fingerprint)? {
                summary.suppressed += 1;
                continue;
            }

            let refreshed = tx.execute(
                "UPDATE quality_issues SET original_text=?4, suggested_text=?5, confidence=?6, \
                        evidence_required=?7, verification_method=?8, fingerprint=?9, updated_at_ms=?10 \
                 WHERE analysis=?1 AND target_id=?2 AND issue_kind=?3 AND status='open'",
                params![
                    analysis.as_str(),
                    issue.target_id,
                    issue.issue_kind.as_str(),
                    issue.original_text,
                    issue.suggested_text,
                    issue.confidence.as_str(),
                    issue.evidence_required,
                    issue.verification_method,
                    fingerprint,
                    now_ms,
                ],
            )?;
            if refreshed > 0 {
                summary.refreshed += 1;
                continue;
            }

            let seq = next_counter_tx(&tx, analysis.as_str(), "issue_seq")?;
            tx.execute(
                "INSERT INTO quality_issues(analysis, seq, target_id, issue_kind, original_text, suggested_text, \
                        confidence, evidence_required, verification_method, fingerprint, status, \
                        created_at_ms, updated_at_ms, resolved_at_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'open', ?11, ?11, NULL)",
                params![
                    analysis.as_str(),
                    seq,
                    issue.target_id,
                    issue.issue_kind.as_str(),
                    issue.original_text,
                    issue.suggested_text,
                    issue.confidence.as_str(),
                    issue.evidence_required,
                    issue.verification_method,
                    fingerprint,
                    now_ms,
                ],
            )?;
            summary.inserted += 1;
        }

        tx.commit()?;
        tracing::debug!(
            analysis = %analysis,
            inserted = summary.inserted,
            refreshed = summary.refreshed,
            suppressed = summary.suppressed,
            "quality issues recorded"
        );
        Ok(summary)
    }

    pub fn quality_issues_list(
        &self,
        analysis: &AnalysisId,
        status: Option<IssueStatus>,
    ) -> Result<Vec<StoredIssue>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, target_id, issue_kind, original_text, suggested_text, confidence, evidence_required, \
                    verification_method, fingerprint, status, created_at_ms, updated_at_ms, resolved_at_ms \
             FROM quality_issues \
             WHERE analysis=?1 AND (?2 IS NULL OR status=?2) \
             ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query(params![analysis.as_str(), status.map(IssueStatus::as_str)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let seq = row.get::<_, i64>(0)?;
            let corrupt = |message: &'static str| StoreError::CorruptRow {
                table: "quality_issues",
                id: seq.to_string(),
                message,
            };
            let issue_kind = IssueKind::parse(&row.get::<_, String>(2)?)
                .ok_or_else(|| corrupt("invalid issue_kind"))?;
            let confidence = Confidence::parse(&row.get::<_, String>(5)?)
                .ok_or_else(|| corrupt("invalid confidence"))?;
            let status = IssueStatus::parse(&row.get::<_, String>(9)?)
                .ok_or_else(|| corrupt("invalid status"))?;
            out.push(StoredIssue {
                seq,
                issue: QualityIssue {
                    target_id: row.get(1)?,
                    issue_kind,
                    original_text: row.get(3)?,
                    suggested_text: row.get(4)?,
                    confidence,
                    evidence_required: row.get(6)?,
                    verification_method: row.get(7)?,
                },
                fingerprint: row.get(8)?,
                status,
                created_at_ms: row.get(10)?,
                updated_at_ms: row.get(11)?,
                resolved_at_ms: row.get(12)?,
            });
        }
        Ok(out)
    }

    /// Accepts or dismisses an open issue.
    pub fn quality_issue_resolve(
        &mut self,
        analysis: &AnalysisId,
        seq: i64,
        status: IssueStatus,
    ) -> Result<(), StoreError> {
        if status == IssueStatus::Open {
            return Err(StoreError::InvalidInput("resolution must be accepted or dismissed"));
        }
        let now_ms = now_ms();
        let tx = self.conn.transaction()?;
        let current = tx
            .query_row(
                "SELECT status FROM quality_issues WHERE analysis=?1 AND seq=?2",
                params![analysis.as_str(), seq],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Err(StoreError::UnknownId);
        };
        if IssueStatus::parse(&current) != Some(IssueStatus::Open) {
            return Err(StoreError::IssueAlreadyResolved);
        }
        tx.execute(
            "UPDATE quality_issues SET status=?3, updated_at_ms=?4, resolved_at_ms=?4 WHERE analysis=?1 AND seq=?2",
            params![analysis.as_str(), seq, status.as_str(), now_ms],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drops open issues whose target is no longer in the tree. Resolved
    /// issues are kept so their fingerprints keep suppressing re-raises.
    pub fn quality_issues_prune(
        &mut self,
        analysis: &AnalysisId,
        live_targets: &[String],
    ) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut stale = Vec::new();
        {
            let mut stmt = tx.prepare(
                "SELECT seq, target_id FROM quality_issues WHERE analysis=?1 AND status='open' ORDER BY seq ASC",
            )?;
            let mut rows = stmt.query(params![analysis.as_str()])?;
            while let Some(row) = rows.next()? {
                let target = row.get::<_, String>(1)?;
                if !live_targets.contains(&target) {
                    stale.push(row.get::<_, i64>(0)?);
                }
            }
        }
        for seq in &stale {
            tx.execute(
                "DELETE FROM quality_issues WHERE analysis=?1 AND seq=?2",
                params![analysis.as_str(), seq],
            )?;
        }
        tx.commit()?;
        Ok(stale.len())
    }
}

fn resolved_fingerprint_exists_tx(
    tx: &Transaction<'_>,
    analysis: &str,
    fingerprint: &str,
) -> Result<bool, StoreError> {
    Ok(tx
        .query_row(
            "SELECT 1 FROM quality_issues WHERE analysis=?1 AND fingerprint=?2 AND status<>'open' LIMIT 1",
            params![analysis, fingerprint],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}
