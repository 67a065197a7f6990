#![forbid(unsafe_code)]

mod backend;
mod error;
mod issues;
mod schema;
mod tree;

pub use error::StoreError;
pub use issues::{IssueRecordSummary, IssueStatus, StoredIssue};
pub use tree::{IdKind, TreeApplySummary};

use fta_core::ids::AnalysisId;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE_NAME: &str = "fta.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys = ON;",
        )?;

        schema::preflight_gate(&conn)?;
        schema::install_schema(&conn)?;

        tracing::debug!(dir = %storage_dir.display(), "sqlite store opened");
        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Registers the analysis if it is new. Returns `true` when a row was
    /// created.
    pub fn ensure_analysis(&mut self, analysis: &AnalysisId) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        let created = ensure_analysis_tx(&tx, analysis.as_str(), now_ms())?;
        tx.commit()?;
        Ok(created)
    }

    pub fn analysis_exists(&self, analysis: &AnalysisId) -> Result<bool, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT 1 FROM analyses WHERE analysis=?1",
                params![analysis.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some())
    }

    pub fn list_analyses(&self) -> Result<Vec<AnalysisId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT analysis FROM analyses ORDER BY created_at_ms ASC, analysis ASC")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let raw = row.get::<_, String>(0)?;
            let id = AnalysisId::try_new(raw.clone()).map_err(|_| StoreError::CorruptRow {
                table: "analyses",
                id: raw,
                message: "invalid analysis id",
            })?;
            out.push(id);
        }
        Ok(out)
    }

    /// Drops the analysis and everything stored under it.
    pub fn delete_analysis(&mut self, analysis: &AnalysisId) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM analyses WHERE analysis=?1",
            params![analysis.as_str()],
        )?;
        if removed == 0 {
            return Err(StoreError::UnknownId);
        }
        tx.commit()?;
        tracing::debug!(analysis = %analysis, "analysis deleted");
        Ok(())
    }
}

fn ensure_analysis_tx(
    tx: &Transaction<'_>,
    analysis: &str,
    now_ms: i64,
) -> Result<bool, StoreError> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO analyses(analysis, created_at_ms, updated_at_ms) VALUES (?1, ?2, ?2)",
        params![analysis, now_ms],
    )?;
    Ok(inserted > 0)
}

fn touch_analysis_tx(tx: &Transaction<'_>, analysis: &str, now_ms: i64) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE analyses SET updated_at_ms=?2 WHERE analysis=?1",
        params![analysis, now_ms],
    )?;
    Ok(())
}

fn next_counter_tx(tx: &Transaction<'_>, analysis: &str, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE analysis=?1 AND name=?2",
            params![analysis, name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        r#"
        INSERT INTO counters(analysis, name, value) VALUES (?1, ?2, ?3)
        ON CONFLICT(analysis, name) DO UPDATE SET value=excluded.value
        "#,
        params![analysis, name, next],
    )?;
    Ok(next)
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
