#![forbid(unsafe_code)]

use super::{StoreError, now_ms};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

pub(super) const SCHEMA_VERSION: i64 = 1;

const TABLES: [&str; 7] = [
    "store_state",
    "analyses",
    "counters",
    "tree_nodes",
    "tree_edges",
    "tree_retired",
    "quality_issues",
];

/// Refuses to open a database laid out by something else. An empty file is
/// fine; anything else must carry exactly our tables at our version.
pub(super) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let required: BTreeSet<&str> = TABLES.into_iter().collect();
    if tables.iter().any(|table| !required.contains(table.as_str())) {
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: unsupported tables detected",
        ));
    }
    if required.iter().any(|table| !tables.contains(*table)) {
        return Err(StoreError::InvalidInput(
            "RESET_REQUIRED: required table is missing",
        ));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(SCHEMA_VERSION) => Ok(()),
        Some(_) => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::InvalidInput(
            "RESET_REQUIRED: schema state row is missing",
        )),
    }
}

pub(super) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS analyses (
          analysis TEXT PRIMARY KEY,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          analysis TEXT NOT NULL,
          name TEXT NOT NULL,
          value INTEGER NOT NULL,
          PRIMARY KEY (analysis, name),
          FOREIGN KEY(analysis) REFERENCES analyses(analysis) ON DELETE CASCADE
        );

        -- `ord` keeps insertion order so children come back in edge order.
        CREATE TABLE IF NOT EXISTS tree_nodes (
          analysis TEXT NOT NULL,
          id TEXT NOT NULL,
          ord INTEGER NOT NULL,
          node_type TEXT NOT NULL,
          label TEXT NOT NULL,
          pos_x REAL NOT NULL,
          pos_y REAL NOT NULL,
          units TEXT,
          specification TEXT,
          notes TEXT,
          tags_json TEXT NOT NULL,
          evidence_status TEXT,
          gate_type TEXT,
          severity INTEGER,
          occurrence INTEGER,
          detection INTEGER,
          action_json TEXT,
          custom_fields_json TEXT NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (analysis, id),
          FOREIGN KEY(analysis) REFERENCES analyses(analysis) ON DELETE CASCADE,
          CHECK(severity IS NULL OR severity BETWEEN 1 AND 10),
          CHECK(occurrence IS NULL OR occurrence BETWEEN 1 AND 10),
          CHECK(detection IS NULL OR detection BETWEEN 1 AND 10)
        );

        CREATE TABLE IF NOT EXISTS tree_edges (
          analysis TEXT NOT NULL,
          id TEXT NOT NULL,
          ord INTEGER NOT NULL,
          source_id TEXT NOT NULL,
          target_id TEXT NOT NULL,
          gate_type TEXT,
          PRIMARY KEY (analysis, id),
          FOREIGN KEY(analysis, source_id)
            REFERENCES tree_nodes(analysis, id)
            ON DELETE CASCADE,
          FOREIGN KEY(analysis, target_id)
            REFERENCES tree_nodes(analysis, id)
            ON DELETE CASCADE,
          CHECK(source_id <> target_id)
        );

        -- Order keys of deleted rows. Ids are never reused, so a row that
        -- comes back under its old id is a restore and takes its old place.
        CREATE TABLE IF NOT EXISTS tree_retired (
          analysis TEXT NOT NULL,
          kind TEXT NOT NULL CHECK(kind IN ('node', 'edge')),
          id TEXT NOT NULL,
          ord INTEGER NOT NULL,
          PRIMARY KEY (analysis, kind, id),
          FOREIGN KEY(analysis) REFERENCES analyses(analysis) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS quality_issues (
          analysis TEXT NOT NULL,
          seq INTEGER NOT NULL,
          target_id TEXT NOT NULL,
          issue_kind TEXT NOT NULL,
          original_text TEXT NOT NULL,
          suggested_text TEXT NOT NULL,
          confidence TEXT NOT NULL,
          evidence_required TEXT NOT NULL,
          verification_method TEXT NOT NULL,
          fingerprint TEXT NOT NULL,
          status TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          resolved_at_ms INTEGER,
          PRIMARY KEY (analysis, seq),
          FOREIGN KEY(analysis) REFERENCES analyses(analysis) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_tree_nodes_analysis_ord
          ON tree_nodes(analysis, ord);
        CREATE INDEX IF NOT EXISTS idx_tree_edges_analysis_ord
          ON tree_edges(analysis, ord);
        CREATE INDEX IF NOT EXISTS idx_quality_issues_target
          ON quality_issues(analysis, target_id, issue_kind, status);
        CREATE INDEX IF NOT EXISTS idx_quality_issues_fingerprint
          ON quality_issues(analysis, fingerprint);
        "#,
    )?;

    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET schema_version=excluded.schema_version, updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms()],
    )?;

    Ok(())
}
