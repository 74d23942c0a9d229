//! SQLite DDL definitions for the task store.
//!
//! All `CREATE TABLE` / `CREATE INDEX` statements live here so they are
//! reviewable and testable in isolation.

use rusqlite::Connection;

/// Complete DDL for the task database.
///
/// Uses `IF NOT EXISTS` throughout so `apply_schema` is idempotent.
pub(crate) const SCHEMA_SQL: &str = r#"
-- Enable WAL mode for concurrent reads during writes.
PRAGMA journal_mode = WAL;

-- Enforce foreign key constraints.
PRAGMA foreign_keys = ON;

-- Schema version tracking.
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,   -- trimmed, lower-cased
    password_hash TEXT NOT NULL,          -- Argon2 PHC string
    created_at    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_complete INTEGER NOT NULL DEFAULT 0,
    due_at_ms   INTEGER NOT NULL,         -- Unix epoch milliseconds, UTC
    priority    TEXT NOT NULL DEFAULT 'medium',
    category    TEXT NOT NULL DEFAULT '',
    created_at  INTEGER NOT NULL DEFAULT 0
);

-- Every task query is scoped by owner.
CREATE INDEX IF NOT EXISTS idx_tasks_owner_due      ON tasks(owner_id, due_at_ms);
CREATE INDEX IF NOT EXISTS idx_tasks_owner_category ON tasks(owner_id, category);
CREATE INDEX IF NOT EXISTS idx_tasks_owner_priority ON tasks(owner_id, priority);
"#;

/// Apply the full schema to an open connection.
///
/// Safe to call multiple times. Seeds the schema version on a fresh
/// database.
pub(crate) fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version_str = super::types::CURRENT_SCHEMA_VERSION.to_string();
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        rusqlite::params![version_str],
    )?;

    Ok(())
}

/// Read the current schema version from the database.
///
/// Returns `None` if the `schema_meta` table is empty or the key is missing.
pub(crate) fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<u32>> {
    let mut stmt = conn.prepare("SELECT value FROM schema_meta WHERE key = 'schema_version'")?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().ok())
        }
        None => Ok(None),
    }
}
