use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    // Base schema, idempotent CREATE TABLE IF NOT EXISTS
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tags (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            title       TEXT NOT NULL CHECK(length(title) <= 100),
            description TEXT NOT NULL DEFAULT '' CHECK(length(description) <= 500),
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
            tag_id      TEXT REFERENCES tags(id) ON DELETE SET NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_tag      ON tasks(tag_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_category ON tasks(category_id);

        CREATE TABLE IF NOT EXISTS attachments (
            id              TEXT PRIMARY KEY,
            task_id         TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            storage_path    TEXT NOT NULL,
            media_type      TEXT NOT NULL,
            derived_from_id TEXT,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_attachments_task ON attachments(task_id);
        ",
    )
    .to_db()?;

    // Versioned migrations
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        // v1: derivation lookups for PDF page images
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_attachments_derived
                 ON attachments(derived_from_id);",
        )
        .to_db()?;
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'))",
            [],
        )
        .to_db()?;
    }

    Ok(())
}
