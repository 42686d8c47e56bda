use rusqlite::Connection;

use crate::error::Result;

/// Initialise the users and tasks tables.
///
/// Safe to call on every startup; uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT    NOT NULL UNIQUE,
            email       TEXT,
            enabled     INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            title         TEXT    NOT NULL,
            description   TEXT,
            due_date      TEXT,               -- YYYY-MM-DD or NULL
            completed     INTEGER NOT NULL DEFAULT 0,
            priority      TEXT    DEFAULT 'MEDIUM',
            status        TEXT    NOT NULL DEFAULT 'PENDING',
            user_id       INTEGER NOT NULL REFERENCES users(id),
            completed_at  TEXT,               -- RFC 3339 or NULL
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        );

        -- Sweep and restore queries: WHERE completed = 0 AND due_date ...
        CREATE INDEX IF NOT EXISTS idx_tasks_open_due
            ON tasks (completed, due_date);",
    )?;
    Ok(())
}
