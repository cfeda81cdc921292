//! Database schema migrations for crewclock.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current
/// schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: initial schema.
///
/// Four tables: users, timesheets, focus_sessions, help_notes. Open rows
/// are the ones with a NULL ended_at / finished_at; partial indexes cover
/// the open-row lookups the state machine and sweeps run on every call.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            registered_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS timesheets (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      TEXT NOT NULL REFERENCES users(id),
            started_at   TEXT NOT NULL,
            ended_at     TEXT,
            duration_min INTEGER
        );

        CREATE TABLE IF NOT EXISTS focus_sessions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            timesheet_id  INTEGER NOT NULL REFERENCES timesheets(id),
            subject       TEXT NOT NULL,
            started_at    TEXT NOT NULL,
            finished_at   TEXT,
            duration_min  INTEGER,
            status        TEXT NOT NULL DEFAULT 'open',
            blocked_count INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS help_notes (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            focus_session_id INTEGER NOT NULL REFERENCES focus_sessions(id),
            remark           TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_timesheets_open
            ON timesheets(user_id) WHERE ended_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_timesheets_user_started
            ON timesheets(user_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_focus_open
            ON focus_sessions(timesheet_id) WHERE finished_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_focus_status
            ON focus_sessions(status);
        CREATE INDEX IF NOT EXISTS idx_help_notes_session
            ON help_notes(focus_session_id);",
    )?;

    set_schema_version(conn, 1)
}
