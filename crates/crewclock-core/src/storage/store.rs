//! SQLite-backed session store.
//!
//! Durable CRUD for the four core entities (users, timesheets, focus
//! sessions, help notes) plus the invariant-bearing lookups the state
//! machine and the sweeps depend on. Every write is a single statement, so
//! no partial mutation is possible at this layer; close/resolve are
//! conditional updates guarded on the NULL end column.
//!
//! The store wraps its connection in a `Mutex` and is shared via `Arc`
//! between the command path and both sweep loops. Each call is one lock
//! acquisition around one statement; no await point ever holds the lock.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{data_dir, migrations};
use crate::error::{CoreError, DatabaseError, TransitionError};
use crate::model::{
    FocusSession, FocusStatus, HelpNote, OpenFocusRow, Timesheet, User, UserReport,
};

/// Format focus status for database storage.
fn format_status(status: FocusStatus) -> &'static str {
    match status {
        FocusStatus::Open => "open",
        FocusStatus::Reminded => "reminded",
        FocusStatus::Done => "done",
        FocusStatus::NotDone => "not_done",
    }
}

/// Parse focus status from database string.
fn parse_status(status_str: &str) -> FocusStatus {
    match status_str {
        "reminded" => FocusStatus::Reminded,
        "done" => FocusStatus::Done,
        "not_done" => FocusStatus::NotDone,
        _ => FocusStatus::Open,
    }
}

/// Parse an RFC 3339 timestamp stored in column `idx`.
fn parse_ts(idx: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Parse a nullable RFC 3339 timestamp column.
fn parse_ts_opt(idx: usize, value: Option<String>) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    value.as_deref().map(|v| parse_ts(idx, v)).transpose()
}

/// Build a Timesheet from a row of
/// `id, user_id, started_at, ended_at, duration_min`.
fn row_to_timesheet(row: &rusqlite::Row) -> Result<Timesheet, rusqlite::Error> {
    let started_at: String = row.get(2)?;
    Ok(Timesheet {
        id: row.get(0)?,
        user_id: row.get(1)?,
        started_at: parse_ts(2, &started_at)?,
        ended_at: parse_ts_opt(3, row.get(3)?)?,
        duration_min: row.get(4)?,
    })
}

/// Build a FocusSession from a row of
/// `id, timesheet_id, subject, started_at, finished_at, duration_min, status, blocked_count`.
fn row_to_focus_session(row: &rusqlite::Row) -> Result<FocusSession, rusqlite::Error> {
    let started_at: String = row.get(3)?;
    let status: String = row.get(6)?;
    Ok(FocusSession {
        id: row.get(0)?,
        timesheet_id: row.get(1)?,
        subject: row.get(2)?,
        started_at: parse_ts(3, &started_at)?,
        finished_at: parse_ts_opt(4, row.get(4)?)?,
        duration_min: row.get(5)?,
        status: parse_status(&status),
        blocked_count: row.get(7)?,
    })
}

const TIMESHEET_COLS: &str = "id, user_id, started_at, ended_at, duration_min";
const FOCUS_COLS: &str =
    "id, timesheet_id, subject, started_at, finished_at, duration_min, status, blocked_count";

/// SQLite persistence for the session lifecycle.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open the store at `~/.config/crewclock/crewclock.db`, creating the
    /// file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("crewclock.db");
        Self::open_at(path)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let conn = Connection::open(&path)
            .map_err(|source| DatabaseError::OpenFailed { path, source })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (tests and the integration suite).
    pub fn open_memory() -> Result<Self, CoreError> {
        Self::from_connection(Connection::open_in_memory().map_err(DatabaseError::Query)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CoreError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Users ────────────────────────────────────────────────────────

    /// Register a user. Fails with `AlreadyExists` if the id is taken.
    pub fn create_user(
        &self,
        id: &str,
        name: &str,
        registered_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO users (id, name, registered_at) VALUES (?1, ?2, ?3)",
            params![id, name, registered_at.to_rfc3339()],
        )?;
        if inserted == 0 {
            return Err(TransitionError::AlreadyExists(id.to_string()).into());
        }
        Ok(())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, CoreError> {
        let conn = self.conn();
        let user = conn
            .query_row(
                "SELECT id, name, registered_at FROM users WHERE id = ?1",
                params![id],
                |row| {
                    let registered_at: String = row.get(2)?;
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        registered_at: parse_ts(2, &registered_at)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_users(&self) -> Result<Vec<User>, CoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, registered_at FROM users ORDER BY registered_at")?;
        let users = stmt
            .query_map([], |row| {
                let registered_at: String = row.get(2)?;
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    registered_at: parse_ts(2, &registered_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    // ── Timesheets ───────────────────────────────────────────────────

    /// Open a new timesheet. The caller must have already confirmed no open
    /// timesheet exists for the user; the store does not deduplicate.
    pub fn open_timesheet(
        &self,
        user_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO timesheets (user_id, started_at) VALUES (?1, ?2)",
            params![user_id, started_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Find the single open timesheet for a user.
    ///
    /// More than one open row means the invariant was violated upstream;
    /// that surfaces as an integrity error rather than a silent pick.
    pub fn find_open_timesheet(&self, user_id: &str) -> Result<Option<Timesheet>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TIMESHEET_COLS} FROM timesheets WHERE user_id = ?1 AND ended_at IS NULL"
        ))?;
        let mut rows = stmt
            .query_map(params![user_id], row_to_timesheet)?
            .collect::<Result<Vec<_>, _>>()?;
        if rows.len() > 1 {
            return Err(DatabaseError::Integrity(format!(
                "user '{user_id}' has {} open timesheets",
                rows.len()
            ))
            .into());
        }
        Ok(rows.pop())
    }

    /// Close a timesheet. Conditional on it still being open; a raced or
    /// repeated close reports `NotOpen` instead of overwriting.
    pub fn close_timesheet(
        &self,
        id: i64,
        ended_at: DateTime<Utc>,
        duration_min: i64,
    ) -> Result<(), CoreError> {
        let updated = self.conn().execute(
            "UPDATE timesheets SET ended_at = ?2, duration_min = ?3
             WHERE id = ?1 AND ended_at IS NULL",
            params![id, ended_at.to_rfc3339(), duration_min],
        )?;
        if updated == 0 {
            return Err(DatabaseError::NotOpen {
                entity: "timesheet",
                id,
            }
            .into());
        }
        Ok(())
    }

    /// All open timesheets, full rows. Used by the timesheet sweep.
    pub fn list_open_timesheets(&self) -> Result<Vec<Timesheet>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TIMESHEET_COLS} FROM timesheets WHERE ended_at IS NULL ORDER BY started_at"
        ))?;
        let rows = stmt
            .query_map([], row_to_timesheet)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Focus sessions ───────────────────────────────────────────────

    /// Open a focus session on a timesheet. The caller must have confirmed
    /// no open focus session exists on it.
    pub fn open_focus_session(
        &self,
        timesheet_id: i64,
        subject: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO focus_sessions (timesheet_id, subject, started_at)
             VALUES (?1, ?2, ?3)",
            params![timesheet_id, subject, started_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Find the single open focus session on a timesheet.
    pub fn find_open_focus_session(
        &self,
        timesheet_id: i64,
    ) -> Result<Option<FocusSession>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {FOCUS_COLS} FROM focus_sessions
             WHERE timesheet_id = ?1 AND finished_at IS NULL"
        ))?;
        let mut rows = stmt
            .query_map(params![timesheet_id], row_to_focus_session)?
            .collect::<Result<Vec<_>, _>>()?;
        if rows.len() > 1 {
            return Err(DatabaseError::Integrity(format!(
                "timesheet {timesheet_id} has {} open focus sessions",
                rows.len()
            ))
            .into());
        }
        Ok(rows.pop())
    }

    /// Resolve a focus session to a terminal status. Conditional on it
    /// still being open, so a sweep and a live command can never both close
    /// the same session.
    pub fn resolve_focus_session(
        &self,
        id: i64,
        finished_at: DateTime<Utc>,
        duration_min: i64,
        status: FocusStatus,
    ) -> Result<(), CoreError> {
        let updated = self.conn().execute(
            "UPDATE focus_sessions SET finished_at = ?2, duration_min = ?3, status = ?4
             WHERE id = ?1 AND finished_at IS NULL",
            params![
                id,
                finished_at.to_rfc3339(),
                duration_min,
                format_status(status)
            ],
        )?;
        if updated == 0 {
            return Err(DatabaseError::NotOpen {
                entity: "focus session",
                id,
            }
            .into());
        }
        Ok(())
    }

    /// One-shot `open -> reminded` transition. Returns false when the row
    /// was no longer open-and-unreminded, which makes the reminder sweep
    /// idempotent by construction.
    pub fn mark_focus_reminded(&self, id: i64) -> Result<bool, CoreError> {
        let updated = self.conn().execute(
            "UPDATE focus_sessions SET status = 'reminded'
             WHERE id = ?1 AND status = 'open' AND finished_at IS NULL",
            params![id],
        )?;
        Ok(updated == 1)
    }

    pub fn bump_blocked_count(&self, id: i64) -> Result<(), CoreError> {
        self.conn().execute(
            "UPDATE focus_sessions SET blocked_count = blocked_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// All open focus sessions joined with their owning user. Used by the
    /// focus sweep.
    pub fn list_open_focus_sessions(&self) -> Result<Vec<OpenFocusRow>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT f.id, f.timesheet_id, f.subject, f.started_at, f.finished_at,
                    f.duration_min, f.status, f.blocked_count, t.user_id
             FROM focus_sessions f
             JOIN timesheets t ON t.id = f.timesheet_id
             WHERE f.finished_at IS NULL
             ORDER BY f.started_at",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OpenFocusRow {
                    session: row_to_focus_session(row)?,
                    user_id: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Help notes ───────────────────────────────────────────────────

    pub fn add_help_note(
        &self,
        focus_session_id: i64,
        remark: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64, CoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO help_notes (focus_session_id, remark, created_at)
             VALUES (?1, ?2, ?3)",
            params![focus_session_id, remark, created_at.to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn help_notes(&self, focus_session_id: i64) -> Result<Vec<HelpNote>, CoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, focus_session_id, remark, created_at
             FROM help_notes WHERE focus_session_id = ?1 ORDER BY id",
        )?;
        let notes = stmt
            .query_map(params![focus_session_id], |row| {
                let created_at: String = row.get(3)?;
                Ok(HelpNote {
                    id: row.get(0)?,
                    focus_session_id: row.get(1)?,
                    remark: row.get(2)?,
                    created_at: parse_ts(3, &created_at)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    // ── Reporting ────────────────────────────────────────────────────

    /// Completed (done) focus sessions across the user's whole history.
    pub fn completed_focus_count(&self, user_id: &str) -> Result<u64, CoreError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM focus_sessions f
             JOIN timesheets t ON t.id = f.timesheet_id
             WHERE t.user_id = ?1 AND f.status = 'done'",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Closed timesheets started in `[from, to]`, their summed duration,
    /// and completed focus sessions started in the same range.
    pub fn user_report(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<UserReport, CoreError> {
        let conn = self.conn();

        let mut stmt = conn.prepare(&format!(
            "SELECT {TIMESHEET_COLS} FROM timesheets
             WHERE user_id = ?1 AND ended_at IS NOT NULL
               AND started_at >= ?2 AND started_at <= ?3
             ORDER BY started_at"
        ))?;
        let timesheets = stmt
            .query_map(
                params![user_id, from.to_rfc3339(), to.to_rfc3339()],
                row_to_timesheet,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let total_min = timesheets.iter().filter_map(|t| t.duration_min).sum();

        let mut stmt = conn.prepare(
            "SELECT f.id, f.timesheet_id, f.subject, f.started_at, f.finished_at,
                    f.duration_min, f.status, f.blocked_count
             FROM focus_sessions f
             JOIN timesheets t ON t.id = f.timesheet_id
             WHERE t.user_id = ?1 AND f.status = 'done'
               AND f.started_at >= ?2 AND f.started_at <= ?3
             ORDER BY f.started_at",
        )?;
        let completed = stmt
            .query_map(
                params![user_id, from.to_rfc3339(), to.to_rfc3339()],
                row_to_focus_session,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(UserReport {
            timesheets,
            total_min,
            completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_with_user(id: &str) -> SessionStore {
        let store = SessionStore::open_memory().unwrap();
        store.create_user(id, "Test User", Utc::now()).unwrap();
        store
    }

    #[test]
    fn create_user_rejects_duplicate_id() {
        let store = store_with_user("u1");
        let err = store.create_user("u1", "Other Name", Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Transition(TransitionError::AlreadyExists(ref id)) if id == "u1"
        ));
    }

    #[test]
    fn timesheet_open_find_close() {
        let store = store_with_user("u1");
        let start = Utc::now();
        let id = store.open_timesheet("u1", start).unwrap();

        let open = store.find_open_timesheet("u1").unwrap().unwrap();
        assert_eq!(open.id, id);
        assert!(open.is_open());
        assert_eq!(open.started_at, start.with_timezone(&Utc));

        store
            .close_timesheet(id, start + Duration::minutes(90), 90)
            .unwrap();
        assert!(store.find_open_timesheet("u1").unwrap().is_none());
    }

    #[test]
    fn close_timesheet_twice_reports_not_open() {
        let store = store_with_user("u1");
        let id = store.open_timesheet("u1", Utc::now()).unwrap();
        store.close_timesheet(id, Utc::now(), 0).unwrap();

        let err = store.close_timesheet(id, Utc::now(), 0).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::NotOpen { entity: "timesheet", .. })
        ));
    }

    #[test]
    fn find_open_timesheet_flags_integrity_violation() {
        let store = store_with_user("u1");
        // The store itself does not deduplicate; two raw opens violate the
        // invariant and the defensive lookup must say so.
        store.open_timesheet("u1", Utc::now()).unwrap();
        store.open_timesheet("u1", Utc::now()).unwrap();

        let err = store.find_open_timesheet("u1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::Integrity(_))
        ));
    }

    #[test]
    fn focus_session_round_trip() {
        let store = store_with_user("u1");
        let ts = store.open_timesheet("u1", Utc::now()).unwrap();
        let fs = store
            .open_focus_session(ts, "write parser", Utc::now())
            .unwrap();

        let open = store.find_open_focus_session(ts).unwrap().unwrap();
        assert_eq!(open.id, fs);
        assert_eq!(open.subject, "write parser");
        assert_eq!(open.status, FocusStatus::Open);
        assert_eq!(open.blocked_count, 0);

        store
            .resolve_focus_session(fs, Utc::now(), 25, FocusStatus::Done)
            .unwrap();
        assert!(store.find_open_focus_session(ts).unwrap().is_none());
        assert_eq!(store.completed_focus_count("u1").unwrap(), 1);
    }

    #[test]
    fn resolve_focus_twice_reports_not_open() {
        let store = store_with_user("u1");
        let ts = store.open_timesheet("u1", Utc::now()).unwrap();
        let fs = store.open_focus_session(ts, "x", Utc::now()).unwrap();
        store
            .resolve_focus_session(fs, Utc::now(), 1, FocusStatus::NotDone)
            .unwrap();

        let err = store
            .resolve_focus_session(fs, Utc::now(), 1, FocusStatus::Done)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Database(DatabaseError::NotOpen { entity: "focus session", .. })
        ));
        // A failed second resolve must not overwrite the first outcome.
        assert_eq!(store.completed_focus_count("u1").unwrap(), 0);
    }

    #[test]
    fn mark_reminded_fires_once() {
        let store = store_with_user("u1");
        let ts = store.open_timesheet("u1", Utc::now()).unwrap();
        let fs = store.open_focus_session(ts, "x", Utc::now()).unwrap();

        assert!(store.mark_focus_reminded(fs).unwrap());
        assert!(!store.mark_focus_reminded(fs).unwrap());

        let row = store.find_open_focus_session(ts).unwrap().unwrap();
        assert_eq!(row.status, FocusStatus::Reminded);
    }

    #[test]
    fn help_notes_append_and_bump() {
        let store = store_with_user("u1");
        let ts = store.open_timesheet("u1", Utc::now()).unwrap();
        let fs = store.open_focus_session(ts, "x", Utc::now()).unwrap();

        store.add_help_note(fs, "stuck on borrow checker", Utc::now()).unwrap();
        store.bump_blocked_count(fs).unwrap();
        store.add_help_note(fs, "still stuck", Utc::now()).unwrap();
        store.bump_blocked_count(fs).unwrap();

        let notes = store.help_notes(fs).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].remark, "stuck on borrow checker");

        let row = store.find_open_focus_session(ts).unwrap().unwrap();
        assert_eq!(row.blocked_count, 2);
        // Blocker reports do not change the status.
        assert_eq!(row.status, FocusStatus::Open);
    }

    #[test]
    fn sweep_listings_return_full_rows() {
        let store = store_with_user("u1");
        store.create_user("u2", "Second", Utc::now()).unwrap();
        let ts1 = store.open_timesheet("u1", Utc::now()).unwrap();
        let ts2 = store.open_timesheet("u2", Utc::now()).unwrap();
        store.open_focus_session(ts2, "review", Utc::now()).unwrap();

        let sheets = store.list_open_timesheets().unwrap();
        assert_eq!(sheets.len(), 2);

        let focus = store.list_open_focus_sessions().unwrap();
        assert_eq!(focus.len(), 1);
        assert_eq!(focus[0].user_id, "u2");
        assert_eq!(focus[0].session.timesheet_id, ts2);

        store.close_timesheet(ts1, Utc::now(), 0).unwrap();
        assert_eq!(store.list_open_timesheets().unwrap().len(), 1);
    }

    #[test]
    fn user_report_sums_closed_timesheets_in_range() {
        let store = store_with_user("u1");
        let t0 = Utc::now() - Duration::hours(12);

        let a = store.open_timesheet("u1", t0).unwrap();
        store.close_timesheet(a, t0 + Duration::hours(1), 60).unwrap();

        let b = store.open_timesheet("u1", t0 + Duration::hours(2)).unwrap();
        store
            .close_timesheet(b, t0 + Duration::hours(4), 120)
            .unwrap();

        // Still-open timesheet must not appear in the report.
        store.open_timesheet("u1", t0 + Duration::hours(5)).unwrap();

        let report = store
            .user_report("u1", t0 - Duration::hours(1), t0 + Duration::hours(6))
            .unwrap();
        assert_eq!(report.timesheets.len(), 2);
        assert_eq!(report.total_min, 180);
        assert!(report.completed.is_empty());
    }

    #[test]
    fn user_report_includes_completed_focus_in_range() {
        let store = store_with_user("u1");
        let t0 = Utc::now() - Duration::hours(3);
        let ts = store.open_timesheet("u1", t0).unwrap();

        let done = store.open_focus_session(ts, "done one", t0).unwrap();
        store
            .resolve_focus_session(done, t0 + Duration::minutes(25), 25, FocusStatus::Done)
            .unwrap();
        let failed = store
            .open_focus_session(ts, "abandoned one", t0 + Duration::hours(1))
            .unwrap();
        store
            .resolve_focus_session(
                failed,
                t0 + Duration::hours(1) + Duration::minutes(5),
                5,
                FocusStatus::NotDone,
            )
            .unwrap();
        store.close_timesheet(ts, t0 + Duration::hours(2), 120).unwrap();

        let report = store
            .user_report("u1", t0 - Duration::hours(1), Utc::now())
            .unwrap();
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].subject, "done one");
    }

    #[test]
    fn open_at_creates_a_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crewclock.db");
        {
            let store = SessionStore::open_at(&path).unwrap();
            store.create_user("u1", "Disk User", Utc::now()).unwrap();
        }
        // Reopen and observe persisted state.
        let store = SessionStore::open_at(&path).unwrap();
        assert_eq!(store.get_user("u1").unwrap().unwrap().name, "Disk User");
    }
}
