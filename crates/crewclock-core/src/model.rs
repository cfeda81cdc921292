//! Entity types persisted by the session store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered roster member.
///
/// Created once on registration, never deleted by the core. Only the
/// display name may change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Platform user id (unique).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Registration timestamp.
    pub registered_at: DateTime<Utc>,
}

/// One check-in interval for a user.
///
/// `ended_at` is `None` while the user is on the clock. At most one open
/// timesheet may exist per user at any moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: i64,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole minutes, computed at close.
    pub duration_min: Option<i64>,
}

impl Timesheet {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Lifecycle status of a focus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusStatus {
    /// Just started, no reminder sent yet.
    Open,
    /// The focus sweep fired the one-shot reminder.
    Reminded,
    /// User marked the session complete.
    Done,
    /// User marked it incomplete, or a sweep / checkout force-closed it.
    NotDone,
}

/// Outcome a user reports when resolving a focus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusOutcome {
    Done,
    NotDone,
}

impl FocusOutcome {
    /// Terminal status this outcome resolves the session to.
    pub fn status(self) -> FocusStatus {
        match self {
            FocusOutcome::Done => FocusStatus::Done,
            FocusOutcome::NotDone => FocusStatus::NotDone,
        }
    }
}

/// One focus interval ("pomodoro") nested inside an open timesheet.
///
/// At most one focus session per timesheet may be open (`finished_at` null),
/// and a focus session cannot outlive its owning timesheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSession {
    pub id: i64,
    pub timesheet_id: i64,
    /// What the member said they are working on.
    pub subject: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Whole minutes, computed at resolution.
    pub duration_min: Option<i64>,
    pub status: FocusStatus,
    /// How many times the member reported being blocked.
    pub blocked_count: i64,
}

impl FocusSession {
    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// A free-text blocker report attached to a focus session. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpNote {
    pub id: i64,
    pub focus_session_id: i64,
    pub remark: String,
    pub created_at: DateTime<Utc>,
}

/// An open focus session joined with its owning user, as scanned by the
/// focus sweep. Carrying the user id avoids a second round trip when the
/// sweep addresses the owner.
#[derive(Debug, Clone)]
pub struct OpenFocusRow {
    pub session: FocusSession,
    pub user_id: String,
}

/// Result of a per-user report query over a time range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReport {
    /// Closed timesheets whose start falls in range.
    pub timesheets: Vec<Timesheet>,
    /// Sum of their durations in minutes.
    pub total_min: i64,
    /// Completed focus sessions started in range.
    pub completed: Vec<FocusSession>,
}
