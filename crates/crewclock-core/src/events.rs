use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::FocusOutcome;

/// Every externally-visible state change in the session lifecycle produces
/// an Event. The messaging surface (chat bot, CLI) receives them over an
/// unbounded channel; delivery is fire-and-forget and a closed receiver is
/// not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    CheckedIn {
        user_id: String,
        timesheet_id: i64,
        at: DateTime<Utc>,
    },
    FocusStarted {
        user_id: String,
        session_id: i64,
        subject: String,
        at: DateTime<Utc>,
    },
    /// The focus sweep noticed a session past the reminder threshold.
    /// Fires exactly once per session.
    FocusReminder {
        user_id: String,
        session_id: i64,
        elapsed_min: i64,
        at: DateTime<Utc>,
    },
    FocusResolved {
        user_id: String,
        session_id: i64,
        outcome: FocusOutcome,
        duration_min: i64,
        at: DateTime<Utc>,
    },
    /// A blocker was reported on the active focus session.
    HelpRequested {
        user_id: String,
        session_id: i64,
        remark: String,
        at: DateTime<Utc>,
    },
    CheckedOut {
        user_id: String,
        timesheet_id: i64,
        duration_min: i64,
        /// True when a sweep forced the checkout.
        forced: bool,
        at: DateTime<Utc>,
    },
    /// A completed-session threshold was newly crossed; the caller is
    /// responsible for granting the corresponding badge/role.
    TierReached {
        user_id: String,
        tier: String,
        threshold: u64,
        at: DateTime<Utc>,
    },
}
