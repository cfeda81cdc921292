//! Session lifecycle state machine.
//!
//! Per user the states are `CheckedOut -> CheckedIn -> FocusActive ->
//! CheckedIn (loop) -> CheckedOut`; registration is a precondition for all
//! of them. Every entry point re-reads current state from the store,
//! computes `now` exactly once, and performs single-statement writes, so a
//! transition that touches two rows (focus session + timesheet) still
//! yields internally consistent durations.
//!
//! The sweep scheduler drives abandoned sessions through the same entry
//! points as the live command path; nothing outside this module writes
//! session state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{CoreError, TransitionError};
use crate::events::Event;
use crate::model::{FocusOutcome, FocusStatus, OpenFocusRow, Timesheet, User, UserReport};
use crate::rewards::RewardLadder;
use crate::storage::SessionStore;

/// Whole minutes between two instants, floored at zero.
fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes().max(0)
}

/// State machine over the session store.
///
/// Shared between the command handlers and the sweep loops; all methods
/// take `&self`.
pub struct SessionMachine {
    store: Arc<SessionStore>,
    events: UnboundedSender<Event>,
    ladder: RewardLadder,
}

impl SessionMachine {
    pub fn new(store: Arc<SessionStore>, events: UnboundedSender<Event>) -> Self {
        Self {
            store,
            events,
            ladder: RewardLadder::default(),
        }
    }

    /// Replace the default reward ladder (normally from config).
    pub fn with_ladder(mut self, ladder: RewardLadder) -> Self {
        self.ladder = ladder;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Outbound notifications are fire-and-forget; a gone receiver is fine.
    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }

    // ── Live command entry points ────────────────────────────────────

    /// Register a new roster member.
    pub fn register(&self, user_id: &str, name: &str) -> Result<User, CoreError> {
        let now = Utc::now();
        self.store.create_user(user_id, name, now)?;
        Ok(User {
            id: user_id.to_string(),
            name: name.to_string(),
            registered_at: now,
        })
    }

    /// Check in, opening a new timesheet. Returns its id.
    pub fn check_in(&self, user_id: &str) -> Result<i64, CoreError> {
        let now = Utc::now();
        if self.store.get_user(user_id)?.is_none() {
            return Err(TransitionError::NotRegistered(user_id.to_string()).into());
        }
        if self.store.find_open_timesheet(user_id)?.is_some() {
            return Err(TransitionError::AlreadyCheckedIn(user_id.to_string()).into());
        }
        let timesheet_id = self.store.open_timesheet(user_id, now)?;
        self.emit(Event::CheckedIn {
            user_id: user_id.to_string(),
            timesheet_id,
            at: now,
        });
        Ok(timesheet_id)
    }

    /// Start a focus session on the open timesheet. Returns its id.
    pub fn start_focus(&self, user_id: &str, subject: &str) -> Result<i64, CoreError> {
        let now = Utc::now();
        let timesheet = self
            .store
            .find_open_timesheet(user_id)?
            .ok_or_else(|| TransitionError::NotCheckedIn(user_id.to_string()))?;
        if self.store.find_open_focus_session(timesheet.id)?.is_some() {
            return Err(TransitionError::FocusSessionAlreadyActive(user_id.to_string()).into());
        }
        let session_id = self
            .store
            .open_focus_session(timesheet.id, subject, now)?;
        self.emit(Event::FocusStarted {
            user_id: user_id.to_string(),
            session_id,
            subject: subject.to_string(),
            at: now,
        });
        Ok(session_id)
    }

    /// Resolve the active focus session. Returns its duration in minutes.
    ///
    /// A `Done` outcome recounts the user's completed sessions and signals
    /// a tier grant when a ladder threshold is newly crossed.
    pub fn resolve_focus(
        &self,
        user_id: &str,
        outcome: FocusOutcome,
    ) -> Result<i64, CoreError> {
        let now = Utc::now();
        let session = self.active_focus(user_id)?;
        let duration_min = minutes_between(session.started_at, now);
        self.store
            .resolve_focus_session(session.id, now, duration_min, outcome.status())?;
        self.emit(Event::FocusResolved {
            user_id: user_id.to_string(),
            session_id: session.id,
            outcome,
            duration_min,
            at: now,
        });
        if outcome == FocusOutcome::Done {
            let count = self.store.completed_focus_count(user_id)?;
            if let Some(tier) = self.ladder.newly_crossed(count) {
                self.emit(Event::TierReached {
                    user_id: user_id.to_string(),
                    tier: tier.label.clone(),
                    threshold: tier.threshold,
                    at: now,
                });
            }
        }
        Ok(duration_min)
    }

    /// Record a blocker on the active focus session. The session status is
    /// untouched; only the note is appended and the counter bumped.
    pub fn report_blocked(&self, user_id: &str, remark: &str) -> Result<(), CoreError> {
        let now = Utc::now();
        let session = self.active_focus(user_id)?;
        self.store.add_help_note(session.id, remark, now)?;
        self.store.bump_blocked_count(session.id)?;
        self.emit(Event::HelpRequested {
            user_id: user_id.to_string(),
            session_id: session.id,
            remark: remark.to_string(),
            at: now,
        });
        Ok(())
    }

    /// Check out, closing the open timesheet. Any open focus session is
    /// force-resolved as not done first (a focus session cannot outlive its
    /// timesheet). Returns the timesheet duration in minutes.
    pub fn check_out(&self, user_id: &str) -> Result<i64, CoreError> {
        self.check_out_inner(user_id, Utc::now(), false)
    }

    /// Pass-through to the store's report query so collaborators never
    /// touch the store directly.
    pub fn report(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<UserReport, CoreError> {
        self.store.user_report(user_id, from, to)
    }

    pub fn roster(&self) -> Result<Vec<User>, CoreError> {
        self.store.list_users()
    }

    // ── Sweep entry points ───────────────────────────────────────────

    /// One-shot reminder transition for a focus session past the
    /// threshold. Returns false when the row already left the `Open`
    /// status, which makes repeated sweeps a no-op.
    pub fn remind_focus(&self, row: &OpenFocusRow, now: DateTime<Utc>) -> Result<bool, CoreError> {
        if !self.store.mark_focus_reminded(row.session.id)? {
            return Ok(false);
        }
        self.emit(Event::FocusReminder {
            user_id: row.user_id.clone(),
            session_id: row.session.id,
            elapsed_min: minutes_between(row.session.started_at, now),
            at: now,
        });
        Ok(true)
    }

    /// Force-resolve an overdue focus session as not done (the optional
    /// auto-close policy). The conditional resolve guarantees it cannot
    /// double-fire against a session the user just resolved.
    pub fn expire_focus(&self, row: &OpenFocusRow, now: DateTime<Utc>) -> Result<(), CoreError> {
        let duration_min = minutes_between(row.session.started_at, now);
        self.store
            .resolve_focus_session(row.session.id, now, duration_min, FocusStatus::NotDone)?;
        self.emit(Event::FocusResolved {
            user_id: row.user_id.clone(),
            session_id: row.session.id,
            outcome: FocusOutcome::NotDone,
            duration_min,
            at: now,
        });
        Ok(())
    }

    /// Forced checkout for a timesheet past the maximum duration. Same
    /// cascade as a live checkout, with the event marked `forced`.
    pub fn force_check_out(&self, user_id: &str, now: DateTime<Utc>) -> Result<i64, CoreError> {
        self.check_out_inner(user_id, now, true)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn active_focus(
        &self,
        user_id: &str,
    ) -> Result<crate::model::FocusSession, CoreError> {
        let timesheet = self
            .store
            .find_open_timesheet(user_id)?
            .ok_or_else(|| TransitionError::NoActiveFocusSession(user_id.to_string()))?;
        self.store
            .find_open_focus_session(timesheet.id)?
            .ok_or_else(|| TransitionError::NoActiveFocusSession(user_id.to_string()).into())
    }

    fn check_out_inner(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        forced: bool,
    ) -> Result<i64, CoreError> {
        let timesheet: Timesheet = self
            .store
            .find_open_timesheet(user_id)?
            .ok_or_else(|| TransitionError::NotCheckedIn(user_id.to_string()))?;

        if let Some(session) = self.store.find_open_focus_session(timesheet.id)? {
            let duration_min = minutes_between(session.started_at, now);
            self.store
                .resolve_focus_session(session.id, now, duration_min, FocusStatus::NotDone)?;
            self.emit(Event::FocusResolved {
                user_id: user_id.to_string(),
                session_id: session.id,
                outcome: FocusOutcome::NotDone,
                duration_min,
                at: now,
            });
        }

        let duration_min = minutes_between(timesheet.started_at, now);
        self.store
            .close_timesheet(timesheet.id, now, duration_min)?;
        self.emit(Event::CheckedOut {
            user_id: user_id.to_string(),
            timesheet_id: timesheet.id,
            duration_min,
            forced,
            at: now,
        });
        Ok(duration_min)
    }
}
