//! Background sweep scheduler.
//!
//! Two independently-ticking loops reclaim sessions that silently exceeded
//! a timeout: the focus sweep fires the one-shot reminder (and the optional
//! auto-close), the timesheet sweep force-checks-out sessions past the
//! maximum duration. Both go through [`SessionMachine`] entry points only
//! and never write to the store directly, so a sweep can never violate the
//! single-open-session invariants.
//!
//! Each scanned row is processed independently; a failure on one row is
//! logged and the pass moves on, and anything still open is picked up again
//! on the next tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::lifecycle::SessionMachine;
use crate::model::FocusStatus;
use crate::storage::{SessionStore, SweepConfig};

pub struct SweepScheduler {
    machine: Arc<SessionMachine>,
    store: Arc<SessionStore>,
    config: SweepConfig,
}

impl SweepScheduler {
    pub fn new(
        machine: Arc<SessionMachine>,
        store: Arc<SessionStore>,
        config: SweepConfig,
    ) -> Self {
        Self {
            machine,
            store,
            config,
        }
    }

    /// One focus-sweep pass at `now`. Returns the number of transitions
    /// performed; zero when nothing is due, which makes an immediate
    /// repeat a no-op.
    pub fn focus_pass(&self, now: DateTime<Utc>) -> usize {
        let rows = match self.store.list_open_focus_sessions() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("focus sweep: cannot list open sessions: {e}");
                return 0;
            }
        };

        let reminder_after = self.config.reminder_after();
        let auto_close_after = self.config.auto_close_after();
        let mut acted = 0;

        for row in rows {
            let elapsed = now - row.session.started_at;

            if let Some(limit) = auto_close_after {
                if elapsed >= limit {
                    match self.machine.expire_focus(&row, now) {
                        Ok(()) => {
                            info!(
                                session_id = row.session.id,
                                user_id = %row.user_id,
                                "focus session auto-closed after {} min",
                                elapsed.num_minutes()
                            );
                            acted += 1;
                        }
                        Err(e) => {
                            warn!(session_id = row.session.id, "focus sweep: auto-close failed: {e}");
                        }
                    }
                    continue;
                }
            }

            if row.session.status == FocusStatus::Open && elapsed >= reminder_after {
                match self.machine.remind_focus(&row, now) {
                    Ok(true) => acted += 1,
                    // Lost the race to another transition; nothing to do.
                    Ok(false) => {}
                    Err(e) => {
                        warn!(session_id = row.session.id, "focus sweep: reminder failed: {e}");
                    }
                }
            }
        }
        acted
    }

    /// One timesheet-sweep pass at `now`. Returns the number of forced
    /// checkouts.
    pub fn timesheet_pass(&self, now: DateTime<Utc>) -> usize {
        let rows = match self.store.list_open_timesheets() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("timesheet sweep: cannot list open timesheets: {e}");
                return 0;
            }
        };

        let max_session = self.config.max_session();
        let mut acted = 0;

        for timesheet in rows {
            if now - timesheet.started_at < max_session {
                continue;
            }
            match self.machine.force_check_out(&timesheet.user_id, now) {
                Ok(duration_min) => {
                    info!(
                        timesheet_id = timesheet.id,
                        user_id = %timesheet.user_id,
                        "timesheet force-closed after {duration_min} min"
                    );
                    acted += 1;
                }
                // Already checked out by a concurrent command; the listing
                // was just stale.
                Err(CoreError::Transition(_)) => {}
                Err(e) => {
                    warn!(
                        timesheet_id = timesheet.id,
                        "timesheet sweep: forced checkout failed: {e}"
                    );
                }
            }
        }
        acted
    }

    /// Spawn both loops onto the current runtime. They stop when
    /// `shutdown` flips to true (or its sender is dropped); an in-flight
    /// pass always completes before the loop exits.
    pub fn spawn(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, JoinHandle<()>) {
        let focus = {
            let sched = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sched.config.focus_tick());
                info!(
                    "focus sweep started (tick {}s, reminder after {} min)",
                    sched.config.focus_tick_secs, sched.config.reminder_after_min
                );
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let acted = sched.focus_pass(Utc::now());
                            if acted > 0 {
                                debug!("focus sweep acted on {acted} sessions");
                            }
                        }
                        res = shutdown.changed() => {
                            if res.is_err() || *shutdown.borrow() {
                                info!("focus sweep stopping");
                                break;
                            }
                        }
                    }
                }
            })
        };

        let timesheet = {
            let sched = self;
            let mut shutdown = shutdown;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sched.config.timesheet_tick());
                info!(
                    "timesheet sweep started (tick {}s, max session {} min)",
                    sched.config.timesheet_tick_secs, sched.config.max_session_min
                );
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            let acted = sched.timesheet_pass(Utc::now());
                            if acted > 0 {
                                debug!("timesheet sweep acted on {acted} timesheets");
                            }
                        }
                        res = shutdown.changed() => {
                            if res.is_err() || *shutdown.borrow() {
                                info!("timesheet sweep stopping");
                                break;
                            }
                        }
                    }
                }
            })
        };

        (focus, timesheet)
    }
}
