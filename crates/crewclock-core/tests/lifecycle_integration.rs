//! End-to-end lifecycle tests: live commands and sweeps driving the same
//! state machine against one in-memory store.

use std::sync::Arc;

use chrono::{Duration, Utc};
use crewclock_core::{
    Event, FocusOutcome, FocusStatus, SessionMachine, SessionStore, SweepConfig, SweepScheduler,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

struct Harness {
    store: Arc<SessionStore>,
    machine: Arc<SessionMachine>,
    sweep: SweepScheduler,
    rx: UnboundedReceiver<Event>,
}

fn harness(config: SweepConfig) -> Harness {
    let store = Arc::new(SessionStore::open_memory().unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    let machine = Arc::new(SessionMachine::new(Arc::clone(&store), tx));
    let sweep = SweepScheduler::new(Arc::clone(&machine), Arc::clone(&store), config);
    Harness {
        store,
        machine,
        sweep,
        rx,
    }
}

fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn full_day_of_one_member() {
    let mut h = harness(SweepConfig::default());
    h.machine.register("alice", "Alice").unwrap();

    // Morning: check in, run one pomodoro to completion.
    h.machine.check_in("alice").unwrap();
    h.machine.start_focus("alice", "API design").unwrap();
    h.machine.report_blocked("alice", "waiting on review").unwrap();
    let duration = h.machine.resolve_focus("alice", FocusOutcome::Done).unwrap();
    assert!(duration >= 0);

    // Second pomodoro abandoned at checkout.
    h.machine.start_focus("alice", "write tests").unwrap();
    h.machine.check_out("alice").unwrap();

    assert!(h.store.list_open_timesheets().unwrap().is_empty());
    assert!(h.store.list_open_focus_sessions().unwrap().is_empty());
    assert_eq!(h.store.completed_focus_count("alice").unwrap(), 1);

    let events = drain(&mut h.rx);
    assert!(events.iter().any(|e| matches!(e, Event::CheckedIn { .. })));
    assert!(events.iter().any(|e| matches!(e, Event::HelpRequested { .. })));
    assert!(events.iter().any(
        |e| matches!(e, Event::FocusResolved { outcome: FocusOutcome::Done, .. })
    ));
    assert!(events.iter().any(
        |e| matches!(e, Event::FocusResolved { outcome: FocusOutcome::NotDone, .. })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::TierReached { threshold: 1, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CheckedOut { forced: false, .. })));
}

#[test]
fn abandoned_session_is_reminded_then_swept_out() {
    let mut h = harness(SweepConfig::default());
    h.machine.register("bob", "Bob").unwrap();

    // Bob checked in nine hours ago, started a pomodoro, and vanished.
    let start = Utc::now() - Duration::hours(9);
    let ts = h.store.open_timesheet("bob", start).unwrap();
    h.store.open_focus_session(ts, "mystery task", start).unwrap();

    // Focus sweep at t+21min: one reminder, nothing else.
    let reminded_at = start + Duration::minutes(21);
    assert_eq!(h.sweep.focus_pass(reminded_at), 1);
    assert_eq!(h.sweep.focus_pass(reminded_at), 0);
    assert!(h.store.find_open_timesheet("bob").unwrap().is_some());

    // Timesheet sweep hours later: forced checkout cascades to the
    // still-open (reminded) focus session.
    let swept_at = start + Duration::hours(9);
    assert_eq!(h.sweep.timesheet_pass(swept_at), 1);
    assert!(h.store.find_open_timesheet("bob").unwrap().is_none());
    assert!(h.store.list_open_focus_sessions().unwrap().is_empty());

    let events = drain(&mut h.rx);
    let reminders = events
        .iter()
        .filter(|e| matches!(e, Event::FocusReminder { .. }))
        .count();
    assert_eq!(reminders, 1);
    assert!(events.iter().any(|e| matches!(
        e,
        Event::CheckedOut { forced: true, duration_min: 540, .. }
    )));
    // The swept-out pomodoro counts as not done, never done.
    assert_eq!(h.store.completed_focus_count("bob").unwrap(), 0);
}

#[test]
fn sweeps_leave_other_users_alone() {
    let mut h = harness(SweepConfig::default());
    h.machine.register("carol", "Carol").unwrap();
    h.machine.register("dave", "Dave").unwrap();

    // Carol is fresh; Dave is nine hours stale.
    h.machine.check_in("carol").unwrap();
    let stale = Utc::now() - Duration::hours(9);
    h.store.open_timesheet("dave", stale).unwrap();

    assert_eq!(h.sweep.timesheet_pass(Utc::now()), 1);
    assert!(h.store.find_open_timesheet("carol").unwrap().is_some());
    assert!(h.store.find_open_timesheet("dave").unwrap().is_none());

    let forced: Vec<_> = drain(&mut h.rx)
        .into_iter()
        .filter_map(|e| match e {
            Event::CheckedOut { user_id, forced: true, .. } => Some(user_id),
            _ => None,
        })
        .collect();
    assert_eq!(forced, vec!["dave".to_string()]);
}

#[test]
fn report_covers_closed_work_only() {
    let h = harness(SweepConfig::default());
    h.machine.register("erin", "Erin").unwrap();

    let t0 = Utc::now() - Duration::days(1);
    let a = h.store.open_timesheet("erin", t0).unwrap();
    let fs = h.store.open_focus_session(a, "spec review", t0).unwrap();
    h.store
        .resolve_focus_session(fs, t0 + Duration::minutes(25), 25, FocusStatus::Done)
        .unwrap();
    h.store.close_timesheet(a, t0 + Duration::hours(1), 60).unwrap();

    let b = h.store.open_timesheet("erin", t0 + Duration::hours(2)).unwrap();
    h.store
        .close_timesheet(b, t0 + Duration::hours(4), 120)
        .unwrap();

    let report = h
        .machine
        .report("erin", t0 - Duration::hours(1), t0 + Duration::hours(6))
        .unwrap();
    assert_eq!(report.timesheets.len(), 2);
    assert_eq!(report.total_min, 180);
    assert_eq!(report.completed.len(), 1);
    assert_eq!(report.completed[0].subject, "spec review");
}

#[tokio::test]
async fn spawned_sweeps_run_against_live_data() {
    // Tight ticks so the loops actually fire inside the test.
    let config = SweepConfig {
        focus_tick_secs: 1,
        timesheet_tick_secs: 1,
        ..SweepConfig::default()
    };
    let mut h = harness(config.clone());
    h.machine.register("frank", "Frank").unwrap();

    let stale = Utc::now() - Duration::hours(9);
    let ts = h.store.open_timesheet("frank", stale).unwrap();
    h.store.open_focus_session(ts, "ancient task", stale).unwrap();

    let sweep = Arc::new(SweepScheduler::new(
        Arc::clone(&h.machine),
        Arc::clone(&h.store),
        config,
    ));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (focus, timesheet) = sweep.spawn(shutdown_rx);

    // First interval tick fires immediately; give both loops a moment.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    shutdown_tx.send(true).unwrap();
    focus.await.unwrap();
    timesheet.await.unwrap();

    assert!(h.store.find_open_timesheet("frank").unwrap().is_none());
    assert!(h.store.list_open_focus_sessions().unwrap().is_empty());

    let events = drain(&mut h.rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::CheckedOut { forced: true, .. })));
}
