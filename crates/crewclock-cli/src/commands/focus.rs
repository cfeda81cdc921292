use clap::Subcommand;
use crewclock_core::FocusOutcome;

use super::{drain_events, open_machine, CliResult};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Start a focus session
    Start {
        /// What you are working on
        subject: String,
    },
    /// Mark the active focus session complete
    Done,
    /// Mark the active focus session incomplete
    NotDone,
    /// Report a blocker on the active focus session
    Blocked {
        /// What you are blocked on
        remark: String,
    },
}

pub fn run(user: &str, action: FocusAction) -> CliResult {
    let (machine, mut rx) = open_machine()?;
    match action {
        FocusAction::Start { subject } => {
            let session_id = machine.start_focus(user, &subject)?;
            println!("focus session {session_id} started: {subject}");
        }
        FocusAction::Done => {
            let duration_min = machine.resolve_focus(user, FocusOutcome::Done)?;
            println!("focus session done after {duration_min} min");
        }
        FocusAction::NotDone => {
            let duration_min = machine.resolve_focus(user, FocusOutcome::NotDone)?;
            println!("focus session closed (not done) after {duration_min} min");
        }
        FocusAction::Blocked { remark } => {
            machine.report_blocked(user, &remark)?;
            println!("blocker recorded");
        }
    }
    drain_events(&mut rx);
    Ok(())
}
