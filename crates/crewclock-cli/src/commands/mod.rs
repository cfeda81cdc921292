pub mod config;
pub mod focus;
pub mod report;
pub mod session;
pub mod sweep;

use std::sync::Arc;

use crewclock_core::{Config, Event, SessionMachine, SessionStore};
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub(crate) type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the shared store and wire a machine to an event channel.
pub(crate) fn open_machine(
) -> Result<(SessionMachine, UnboundedReceiver<Event>), Box<dyn std::error::Error>> {
    let store = Arc::new(SessionStore::open()?);
    let config = Config::load_or_default();
    let (tx, rx) = mpsc::unbounded_channel();
    let machine = SessionMachine::new(store, tx).with_ladder(config.rewards.ladder());
    Ok((machine, rx))
}

/// Print whatever notifications the command produced, one JSON line each.
/// Stand-in for the chat-platform messaging surface.
pub(crate) fn drain_events(rx: &mut UnboundedReceiver<Event>) {
    while let Ok(event) = rx.try_recv() {
        if let Ok(line) = serde_json::to_string(&event) {
            println!("{line}");
        }
    }
}
