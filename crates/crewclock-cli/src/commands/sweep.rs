use std::sync::Arc;

use crewclock_core::{Config, SessionMachine, SessionStore, SweepScheduler};
use tokio::sync::{mpsc, watch};
use tracing::info;

use super::CliResult;

/// Run both sweep loops until ctrl-c, printing every outbound notification
/// as a JSON line. This is the always-on half of the service; the other
/// subcommands are the live command path against the same database.
pub fn run() -> CliResult {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let store = Arc::new(SessionStore::open()?);
        let config = Config::load_or_default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let machine = Arc::new(
            SessionMachine::new(Arc::clone(&store), tx).with_ladder(config.rewards.ladder()),
        );
        let scheduler = Arc::new(SweepScheduler::new(machine, store, config.sweep));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (focus, timesheet) = scheduler.spawn(shutdown_rx);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    let _ = shutdown_tx.send(true);
                    break;
                }
                Some(event) = rx.recv() => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
            }
        }

        focus.await?;
        timesheet.await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
