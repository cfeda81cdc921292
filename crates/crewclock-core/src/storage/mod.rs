mod config;
pub mod migrations;
pub mod store;

pub use config::{Config, RewardsConfig, SweepConfig};
pub use store::SessionStore;

use std::path::PathBuf;

/// Returns `~/.config/crewclock[-dev]/` based on CREWCLOCK_ENV.
///
/// Set CREWCLOCK_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CREWCLOCK_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("crewclock-dev")
    } else {
        base_dir.join("crewclock")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
