//! TOML-based service configuration.
//!
//! Stores the sweep scheduler knobs and the reward tier table.
//! Configuration lives at `~/.config/crewclock/config.toml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::rewards::{RewardLadder, Tier};

/// Sweep scheduler knobs. Plain numeric settings, not a DSL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Minutes after which an unresolved focus session gets its reminder.
    #[serde(default = "default_reminder_after_min")]
    pub reminder_after_min: u64,
    /// Minutes after which an open timesheet is force-closed.
    #[serde(default = "default_max_session_min")]
    pub max_session_min: u64,
    /// Focus-sweep tick interval in seconds.
    #[serde(default = "default_focus_tick_secs")]
    pub focus_tick_secs: u64,
    /// Timesheet-sweep tick interval in seconds.
    #[serde(default = "default_timesheet_tick_secs")]
    pub timesheet_tick_secs: u64,
    /// Force-resolve focus sessions still unresolved this many minutes
    /// after start. Off unless set.
    #[serde(default)]
    pub auto_close_after_min: Option<u64>,
}

/// Reward tier table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default = "default_tiers")]
    pub tiers: Vec<Tier>,
}

/// Service configuration.
///
/// Serialized to/from TOML at `~/.config/crewclock/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
}

// Default functions
fn default_reminder_after_min() -> u64 {
    20
}
fn default_max_session_min() -> u64 {
    8 * 60
}
fn default_focus_tick_secs() -> u64 {
    2 * 60
}
fn default_timesheet_tick_secs() -> u64 {
    5 * 60
}
fn default_tiers() -> Vec<Tier> {
    RewardLadder::default().tiers().to_vec()
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            reminder_after_min: default_reminder_after_min(),
            max_session_min: default_max_session_min(),
            focus_tick_secs: default_focus_tick_secs(),
            timesheet_tick_secs: default_timesheet_tick_secs(),
            auto_close_after_min: None,
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

impl SweepConfig {
    pub fn reminder_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reminder_after_min as i64)
    }

    pub fn max_session(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.max_session_min as i64)
    }

    pub fn auto_close_after(&self) -> Option<chrono::Duration> {
        self.auto_close_after_min
            .map(|m| chrono::Duration::minutes(m as i64))
    }

    pub fn focus_tick(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.focus_tick_secs.max(1))
    }

    pub fn timesheet_tick(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timesheet_tick_secs.max(1))
    }
}

impl RewardsConfig {
    /// Ladder built from the configured tier table.
    pub fn ladder(&self) -> RewardLadder {
        RewardLadder::new(self.tiers.clone())
    }
}

impl Config {
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk; a missing file writes and returns the default.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Load from disk, returning default on error. Never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sweep.reminder_after_min, 20);
        assert_eq!(cfg.sweep.max_session_min, 480);
        assert_eq!(cfg.sweep.focus_tick_secs, 120);
        assert_eq!(cfg.sweep.timesheet_tick_secs, 300);
        assert!(cfg.sweep.auto_close_after_min.is_none());
        assert_eq!(cfg.rewards.tiers.len(), 4);
    }

    #[test]
    fn toml_round_trip() {
        let mut cfg = Config::default();
        cfg.sweep.reminder_after_min = 30;
        cfg.sweep.auto_close_after_min = Some(240);

        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.sweep.reminder_after_min, 30);
        assert_eq!(parsed.sweep.auto_close_after_min, Some(240));
        assert_eq!(parsed.rewards.tiers, cfg.rewards.tiers);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: Config = toml::from_str("[sweep]\nreminder_after_min = 10\n").unwrap();
        assert_eq!(parsed.sweep.reminder_after_min, 10);
        assert_eq!(parsed.sweep.max_session_min, 480);
        assert_eq!(parsed.rewards.tiers.len(), 4);
    }

    #[test]
    fn tick_intervals_never_hit_zero() {
        let mut cfg = SweepConfig::default();
        cfg.focus_tick_secs = 0;
        assert_eq!(cfg.focus_tick(), std::time::Duration::from_secs(1));
    }
}
