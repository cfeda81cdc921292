//! # Crewclock Core Library
//!
//! Core business logic for Crewclock, a work-session tracker for a small
//! team roster: members check in, run timed focus sessions ("pomodoros")
//! nested inside the check-in, and check out. The chat-facing surface
//! (message formatting, buttons, provisioning) lives outside this crate
//! and talks to it through plain operations and outbound [`Event`]s.
//!
//! ## Architecture
//!
//! - **Session Store**: SQLite persistence for users, timesheets, focus
//!   sessions, and help notes, with the invariant-bearing lookups the
//!   state machine depends on
//! - **Session Machine**: the check-in / focus / check-out state machine;
//!   the only writer of session state
//! - **Sweep Scheduler**: two background loops that reclaim abandoned
//!   sessions through the same state-machine entry points
//! - **Reward Ladder**: threshold table over completed focus sessions
//!
//! ## Key Components
//!
//! - [`SessionStore`]: session and roster persistence
//! - [`SessionMachine`]: lifecycle transitions
//! - [`SweepScheduler`]: reminder and forced-checkout loops
//! - [`Config`]: sweep knobs and reward tiers

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod rewards;
pub mod storage;
pub mod sweep;

pub use error::{ConfigError, CoreError, DatabaseError, TransitionError};
pub use events::Event;
pub use lifecycle::SessionMachine;
pub use model::{
    FocusOutcome, FocusSession, FocusStatus, HelpNote, OpenFocusRow, Timesheet, User, UserReport,
};
pub use rewards::{RewardLadder, Tier};
pub use storage::{Config, RewardsConfig, SessionStore, SweepConfig};
pub use sweep::SweepScheduler;
