//! Threshold-based reward tiers over completed focus sessions.
//!
//! Stateless: the ladder is a fixed ascending table of
//! (threshold, label) pairs evaluated against the completed-session count.
//! Granting the actual badge/role is the caller's responsibility.

use serde::{Deserialize, Serialize};

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Completed-session count at which this tier is reached.
    pub threshold: u64,
    /// Badge/role label signalled to the caller.
    pub label: String,
}

/// Ascending table of reward tiers.
#[derive(Debug, Clone)]
pub struct RewardLadder {
    tiers: Vec<Tier>,
}

impl Default for RewardLadder {
    fn default() -> Self {
        Self::new(vec![
            Tier { threshold: 1, label: "bronze".into() },
            Tier { threshold: 5, label: "silver".into() },
            Tier { threshold: 10, label: "gold".into() },
            Tier { threshold: 25, label: "platinum".into() },
        ])
    }
}

impl RewardLadder {
    /// Build a ladder from arbitrary tiers. Zero thresholds are dropped
    /// (count 0 never holds a tier) and the rest sorted ascending.
    pub fn new(mut tiers: Vec<Tier>) -> Self {
        tiers.retain(|t| t.threshold > 0);
        tiers.sort_by_key(|t| t.threshold);
        tiers.dedup_by_key(|t| t.threshold);
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Highest tier whose threshold is <= `count`, if any.
    pub fn tier_for(&self, count: u64) -> Option<&Tier> {
        self.tiers.iter().rev().find(|t| t.threshold <= count)
    }

    /// Tier newly crossed by moving from `count - 1` to `count` completed
    /// sessions. Fires at most once per threshold: a count strictly between
    /// two thresholds yields `None`.
    pub fn newly_crossed(&self, count: u64) -> Option<&Tier> {
        if count == 0 {
            return None;
        }
        let current = self.tier_for(count)?;
        match self.tier_for(count - 1) {
            Some(prev) if prev.threshold == current.threshold => None,
            _ => Some(current),
        }
    }
}
