//! Restart and time budget helpers for deterministic supervision.

use std::time::{Duration, Instant};

/// Bounded count of automatic checkpoint-triggered relaunches.
///
/// Lives only for one top-level invocation; it is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartBudget {
    used: u32,
    max: u32,
}

impl RestartBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.max
    }

    /// Consume one restart. Returns the 1-indexed restart number, or `None`
    /// when the budget is already exhausted (the counter is left unchanged).
    pub fn try_consume(&mut self) -> Option<u32> {
        if self.exhausted() {
            return None;
        }
        self.used += 1;
        Some(self.used)
    }
}

/// Return the remaining time until `deadline`, or `None` once it has passed.
pub fn remaining_time(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|remaining| !remaining.is_zero())
}
