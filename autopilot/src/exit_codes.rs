//! Stable exit codes for the autopilot CLI.

use crate::core::types::FinalStatus;

/// Completed, timed out, or interrupted. Timeouts and interrupts leave
/// resumable state and are not failures of autopilot itself.
pub const OK: i32 = 0;
/// Workspace resolution, configuration, or any uncaught error.
pub const INVALID: i32 = 1;
/// The worker exited nonzero.
pub const WORKER_FAILED: i32 = 2;
/// Relaunches stopped because the restart budget ran out.
pub const BUDGET_EXHAUSTED: i32 = 3;

/// Exit code reported for a finished supervision.
pub fn for_status(status: FinalStatus) -> i32 {
    match status {
        FinalStatus::Completed | FinalStatus::TimedOut | FinalStatus::Interrupted => OK,
        FinalStatus::Failed { .. } => WORKER_FAILED,
        FinalStatus::BudgetExhausted { .. } => BUDGET_EXHAUSTED,
    }
}
