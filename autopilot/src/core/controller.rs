//! Restart controller state machine.
//!
//! ```text
//! LAUNCH -> RUNNING -> { COMPLETED, FAILED, TIMED_OUT, INTERRUPTED,
//!                        CHECKPOINT_RESTART -> LAUNCH | BUDGET_EXHAUSTED }
//! ```
//!
//! The controller owns the restart budget and the current run mode. It never
//! touches the filesystem or processes: the driver in [`crate::supervise`]
//! feeds it a [`SessionOutcome`] plus the consumed sentinel and acts on the
//! returned [`Transition`]. Automatic restart happens if and only if the
//! session exited successfully and left a resume signal.

use anyhow::{Result, anyhow};

use crate::core::budget::RestartBudget;
use crate::core::types::{FinalStatus, ResumeSignal, RunMode, SessionOutcome};

/// Where the controller currently sits in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ready to start a session in the given mode.
    Launch(RunMode),
    /// A session is running in the given mode.
    Running(RunMode),
    /// Terminal.
    Finished(FinalStatus),
}

/// Decision taken after observing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Checkpoint restart: launch again in `mode` (always resume).
    Relaunch { mode: RunMode, restart: u32 },
    /// Stop supervising.
    Finish(FinalStatus),
}

#[derive(Debug, Clone)]
pub struct Controller {
    phase: Phase,
    budget: RestartBudget,
    launches: u32,
}

impl Controller {
    pub fn new(initial_mode: RunMode, max_restarts: u32) -> Self {
        Self {
            phase: Phase::Launch(initial_mode),
            budget: RestartBudget::new(max_restarts),
            launches: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn restarts(&self) -> u32 {
        self.budget.used()
    }

    pub fn max_restarts(&self) -> u32 {
        self.budget.max()
    }

    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// `LAUNCH -> RUNNING`. Returns the mode the session must start in.
    pub fn begin_session(&mut self) -> Result<RunMode> {
        match self.phase {
            Phase::Launch(mode) => {
                self.phase = Phase::Running(mode);
                self.launches += 1;
                Ok(mode)
            }
            other => Err(anyhow!("cannot launch a session from {other:?}")),
        }
    }

    /// `RUNNING -> *`. `signal` must be the sentinel consumed after the session
    /// ended; it is ignored for anything but a successful exit.
    pub fn observe(
        &mut self,
        outcome: SessionOutcome,
        signal: Option<ResumeSignal>,
    ) -> Result<Transition> {
        if !matches!(self.phase, Phase::Running(_)) {
            return Err(anyhow!("no session is running (phase {:?})", self.phase));
        }

        let transition = match outcome {
            SessionOutcome::Exited { code: Some(0) } => match signal {
                None => Transition::Finish(FinalStatus::Completed),
                Some(ResumeSignal) => match self.budget.try_consume() {
                    Some(restart) => Transition::Relaunch {
                        mode: RunMode::Resume,
                        restart,
                    },
                    None => Transition::Finish(FinalStatus::BudgetExhausted {
                        restarts: self.budget.used(),
                    }),
                },
            },
            SessionOutcome::Exited { code } => Transition::Finish(FinalStatus::Failed { code }),
            SessionOutcome::TimedOut => Transition::Finish(FinalStatus::TimedOut),
            SessionOutcome::Interrupted => Transition::Finish(FinalStatus::Interrupted),
        };

        self.phase = match transition {
            Transition::Relaunch { mode, .. } => Phase::Launch(mode),
            Transition::Finish(status) => Phase::Finished(status),
        };
        Ok(transition)
    }

    /// Stop before the next launch (interrupt observed between sessions).
    pub fn abort(&mut self, status: FinalStatus) {
        self.phase = Phase::Finished(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: SessionOutcome = SessionOutcome::Exited { code: Some(0) };

    #[test]
    fn clean_exit_without_signal_completes() {
        let mut controller = Controller::new(RunMode::Fresh, 3);
        assert_eq!(controller.begin_session().expect("launch"), RunMode::Fresh);
        let transition = controller.observe(OK, None).expect("observe");
        assert_eq!(transition, Transition::Finish(FinalStatus::Completed));
        assert_eq!(controller.launches(), 1);
        assert_eq!(controller.restarts(), 0);
    }

    #[test]
    fn signal_forces_resume_mode() {
        let mut controller = Controller::new(RunMode::Fresh, 3);
        controller.begin_session().expect("launch");
        let transition = controller
            .observe(OK, Some(ResumeSignal))
            .expect("observe");
        assert_eq!(
            transition,
            Transition::Relaunch {
                mode: RunMode::Resume,
                restart: 1
            }
        );
        assert_eq!(controller.phase(), Phase::Launch(RunMode::Resume));
        assert_eq!(controller.begin_session().expect("relaunch"), RunMode::Resume);
    }

    #[test]
    fn restarts_stop_at_budget() {
        let mut controller = Controller::new(RunMode::Fresh, 2);
        let mut transitions = Vec::new();
        for _ in 0..3 {
            controller.begin_session().expect("launch");
            transitions.push(
                controller
                    .observe(OK, Some(ResumeSignal))
                    .expect("observe"),
            );
        }
        assert!(matches!(transitions[0], Transition::Relaunch { restart: 1, .. }));
        assert!(matches!(transitions[1], Transition::Relaunch { restart: 2, .. }));
        assert_eq!(
            transitions[2],
            Transition::Finish(FinalStatus::BudgetExhausted { restarts: 2 })
        );
        assert_eq!(controller.launches(), 3);
        assert!(controller.begin_session().is_err());
    }

    #[test]
    fn failure_is_never_retried_even_with_signal() {
        let mut controller = Controller::new(RunMode::Resume, 5);
        controller.begin_session().expect("launch");
        let transition = controller
            .observe(SessionOutcome::Exited { code: Some(3) }, Some(ResumeSignal))
            .expect("observe");
        assert_eq!(
            transition,
            Transition::Finish(FinalStatus::Failed { code: Some(3) })
        );
        assert_eq!(controller.restarts(), 0);
    }

    #[test]
    fn timeout_and_interrupt_are_terminal() {
        for (outcome, expected) in [
            (SessionOutcome::TimedOut, FinalStatus::TimedOut),
            (SessionOutcome::Interrupted, FinalStatus::Interrupted),
        ] {
            let mut controller = Controller::new(RunMode::Fresh, 5);
            controller.begin_session().expect("launch");
            let transition = controller
                .observe(outcome, Some(ResumeSignal))
                .expect("observe");
            assert_eq!(transition, Transition::Finish(expected));
        }
    }

    #[test]
    fn observe_requires_running_session() {
        let mut controller = Controller::new(RunMode::Fresh, 1);
        assert!(controller.observe(OK, None).is_err());
    }
}
