//! Shared deterministic types for autopilot core logic.
//!
//! These types define stable contracts between the restart controller, the
//! worker adapter and the CLI. They must not depend on external state or I/O.

/// Token a worker writes to `current/status.txt` when it stopped because its
/// working context ran out and it expects to be relaunched.
pub const RESUME_TOKEN: &str = "CONTEXT_EXHAUSTED";

/// Whether a session starts from scratch or reconstructs state from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Fresh,
    Resume,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Fresh => "fresh",
            RunMode::Resume => "resume",
        }
    }

    pub fn is_resume(self) -> bool {
        self == RunMode::Resume
    }
}

/// How a single worker session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The process exited on its own. `code` is `None` when it was killed by a
    /// signal the supervisor did not send.
    Exited { code: Option<i32> },
    /// The configured wall-clock timeout elapsed and the process was killed.
    TimedOut,
    /// An interrupt arrived while the process was running; it was killed.
    Interrupted,
}

impl SessionOutcome {
    pub fn success(self) -> bool {
        matches!(self, SessionOutcome::Exited { code: Some(0) })
    }
}

/// A consumed request from the worker to be relaunched in resume mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeSignal;

impl ResumeSignal {
    /// Interpret sentinel file contents. Anything other than the resume token
    /// (ignoring surrounding whitespace) is not a signal.
    pub fn parse(contents: &str) -> Option<ResumeSignal> {
        (contents.trim() == RESUME_TOKEN).then_some(ResumeSignal)
    }
}

/// Terminal status of one top-level invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalStatus {
    /// Worker exited successfully without asking to be relaunched.
    Completed,
    /// Worker exited with a failure status. Never retried automatically.
    Failed { code: Option<i32> },
    /// Timeout elapsed; workspace state is left for `--resume`.
    TimedOut,
    /// Interrupted by the user; workspace state is left for `--resume`.
    Interrupted,
    /// The worker kept asking for restarts past `max_restarts`.
    BudgetExhausted { restarts: u32 },
}

impl FinalStatus {
    /// True when the workspace can be picked up again with `--resume`.
    pub fn resumable(self) -> bool {
        !matches!(self, FinalStatus::Completed)
    }
}
