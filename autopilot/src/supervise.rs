//! Restart loop for `autopilot`: launch, observe, relaunch on checkpoint.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::controller::{Controller, Transition};
use crate::core::prompt::{PromptInput, compile_prompt};
use crate::core::slug::timestamp_suffix;
use crate::core::types::{FinalStatus, RunMode, SessionOutcome};
use crate::io::memory::{ensure_memory_layout, read_optional_lossy};
use crate::io::sentinel::{clear_stale_sentinel, read_and_clear_sentinel};
use crate::io::signals::CancelFlag;
use crate::io::worker::{LaunchRequest, Worker};

/// Parameters for one top-level invocation.
#[derive(Debug, Clone)]
pub struct SuperviseRequest<'a> {
    pub workspace: &'a Path,
    /// Objective text for fresh prompts. Ignored in resume mode.
    pub objective: &'a str,
    /// Mode of the first session.
    pub mode: RunMode,
    pub max_restarts: u32,
    /// Per-session wall-clock limit.
    pub timeout: Option<Duration>,
    pub transcripts: bool,
}

/// Progress notifications for the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Launching { session: u32, mode: RunMode },
    Ended { session: u32, outcome: SessionOutcome },
    CheckpointRestart { restart: u32, max_restarts: u32 },
}

/// Summary of a supervised invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperviseOutcome {
    pub workspace: PathBuf,
    pub launches: u32,
    pub restarts: u32,
    pub status: FinalStatus,
    /// Contents of `current/complete.md` when the worker completed.
    pub completion_report: Option<String>,
}

/// Launch the worker until it completes, fails, times out, is interrupted,
/// or exhausts the restart budget.
///
/// Only a clean exit that leaves the resume sentinel triggers a relaunch.
/// Errors (spawn failures, unreadable memory) stop immediately and leave the
/// workspace as it is.
#[instrument(skip_all, fields(workspace = %request.workspace.display(), mode = request.mode.as_str(), max_restarts = request.max_restarts))]
pub fn supervise<W: Worker, F: FnMut(&SessionEvent)>(
    worker: &W,
    request: &SuperviseRequest<'_>,
    cancel: &CancelFlag,
    mut on_event: F,
) -> Result<SuperviseOutcome> {
    let paths = ensure_memory_layout(request.workspace)?;
    clear_stale_sentinel(&paths)?;

    let stamp = timestamp_suffix(chrono::Local::now().naive_local());
    let mut controller = Controller::new(request.mode, request.max_restarts);

    let status = loop {
        if cancel.is_cancelled() {
            info!("interrupted before launch");
            controller.abort(FinalStatus::Interrupted);
            break FinalStatus::Interrupted;
        }

        let mode = controller.begin_session()?;
        let session = controller.launches();
        let prompt = compile_prompt(&PromptInput {
            objective: request.objective,
            workspace: request.workspace,
            mode,
        })?;

        on_event(&SessionEvent::Launching { session, mode });
        let outcome = worker
            .launch(&LaunchRequest {
                workspace: request.workspace.to_path_buf(),
                prompt,
                mode,
                session,
                timeout: request.timeout,
                transcript_path: request
                    .transcripts
                    .then(|| paths.transcript_path(&stamp, session)),
            })
            .with_context(|| format!("worker session {session}"))?;
        on_event(&SessionEvent::Ended { session, outcome });

        let signal = if outcome.success() {
            read_and_clear_sentinel(&paths)?
        } else {
            None
        };
        debug!(
            session,
            ?outcome,
            resume_requested = signal.is_some(),
            phase = ?controller.phase(),
            "session ended"
        );

        match controller.observe(outcome, signal)? {
            Transition::Relaunch { restart, .. } => {
                info!(restart, max = controller.max_restarts(), "checkpoint restart");
                on_event(&SessionEvent::CheckpointRestart {
                    restart,
                    max_restarts: controller.max_restarts(),
                });
            }
            Transition::Finish(status) => break status,
        }
    };

    let completion_report = match status {
        FinalStatus::Completed => match read_optional_lossy(&paths.complete_path) {
            Ok(report) => report,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "completion report unreadable");
                None
            }
        },
        _ => None,
    };

    info!(
        ?status,
        launches = controller.launches(),
        restarts = controller.restarts(),
        "supervision finished"
    );
    Ok(SuperviseOutcome {
        workspace: request.workspace.to_path_buf(),
        launches: controller.launches(),
        restarts: controller.restarts(),
        status,
        completion_report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedSession, ScriptedWorker};

    fn request(workspace: &Path, max_restarts: u32) -> SuperviseRequest<'_> {
        SuperviseRequest {
            workspace,
            objective: "Build a login page",
            mode: RunMode::Fresh,
            max_restarts,
            timeout: None,
            transcripts: false,
        }
    }

    #[test]
    fn completes_after_single_launch() {
        let temp = tempfile::tempdir().expect("tempdir");
        let worker = ScriptedWorker::new(vec![ScriptedSession::complete("shipped")]);

        let outcome =
            supervise(&worker, &request(temp.path(), 3), &CancelFlag::new(), |_| {}).expect("run");

        assert_eq!(outcome.status, FinalStatus::Completed);
        assert_eq!(outcome.launches, 1);
        assert_eq!(outcome.completion_report.as_deref(), Some("shipped"));
        assert_eq!(worker.launches().len(), 1);
    }

    #[test]
    fn interrupt_before_launch_never_starts_worker() {
        let temp = tempfile::tempdir().expect("tempdir");
        let worker = ScriptedWorker::new(Vec::new());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcome = supervise(&worker, &request(temp.path(), 3), &cancel, |_| {}).expect("run");

        assert_eq!(outcome.status, FinalStatus::Interrupted);
        assert_eq!(outcome.launches, 0);
        assert!(worker.launches().is_empty());
    }

    #[test]
    fn events_trace_checkpoint_restart() {
        let temp = tempfile::tempdir().expect("tempdir");
        let worker = ScriptedWorker::new(vec![
            ScriptedSession::checkpoint(),
            ScriptedSession::exit(0),
        ]);
        let mut events = Vec::new();

        supervise(&worker, &request(temp.path(), 3), &CancelFlag::new(), |event| {
            events.push(event.clone());
        })
        .expect("run");

        assert_eq!(
            events,
            vec![
                SessionEvent::Launching {
                    session: 1,
                    mode: RunMode::Fresh
                },
                SessionEvent::Ended {
                    session: 1,
                    outcome: SessionOutcome::Exited { code: Some(0) }
                },
                SessionEvent::CheckpointRestart {
                    restart: 1,
                    max_restarts: 3
                },
                SessionEvent::Launching {
                    session: 2,
                    mode: RunMode::Resume
                },
                SessionEvent::Ended {
                    session: 2,
                    outcome: SessionOutcome::Exited { code: Some(0) }
                },
            ]
        );
    }

    #[test]
    fn launch_error_propagates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let worker = ScriptedWorker::new(Vec::new());

        let err = supervise(&worker, &request(temp.path(), 3), &CancelFlag::new(), |_| {})
            .unwrap_err();
        assert!(format!("{err:#}").contains("worker session 1"));
    }
}
