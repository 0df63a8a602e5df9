//! Worker abstraction for session launches.
//!
//! The [`Worker`] trait decouples the restart controller from the actual
//! worker backend. Tests use scripted workers that return predetermined
//! outcomes without spawning processes.

use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::{RunMode, SessionOutcome};
use crate::io::config::{PermissionPolicy, PromptDelivery, WorkerConfig};
use crate::io::process::{ProcessExit, WaitPolicy, run_supervised};
use crate::io::signals::CancelFlag;

const SIGINT_EXIT_CODE: i32 = 130;

/// Parameters for one worker session.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Workspace root; also the worker's working directory.
    pub workspace: PathBuf,
    /// Compiled instruction document.
    pub prompt: String,
    pub mode: RunMode,
    /// 1-indexed launch number within this invocation.
    pub session: u32,
    /// Wall-clock limit for this session.
    pub timeout: Option<Duration>,
    /// Where to tee worker stdout, if anywhere.
    pub transcript_path: Option<PathBuf>,
}

/// Abstraction over worker backends.
pub trait Worker {
    /// Run one session to termination and report how it ended.
    fn launch(&self, request: &LaunchRequest) -> Result<SessionOutcome>;
}

/// Worker that spawns the configured external command.
pub struct CommandWorker {
    config: WorkerConfig,
    cancel: CancelFlag,
    poll_interval: Duration,
}

impl CommandWorker {
    pub fn new(config: WorkerConfig, cancel: CancelFlag, poll_interval: Duration) -> Self {
        Self {
            config,
            cancel,
            poll_interval,
        }
    }

    /// Build the command line: configured command, policy arguments, then the
    /// prompt when it is delivered as an argument.
    pub fn command(&self, request: &LaunchRequest) -> Command {
        let (program, leading) = match self.config.command.split_first() {
            Some((program, leading)) => (program.as_str(), leading),
            None => ("", &[][..]),
        };
        let mut cmd = Command::new(program);
        cmd.args(leading);
        cmd.args(policy_args(&self.config));
        if self.config.prompt_delivery == PromptDelivery::Argument {
            cmd.arg(&request.prompt);
        }
        cmd.current_dir(&request.workspace);
        cmd
    }
}

impl Worker for CommandWorker {
    #[instrument(skip_all, fields(session = request.session, mode = request.mode.as_str()))]
    fn launch(&self, request: &LaunchRequest) -> Result<SessionOutcome> {
        info!(workspace = %request.workspace.display(), "starting worker session");

        let stdin = match self.config.prompt_delivery {
            PromptDelivery::Stdin => Some(request.prompt.as_bytes()),
            PromptDelivery::Argument => None,
        };
        let exit = run_supervised(
            self.command(request),
            stdin,
            &WaitPolicy {
                timeout: request.timeout,
                poll_interval: self.poll_interval,
            },
            &self.cancel,
            request.transcript_path.as_deref(),
        )
        .with_context(|| format!("run worker {}", self.config.command.join(" ")))?;

        let outcome = match exit {
            // The flag may be raised after the worker already died of the
            // same interrupt.
            ProcessExit::Exited(_) if self.cancel.is_cancelled() => SessionOutcome::Interrupted,
            ProcessExit::Exited(status) if interrupted_exit(&status) => {
                SessionOutcome::Interrupted
            }
            ProcessExit::Exited(status) => SessionOutcome::Exited {
                code: status.code(),
            },
            ProcessExit::TimedOut => SessionOutcome::TimedOut,
            ProcessExit::Cancelled => SessionOutcome::Interrupted,
        };
        if !outcome.success() {
            warn!(?outcome, "worker session did not exit cleanly");
        }
        Ok(outcome)
    }
}

/// Exit code 130 (shell convention for SIGINT) or death by SIGINT.
fn interrupted_exit(status: &ExitStatus) -> bool {
    if status.code() == Some(SIGINT_EXIT_CODE) {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if status.signal() == Some(nix::sys::signal::Signal::SIGINT as i32) {
            return true;
        }
    }
    false
}

fn policy_args(config: &WorkerConfig) -> &[String] {
    match config.permission_policy {
        PermissionPolicy::Unattended => &config.unattended_args,
        PermissionPolicy::Supervised => &[],
    }
}
