//! Test-only helpers: a scripted worker and temporary workspace roots.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::core::layout::MemoryPaths;
use crate::core::types::{RESUME_TOKEN, SessionOutcome};
use crate::io::worker::{LaunchRequest, Worker};

/// One scripted session: what the fake worker leaves on disk and how it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedSession {
    pub outcome: SessionOutcome,
    /// Written to `current/status.txt` before returning.
    pub status: Option<Vec<u8>>,
    /// Written to `current/complete.md` before returning.
    pub complete_report: Option<Vec<u8>>,
}

impl ScriptedSession {
    /// Exit with `code`, leaving nothing behind.
    pub fn exit(code: i32) -> Self {
        Self::with_outcome(SessionOutcome::Exited { code: Some(code) })
    }

    /// Exit cleanly after writing the resume sentinel.
    pub fn checkpoint() -> Self {
        Self {
            status: Some(format!("{RESUME_TOKEN}\n").into_bytes()),
            ..Self::exit(0)
        }
    }

    /// Exit cleanly after writing a completion report.
    pub fn complete(report: &str) -> Self {
        Self {
            complete_report: Some(report.as_bytes().to_vec()),
            ..Self::exit(0)
        }
    }

    pub fn with_outcome(outcome: SessionOutcome) -> Self {
        Self {
            outcome,
            status: None,
            complete_report: None,
        }
    }

    /// Also leave `status` in the sentinel file.
    pub fn leaving_status(mut self, status: impl AsRef<[u8]>) -> Self {
        self.status = Some(status.as_ref().to_vec());
        self
    }

    /// Also leave `report` in `current/complete.md`.
    pub fn leaving_report(mut self, report: impl AsRef<[u8]>) -> Self {
        self.complete_report = Some(report.as_ref().to_vec());
        self
    }
}

/// What the scripted worker observed at launch time.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub request: LaunchRequest,
    /// Whether a sentinel file existed when the session started.
    pub sentinel_present: bool,
    /// Whether every memory partition existed when the session started.
    pub partitions_ready: bool,
}

/// [`Worker`] that replays a fixed list of sessions.
///
/// Launching past the end of the script is an error.
#[derive(Debug, Default)]
pub struct ScriptedWorker {
    sessions: RefCell<VecDeque<ScriptedSession>>,
    launches: RefCell<Vec<LaunchRecord>>,
}

impl ScriptedWorker {
    pub fn new(sessions: Vec<ScriptedSession>) -> Self {
        Self {
            sessions: RefCell::new(sessions.into()),
            launches: RefCell::new(Vec::new()),
        }
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.borrow().clone()
    }

    /// Sessions not yet consumed.
    pub fn remaining(&self) -> usize {
        self.sessions.borrow().len()
    }
}

impl Worker for ScriptedWorker {
    fn launch(&self, request: &LaunchRequest) -> Result<SessionOutcome> {
        let paths = MemoryPaths::new(&request.workspace);
        self.launches.borrow_mut().push(LaunchRecord {
            request: request.clone(),
            sentinel_present: paths.status_path.exists(),
            partitions_ready: paths.partitions().iter().all(|dir| dir.is_dir()),
        });

        let session = self
            .sessions
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted worker has no session left"))?;
        if let Some(status) = &session.status {
            fs::write(&paths.status_path, status).context("write scripted sentinel")?;
        }
        if let Some(report) = &session.complete_report {
            fs::write(&paths.complete_path, report).context("write scripted report")?;
        }
        Ok(session.outcome)
    }
}

/// Temporary root holding a workspace base directory.
pub struct TestWorkspace {
    root: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Base directory for auto-created workspaces (not created yet).
    pub fn base_dir(&self) -> PathBuf {
        self.root.path().join("workspaces")
    }

    /// Path of a named workspace under the base directory.
    pub fn workspace(&self, name: &str) -> PathBuf {
        self.base_dir().join(name)
    }

    /// Create a workspace that looks like a previous fresh run.
    pub fn saved_workspace(&self, name: &str, objective: &str) -> PathBuf {
        let path = self.workspace(name);
        let paths = MemoryPaths::new(&path);
        fs::create_dir_all(&paths.core_dir).expect("create core dir");
        fs::write(&paths.objective_path, format!("# Project Objective\n\n{objective}\n"))
            .expect("write objective");
        path
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
