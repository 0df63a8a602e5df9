//! Orchestration for the steps before the first launch.
//!
//! Preparing a run resolves the objective and the workspace, scaffolds the
//! memory store, and seeds starter documents for fresh sessions. Nothing here
//! starts the worker.

use std::path::Path;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use tracing::{info, instrument, warn};

use crate::core::layout::MemoryPaths;
use crate::core::types::RunMode;
use crate::io::memory::{ensure_memory_layout, seed_memory};
use crate::io::objective::resolve_objective;
use crate::io::workspace::{
    ResolutionError, ResolvedWorkspace, WorkspaceRequest, WorkspaceResolver, absolutize,
    has_saved_state,
};

/// Inputs gathered by the CLI.
#[derive(Debug, Clone, Copy)]
pub struct PrepareRequest<'a> {
    /// Objective argument: a file path or literal text.
    pub objective: Option<&'a str>,
    pub workspace: Option<&'a Path>,
    pub resume: bool,
    pub cwd: &'a Path,
    pub install_root: Option<&'a Path>,
}

/// A workspace ready for the first launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRun {
    pub workspace: ResolvedWorkspace,
    /// Resolved objective text. Empty in resume mode.
    pub objective: String,
    pub mode: RunMode,
    pub paths: MemoryPaths,
}

impl PreparedRun {
    pub fn workspace_path(&self) -> &Path {
        &self.workspace.path
    }
}

/// Resolve objective and workspace, then scaffold the memory store.
///
/// `now` stamps collision suffixes and the seeded objective document.
#[instrument(skip_all, fields(resume = request.resume))]
pub fn prepare_run(
    resolver: &WorkspaceResolver,
    request: &PrepareRequest<'_>,
    now: NaiveDateTime,
) -> Result<PreparedRun> {
    if request.resume {
        return prepare_resume(resolver, request, now);
    }

    let input = request
        .objective
        .ok_or_else(|| anyhow!("an objective is required unless --resume is given"))?;
    let objective = resolve_objective(input, request.cwd, request.install_root)?;
    if objective.text.trim().is_empty() {
        return Err(anyhow!("objective is empty"));
    }

    let workspace = resolver.resolve_at(
        &WorkspaceRequest {
            explicit: request.workspace,
            resume: false,
            objective: Some(&objective.text),
        },
        now,
    )?;
    let paths = ensure_memory_layout(&workspace.path)?;
    if has_saved_state(&workspace.path) {
        warn!(
            workspace = %workspace.path.display(),
            "workspace already holds an objective; starting fresh keeps the recorded one until the worker rewrites it"
        );
    }
    seed_memory(
        &paths,
        &objective.text,
        &now.format("%Y-%m-%dT%H:%M:%S").to_string(),
    )?;

    info!(workspace = %workspace.path.display(), "fresh run prepared");
    Ok(PreparedRun {
        workspace,
        objective: objective.text,
        mode: RunMode::Fresh,
        paths,
    })
}

fn prepare_resume(
    resolver: &WorkspaceResolver,
    request: &PrepareRequest<'_>,
    now: NaiveDateTime,
) -> Result<PreparedRun> {
    if request.objective.is_some() {
        warn!("objective argument ignored when resuming");
    }
    if let Some(explicit) = request.workspace {
        let path = absolutize(request.cwd, explicit);
        if !has_saved_state(&path) {
            return Err(ResolutionError::NoSavedState { searched: path }.into());
        }
    }

    let workspace = resolver.resolve_at(
        &WorkspaceRequest {
            explicit: request.workspace,
            resume: true,
            objective: None,
        },
        now,
    )?;
    let paths = ensure_memory_layout(&workspace.path)?;

    info!(workspace = %workspace.path.display(), "resume prepared");
    Ok(PreparedRun {
        workspace,
        objective: String::new(),
        mode: RunMode::Resume,
        paths,
    })
}
