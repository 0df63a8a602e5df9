//! Workspace resolution: explicit path, resumed session, or a fresh directory.
//!
//! Auto-created workspaces live under a base directory chosen from
//! `AUTOPILOT_WORKSPACES`, the config file, or `~/.autopilot/workspaces`.
//! The base directory is never inside the installation tree.

use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::layout::MemoryPaths;
use crate::core::slug::{candidate_names, slugify, timestamp_suffix};
use crate::io::memory::read_optional_lossy;

/// Environment variable overriding the base directory for new workspaces.
pub const WORKSPACES_ENV: &str = "AUTOPILOT_WORKSPACES";

const MAX_NAME_CANDIDATES: usize = 1000;

/// Fatal workspace resolution failures. Never retried.
#[derive(Debug)]
pub enum ResolutionError {
    /// `--resume` found nothing to resume.
    NoSavedState { searched: PathBuf },
    /// A directory could not be listed.
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A directory could not be created.
    Unwritable {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ResolutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSavedState { searched } => write!(
                f,
                "no saved state found in {}; start fresh with an objective",
                searched.display()
            ),
            Self::Unreadable { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            Self::Unwritable { path, source } => {
                write!(f, "cannot create {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoSavedState { .. } => None,
            Self::Unreadable { source, .. } | Self::Unwritable { source, .. } => Some(source),
        }
    }
}

/// How the workspace for this run was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceOrigin {
    Explicit,
    Resumed,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWorkspace {
    /// Absolute workspace root.
    pub path: PathBuf,
    pub origin: WorkspaceOrigin,
}

/// What the caller asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkspaceRequest<'a> {
    pub explicit: Option<&'a Path>,
    pub resume: bool,
    /// Required for fresh runs without an explicit path.
    pub objective: Option<&'a str>,
}

/// One entry of `autopilot --list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceSummary {
    pub name: String,
    pub path: PathBuf,
    /// First content line of the recorded objective, if any.
    pub objective: Option<String>,
    /// Whether the worker left a completion report.
    pub complete: bool,
}

/// Pick the base directory for auto-created workspaces.
///
/// Precedence: non-empty env override, configured directory, then
/// `<home>/.autopilot/workspaces`. Relative results are anchored at `cwd`.
pub fn resolve_base_dir(
    env_override: Option<OsString>,
    configured: Option<&Path>,
    home: Option<&Path>,
    cwd: &Path,
) -> Result<PathBuf> {
    let chosen = match env_override.filter(|value| !value.is_empty()) {
        Some(value) => PathBuf::from(value),
        None => match configured {
            Some(dir) => dir.to_path_buf(),
            None => home
                .map(|home| home.join(".autopilot").join("workspaces"))
                .ok_or_else(|| {
                    anyhow!("cannot locate home directory; set {WORKSPACES_ENV}")
                })?,
        },
    };
    Ok(absolutize(cwd, &chosen))
}

/// Resolves the workspace directory for one top-level invocation.
#[derive(Debug, Clone)]
pub struct WorkspaceResolver {
    base_dir: PathBuf,
    cwd: PathBuf,
}

impl WorkspaceResolver {
    pub fn new(base_dir: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        let cwd = cwd.into();
        let base_dir = absolutize(&cwd, &base_dir.into());
        Self { base_dir, cwd }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve using the current local time for collision suffixes.
    pub fn resolve(&self, request: &WorkspaceRequest<'_>) -> Result<ResolvedWorkspace> {
        self.resolve_at(request, chrono::Local::now().naive_local())
    }

    /// Resolve with an explicit clock, in priority order: explicit path,
    /// resume discovery, fresh directory.
    #[instrument(skip_all, fields(base_dir = %self.base_dir.display(), resume = request.resume))]
    pub fn resolve_at(
        &self,
        request: &WorkspaceRequest<'_>,
        now: NaiveDateTime,
    ) -> Result<ResolvedWorkspace> {
        if let Some(explicit) = request.explicit {
            let path = absolutize(&self.cwd, explicit);
            debug!(path = %path.display(), "using explicit workspace");
            return Ok(ResolvedWorkspace {
                path,
                origin: WorkspaceOrigin::Explicit,
            });
        }

        if request.resume {
            let path = self.find_resumable()?.ok_or_else(|| ResolutionError::NoSavedState {
                searched: self.base_dir.clone(),
            })?;
            info!(path = %path.display(), "resuming workspace");
            return Ok(ResolvedWorkspace {
                path,
                origin: WorkspaceOrigin::Resumed,
            });
        }

        let objective = request
            .objective
            .ok_or_else(|| anyhow!("an objective is required to create a workspace"))?;
        let path = self.create_fresh(objective, now)?;
        Ok(ResolvedWorkspace {
            path,
            origin: WorkspaceOrigin::Created,
        })
    }

    /// First subdirectory (by name) holding a populated objective marker.
    pub fn find_resumable(&self) -> Result<Option<PathBuf>> {
        for dir in subdirectories(&self.base_dir)? {
            if has_saved_state(&dir) {
                return Ok(Some(dir));
            }
            debug!(path = %dir.display(), "skipping directory without saved state");
        }
        Ok(None)
    }

    fn create_fresh(&self, objective: &str, now: NaiveDateTime) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).map_err(|source| ResolutionError::Unwritable {
            path: self.base_dir.clone(),
            source,
        })?;

        let slug = slugify(objective);
        let timestamp = timestamp_suffix(now);
        for name in candidate_names(&slug, &timestamp).take(MAX_NAME_CANDIDATES) {
            let path = self.base_dir.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "created workspace");
                    return Ok(path);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!(name = %name, "workspace name taken");
                }
                Err(source) => return Err(ResolutionError::Unwritable { path, source }.into()),
            }
        }

        Err(anyhow!(
            "unable to find a free workspace name for '{slug}' in {}",
            self.base_dir.display()
        ))
    }
}

/// Whether `workspace` holds a non-empty objective marker.
pub fn has_saved_state(workspace: &Path) -> bool {
    let paths = MemoryPaths::new(workspace);
    matches!(
        read_optional_lossy(&paths.objective_path),
        Ok(Some(contents)) if !contents.trim().is_empty()
    )
}

/// Enumerate workspaces under `base_dir` with their recorded objectives.
///
/// A missing base directory yields an empty list.
pub fn list_workspaces(base_dir: &Path) -> Result<Vec<WorkspaceSummary>> {
    let mut summaries = Vec::new();
    let dirs = match subdirectories(base_dir) {
        Ok(dirs) => dirs,
        Err(err) => match err.downcast_ref::<ResolutionError>() {
            Some(ResolutionError::NoSavedState { .. }) => return Ok(summaries),
            _ => return Err(err),
        },
    };
    for dir in dirs {
        let paths = MemoryPaths::new(&dir);
        let objective = read_optional_lossy(&paths.objective_path)?
            .as_deref()
            .and_then(objective_headline);
        summaries.push(WorkspaceSummary {
            name: dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            complete: paths.complete_path.is_file(),
            path: dir,
            objective,
        });
    }
    Ok(summaries)
}

/// First non-empty line that is not a Markdown heading.
fn objective_headline(contents: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

/// Immediate subdirectories of `base`, sorted by name.
///
/// A missing `base` is reported as [`ResolutionError::NoSavedState`].
fn subdirectories(base: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ResolutionError::NoSavedState {
                searched: base.to_path_buf(),
            }
            .into());
        }
        Err(source) => {
            return Err(ResolutionError::Unreadable {
                path: base.to_path_buf(),
                source,
            }
            .into());
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ResolutionError::Unreadable {
            path: base.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Anchor a relative `path` at `cwd`.
pub(crate) fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
