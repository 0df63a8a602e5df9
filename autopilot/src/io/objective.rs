//! Objective resolution: file path or literal text.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// Where the objective text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectiveSource {
    /// File relative to the current directory.
    WorkingDir(PathBuf),
    /// File relative to the installation root.
    InstallRoot(PathBuf),
    /// The argument itself.
    Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedObjective {
    pub text: String,
    pub source: ObjectiveSource,
}

/// Turn a user-supplied string into objective text.
///
/// Tries `cwd/input`, then `install_root/input`, then falls back to `input`
/// as literal text. A path that does not exist is never an error; the chosen
/// interpretation is logged so a mistyped filename is visible.
pub fn resolve_objective(
    input: &str,
    cwd: &Path,
    install_root: Option<&Path>,
) -> Result<ResolvedObjective> {
    let local = cwd.join(input);
    if local.is_file() {
        let text = read_trimmed(&local)?;
        info!(path = %local.display(), "objective loaded from file");
        return Ok(ResolvedObjective {
            text,
            source: ObjectiveSource::WorkingDir(local),
        });
    }

    if let Some(root) = install_root {
        let installed = root.join(input);
        if installed.is_file() {
            let text = read_trimmed(&installed)?;
            info!(path = %installed.display(), "objective loaded from install root");
            return Ok(ResolvedObjective {
                text,
                source: ObjectiveSource::InstallRoot(installed),
            });
        }
    }

    info!(
        chars = input.chars().count(),
        "no objective file found, treating argument as literal text"
    );
    Ok(ResolvedObjective {
        text: input.to_string(),
        source: ObjectiveSource::Literal,
    })
}

fn read_trimmed(path: &Path) -> Result<String> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read objective {}", path.display()))?;
    Ok(contents.trim().to_string())
}
