//! Memory store scaffolding under `<workspace>/.memory/`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::layout::MemoryPaths;

/// Idempotently create every memory partition under `workspace`.
///
/// Existing directories are left alone; only an unwritable parent fails.
#[instrument(skip_all, fields(workspace = %workspace.display()))]
pub fn ensure_memory_layout(workspace: &Path) -> Result<MemoryPaths> {
    let paths = MemoryPaths::new(workspace);
    for dir in paths.partitions() {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    debug!("memory layout ready");
    Ok(paths)
}

/// Write the starter documents for a fresh session.
///
/// Files the worker already wrote are never overwritten.
pub fn seed_memory(paths: &MemoryPaths, objective: &str, created_at: &str) -> Result<()> {
    write_if_missing(&paths.objective_path, &objective_document(objective, created_at))?;
    write_if_missing(&paths.architecture_path, ARCHITECTURE_TEMPLATE)?;
    write_if_missing(&paths.patterns_path, PATTERNS_TEMPLATE)?;
    write_if_missing(&paths.decisions_path, DECISIONS_TEMPLATE)?;
    write_if_missing(&paths.progress_path, PROGRESS_TEMPLATE)?;
    Ok(())
}

/// Read a worker-written memory file, returning `None` when it does not exist.
///
/// Invalid UTF-8 is replaced rather than treated as an error.
pub fn read_optional_lossy(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("read {}", path.display())),
    }
}

fn write_if_missing(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        debug!(path = %path.display(), "keeping existing memory file");
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

fn objective_document(objective: &str, created_at: &str) -> String {
    format!(
        "# Project Objective\n\n## Main Goal\n{}\n\n## Success Criteria\n\
         - Objective is fully implemented\n\
         - All tests pass\n\
         - Code is documented\n\
         - Solution is deployed or deployable\n\n\
         ## Created\n{created_at}\n",
        objective.trim()
    )
}

const PROGRESS_TEMPLATE: &str = "# Progress Tracker

## Overall Progress: 0%

## Completed Tasks
- [ ] Understand objective
- [ ] Plan approach
- [ ] Implement solution
- [ ] Test solution
- [ ] Document solution

## Current Status
Starting analysis...
";

const ARCHITECTURE_TEMPLATE: &str = "# Architecture Decisions

## Technology Stack
(To be determined based on requirements)

## Key Components
(To be identified during implementation)

## Design Patterns
(To be discovered and documented)
";

const PATTERNS_TEMPLATE: &str = "# Discovered Patterns

## Code Patterns
(Patterns found in the codebase will be documented here)

## Workflow Patterns
(Effective workflows will be noted here)

## Anti-Patterns to Avoid
(Problematic approaches will be listed here)
";

const DECISIONS_TEMPLATE: &str = "# Decision Log

## Format: [Date] Decision: Rationale

(Decisions will be logged here as they are made)
";
