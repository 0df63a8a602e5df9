//! Worker instruction document compiler.
//!
//! Rendering is a pure function of `(objective, workspace, mode)`: the same
//! inputs always produce byte-identical output.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::layout::MemoryPaths;
use crate::core::types::{RESUME_TOKEN, RunMode};

const FRESH_TEMPLATE: &str = include_str!("prompts/fresh.md");
const RESUME_TEMPLATE: &str = include_str!("prompts/resume.md");
const MEMORY_TEMPLATE: &str = include_str!("prompts/memory.md");

/// Inputs for one rendered prompt.
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    /// Literal objective text. Not rendered in resume mode.
    pub objective: &'a str,
    /// Absolute workspace root.
    pub workspace: &'a Path,
    pub mode: RunMode,
}

/// Memory paths as display strings for template rendering.
#[derive(Debug, Clone, Serialize)]
struct PathsContext {
    memory: String,
    core: String,
    learned: String,
    current: String,
    handoffs: String,
    archive: String,
    objective: String,
    progress: String,
    working_on: String,
    blocked: String,
    complete: String,
    errors: String,
    status: String,
}

impl PathsContext {
    fn from_paths(paths: &MemoryPaths) -> Self {
        let show = |p: &Path| p.display().to_string();
        Self {
            memory: show(&paths.memory_dir),
            core: show(&paths.core_dir),
            learned: show(&paths.learned_dir),
            current: show(&paths.current_dir),
            handoffs: show(&paths.handoffs_dir),
            archive: show(&paths.archive_dir),
            objective: show(&paths.objective_path),
            progress: show(&paths.progress_path),
            working_on: show(&paths.working_on_path),
            blocked: show(&paths.blocked_path),
            complete: show(&paths.complete_path),
            errors: show(&paths.errors_path),
            status: show(&paths.status_path),
        }
    }
}

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template("fresh", FRESH_TEMPLATE)
        .context("load fresh prompt template")?;
    env.add_template("resume", RESUME_TEMPLATE)
        .context("load resume prompt template")?;
    env.add_template("memory", MEMORY_TEMPLATE)
        .context("load memory prompt template")?;
    Ok(env)
}

/// Render the worker instruction document.
pub fn compile_prompt(input: &PromptInput<'_>) -> Result<String> {
    let env = environment()?;
    let paths = PathsContext::from_paths(&MemoryPaths::new(input.workspace));
    let name = match input.mode {
        RunMode::Fresh => "fresh",
        RunMode::Resume => "resume",
    };
    let template = env.get_template(name)?;
    let rendered = template
        .render(context! {
            objective => input.objective.trim(),
            workspace => input.workspace.display().to_string(),
            paths => paths,
            resume_token => RESUME_TOKEN,
        })
        .with_context(|| format!("render {name} prompt"))?;
    Ok(rendered)
}
