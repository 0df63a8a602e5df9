//! Autopilot configuration stored in `~/.autopilot/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "AUTOPILOT_CONFIG";

/// Autopilot configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to sensible values;
/// CLI flags override what is read here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Automatic checkpoint restarts allowed per invocation.
    pub max_restarts: u32,

    /// Wall-clock limit per worker session in seconds. Unset means no limit.
    pub timeout_secs: Option<u64>,

    /// Base directory for auto-created workspaces.
    pub workspaces_dir: Option<PathBuf>,

    /// Second location searched for objective files.
    pub install_root: Option<PathBuf>,

    /// How often the supervisor checks for interrupts while a session runs.
    pub poll_interval_ms: u64,

    pub worker: WorkerConfig,
}

/// How the worker process is launched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Program and leading arguments (e.g. `["claude", "--print"]`).
    pub command: Vec<String>,

    pub permission_policy: PermissionPolicy,

    /// Arguments appended under [`PermissionPolicy::Unattended`].
    pub unattended_args: Vec<String>,

    pub prompt_delivery: PromptDelivery,

    /// Tee worker stdout into `<workspace>/.autopilot/transcripts/`.
    pub transcripts: bool,
}

/// Capabilities granted to the worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionPolicy {
    /// Unattended write access inside the workspace; appends `unattended_args`.
    Unattended,
    /// The worker's own permission checks stay in force.
    Supervised,
}

/// Where the compiled prompt is handed to the worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PromptDelivery {
    /// Final command-line argument.
    Argument,
    /// Written to stdin, which is then closed.
    Stdin,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string(), "--print".to_string()],
            permission_policy: PermissionPolicy::Unattended,
            unattended_args: vec!["--dangerously-skip-permissions".to_string()],
            prompt_delivery: PromptDelivery::Argument,
            transcripts: true,
        }
    }
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            timeout_secs: None,
            workspaces_dir: None,
            install_root: None,
            poll_interval_ms: 250,
            worker: WorkerConfig::default(),
        }
    }
}

impl AutopilotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == Some(0) {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be > 0"));
        }
        if self.worker.command.is_empty() || self.worker.command[0].trim().is_empty() {
            return Err(anyhow!("worker.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Config file location: explicit flag, then `AUTOPILOT_CONFIG`, then
/// `<home>/.autopilot/config.toml`.
pub fn config_path(
    explicit: Option<&Path>,
    env_override: Option<PathBuf>,
    home: Option<&Path>,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or(env_override.filter(|path| !path.as_os_str().is_empty()))
        .or_else(|| home.map(|home| home.join(".autopilot").join("config.toml")))
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AutopilotConfig::default()`.
pub fn load_config(path: &Path) -> Result<AutopilotConfig> {
    if !path.exists() {
        let cfg = AutopilotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AutopilotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AutopilotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
