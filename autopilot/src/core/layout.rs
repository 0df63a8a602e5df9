//! Canonical paths inside a workspace.
//!
//! Pure path arithmetic; nothing here touches the filesystem.

use std::path::{Path, PathBuf};

/// Directory holding the persistent memory store.
pub const MEMORY_DIR: &str = ".memory";
/// Directory for supervisor-owned artifacts (transcripts).
pub const AUTOPILOT_DIR: &str = ".autopilot";

/// The five memory partitions, in creation order.
pub const PARTITIONS: [&str; 5] = ["core", "learned", "current", "handoffs", "archive"];

/// All well-known paths within a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPaths {
    pub workspace: PathBuf,
    pub memory_dir: PathBuf,
    pub core_dir: PathBuf,
    pub learned_dir: PathBuf,
    pub current_dir: PathBuf,
    pub handoffs_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub objective_path: PathBuf,
    pub architecture_path: PathBuf,
    pub patterns_path: PathBuf,
    pub decisions_path: PathBuf,
    pub progress_path: PathBuf,
    pub working_on_path: PathBuf,
    pub blocked_path: PathBuf,
    pub complete_path: PathBuf,
    pub errors_path: PathBuf,
    pub status_path: PathBuf,
    pub transcripts_dir: PathBuf,
}

impl MemoryPaths {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        let workspace = workspace.into();
        let memory_dir = workspace.join(MEMORY_DIR);
        let core_dir = memory_dir.join("core");
        let learned_dir = memory_dir.join("learned");
        let current_dir = memory_dir.join("current");
        let handoffs_dir = memory_dir.join("handoffs");
        let archive_dir = memory_dir.join("archive");
        Self {
            transcripts_dir: workspace.join(AUTOPILOT_DIR).join("transcripts"),
            workspace,
            objective_path: core_dir.join("objective.md"),
            architecture_path: core_dir.join("architecture.md"),
            patterns_path: learned_dir.join("patterns.md"),
            decisions_path: learned_dir.join("decisions.md"),
            progress_path: current_dir.join("progress.md"),
            working_on_path: current_dir.join("working-on.md"),
            blocked_path: current_dir.join("blocked.md"),
            complete_path: current_dir.join("complete.md"),
            errors_path: current_dir.join("errors.log"),
            status_path: current_dir.join("status.txt"),
            memory_dir,
            core_dir,
            learned_dir,
            current_dir,
            handoffs_dir,
            archive_dir,
        }
    }

    /// Partition directories in [`PARTITIONS`] order.
    pub fn partitions(&self) -> [&Path; 5] {
        [
            &self.core_dir,
            &self.learned_dir,
            &self.current_dir,
            &self.handoffs_dir,
            &self.archive_dir,
        ]
    }

    /// Transcript file for the `session`-th launch of an invocation.
    pub fn transcript_path(&self, stamp: &str, session: u32) -> PathBuf {
        self.transcripts_dir
            .join(format!("session-{stamp}-{session}.log"))
    }
}
