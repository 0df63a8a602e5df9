//! Supervisor for a long-running autonomous worker.
//!
//! `autopilot` resolves a workspace for an objective, scaffolds a file-based
//! memory store inside it, and launches an external worker process. When the
//! worker exits cleanly after writing the resume sentinel, it is relaunched in
//! resume mode, up to a bounded number of restarts.
//!
//! - **[`core`]**: Pure, deterministic logic (naming, prompts, restart state
//!   machine). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, config, signals,
//!   process execution). The [`io::worker::Worker`] trait is the seam tests
//!   replace.
//!
//! Orchestration modules ([`prepare`], [`supervise`]) coordinate the two to
//! implement the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod prepare;
pub mod supervise;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
