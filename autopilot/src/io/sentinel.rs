//! Checkpoint sentinel at `.memory/current/status.txt`.
//!
//! The worker writes [`RESUME_TOKEN`](crate::core::types::RESUME_TOKEN) there
//! before exiting cleanly when its context is exhausted. Consuming the signal
//! deletes the file so it can never be counted twice.

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::layout::MemoryPaths;
use crate::core::types::ResumeSignal;

/// Read the sentinel without modifying it.
///
/// Anything other than the token, including bytes that are not UTF-8, is no
/// signal.
pub fn peek_sentinel(paths: &MemoryPaths) -> Result<Option<ResumeSignal>> {
    let bytes = match fs::read(&paths.status_path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", paths.status_path.display()));
        }
    };
    match std::str::from_utf8(&bytes) {
        Ok(contents) => Ok(ResumeSignal::parse(contents)),
        Err(_) => {
            debug!(path = %paths.status_path.display(), "status file is not UTF-8, ignoring");
            Ok(None)
        }
    }
}

/// Read the sentinel and, if it requests a resume, clear it.
///
/// Content other than the resume token is left on disk untouched.
pub fn read_and_clear_sentinel(paths: &MemoryPaths) -> Result<Option<ResumeSignal>> {
    let Some(signal) = peek_sentinel(paths)? else {
        debug!(path = %paths.status_path.display(), "no resume sentinel");
        return Ok(None);
    };
    remove_status(paths)?;
    debug!(path = %paths.status_path.display(), "consumed resume sentinel");
    Ok(Some(signal))
}

/// Clear a resume sentinel left behind by an earlier invocation.
///
/// Returns true when a stale signal was removed.
pub fn clear_stale_sentinel(paths: &MemoryPaths) -> Result<bool> {
    if peek_sentinel(paths)?.is_none() {
        return Ok(false);
    }
    warn!(
        path = %paths.status_path.display(),
        "clearing stale resume sentinel from a previous run"
    );
    remove_status(paths)?;
    Ok(true)
}

fn remove_status(paths: &MemoryPaths) -> Result<()> {
    match fs::remove_file(&paths.status_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("remove {}", paths.status_path.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RESUME_TOKEN;
    use crate::io::memory::ensure_memory_layout;

    #[test]
    fn absent_sentinel_is_no_signal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ensure_memory_layout(temp.path()).expect("layout");
        assert_eq!(read_and_clear_sentinel(&paths).expect("read"), None);
    }

    #[test]
    fn resume_token_is_consumed_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ensure_memory_layout(temp.path()).expect("layout");
        fs::write(&paths.status_path, format!("{RESUME_TOKEN}\n")).expect("write");

        assert_eq!(
            read_and_clear_sentinel(&paths).expect("first"),
            Some(ResumeSignal)
        );
        assert!(!paths.status_path.exists());
        assert_eq!(read_and_clear_sentinel(&paths).expect("second"), None);
    }

    #[test]
    fn other_content_is_ignored_and_kept() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ensure_memory_layout(temp.path()).expect("layout");
        fs::write(&paths.status_path, "WORKING").expect("write");

        assert_eq!(read_and_clear_sentinel(&paths).expect("read"), None);
        assert_eq!(
            fs::read_to_string(&paths.status_path).expect("read back"),
            "WORKING"
        );
        assert!(!clear_stale_sentinel(&paths).expect("stale"));
    }

    #[test]
    fn non_utf8_content_is_no_signal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ensure_memory_layout(temp.path()).expect("layout");
        fs::write(&paths.status_path, b"\xff\xfe\x00").expect("write");

        assert_eq!(read_and_clear_sentinel(&paths).expect("read"), None);
        assert!(!clear_stale_sentinel(&paths).expect("stale"));
        assert!(paths.status_path.exists());
    }

    #[test]
    fn stale_signal_is_cleared() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = ensure_memory_layout(temp.path()).expect("layout");
        fs::write(&paths.status_path, RESUME_TOKEN).expect("write");

        assert!(clear_stale_sentinel(&paths).expect("clear"));
        assert_eq!(peek_sentinel(&paths).expect("peek"), None);
    }
}
