//! Helpers for running the worker process with timeouts and cancellation.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::budget::remaining_time;
use crate::io::signals::CancelFlag;

/// How long to wait and how often to look at the cancel flag.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

/// How a supervised child process ended.
#[derive(Debug)]
pub enum ProcessExit {
    Exited(ExitStatus),
    /// The timeout elapsed; the child was killed.
    TimedOut,
    /// The cancel flag was raised; the child was killed.
    Cancelled,
}

/// Run a command until it exits, times out, or `cancel` is raised.
///
/// stderr is inherited. stdout is inherited too unless `transcript_path` is
/// set, in which case each stdout line is echoed to our stdout and appended to
/// the transcript as it arrives. `stdin` is fed from a helper thread so a
/// child that never reads it cannot stall the deadline. On unix the child
/// leads its own process group, and a timed-out or cancelled child is killed
/// together with everything it spawned.
#[instrument(skip_all, fields(timeout_secs = policy.timeout.map(|t| t.as_secs()), transcript = transcript_path.is_some()))]
pub fn run_supervised(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    policy: &WaitPolicy,
    cancel: &CancelFlag,
    transcript_path: Option<&Path>,
) -> Result<ProcessExit> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    if transcript_path.is_some() {
        cmd.stdout(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit());
    }
    cmd.stderr(Stdio::inherit());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let transcript = match transcript_path {
        Some(path) => Some(open_transcript(path)?),
        None => None,
    };

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let tee_handle = match transcript {
        Some(file) => {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("stdout was not piped"))?;
            Some(thread::spawn(move || tee_lines(stdout, file)))
        }
        None => None,
    };

    let stdin_handle = match stdin {
        Some(input) => {
            let child_stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("stdin was not piped"))?;
            let payload = input.to_vec();
            Some(thread::spawn(move || feed_stdin(child_stdin, &payload)))
        }
        None => None,
    };

    let deadline = policy.timeout.map(|timeout| Instant::now() + timeout);
    let exit = loop {
        if cancel.is_cancelled() {
            warn!("interrupt received, killing child");
            kill_child(&mut child)?;
            break ProcessExit::Cancelled;
        }
        let slice = match deadline {
            Some(deadline) => match remaining_time(deadline) {
                Some(remaining) => remaining.min(policy.poll_interval),
                None => {
                    warn!(
                        timeout_secs = policy.timeout.map(|t| t.as_secs()),
                        "command timed out, killing"
                    );
                    kill_child(&mut child)?;
                    break ProcessExit::TimedOut;
                }
            },
            None => policy.poll_interval,
        };
        if let Some(status) = child.wait_timeout(slice).context("wait for command")? {
            debug!(exit_code = ?status.code(), "command finished");
            break ProcessExit::Exited(status);
        }
    };

    if let Some(handle) = stdin_handle {
        join_helper(handle, "stdin writer")?;
    }
    if let Some(handle) = tee_handle {
        let lines = join_helper(handle, "output reader").context("join stdout")?;
        debug!(lines, "transcript written");
    }

    Ok(exit)
}

/// Kill the child and, on unix, its whole process group, then reap it.
fn kill_child(child: &mut Child) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let pgid = i32::try_from(child.id()).context("child pid out of range")?;
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(err) => {
                warn!(%err, "failed to kill process group, killing child only");
                child.kill().context("kill command")?;
            }
        }
    }
    #[cfg(not(unix))]
    child.kill().context("kill command")?;

    child.wait().context("wait command after kill")?;
    Ok(())
}

fn feed_stdin(mut child_stdin: ChildStdin, payload: &[u8]) -> Result<()> {
    match child_stdin.write_all(payload) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            warn!("child closed stdin before reading the full prompt");
            Ok(())
        }
        Err(e) => Err(e).context("write stdin"),
    }
}

fn open_transcript(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create transcript dir {}", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("create transcript file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn join_helper<T>(handle: thread::JoinHandle<Result<T>>, name: &str) -> Result<T> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{name} thread panicked")),
    }
}

/// Echo each line to our stdout and append it to the transcript, flushing per
/// line so long sessions can be followed live. Returns the line count.
fn tee_lines<R: Read>(reader: R, mut transcript: BufWriter<File>) -> Result<usize> {
    let mut buf_reader = BufReader::new(reader);
    let mut lines = 0usize;
    let stdout = std::io::stdout();

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }
        lines += 1;

        {
            let mut out = stdout.lock();
            if let Err(e) = out.write_all(&line).and_then(|()| out.flush()) {
                warn!(err = %e, "failed to echo worker output");
            }
        }
        if let Err(e) = transcript.write_all(&line) {
            warn!(err = %e, "failed to write to transcript");
        } else if let Err(e) = transcript.flush() {
            warn!(err = %e, "failed to flush transcript");
        }
    }

    Ok(lines)
}
