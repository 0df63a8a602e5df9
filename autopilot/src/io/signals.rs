//! Interrupt handling for the supervisor.
//!
//! A background thread drives a single-threaded tokio runtime that waits for
//! Ctrl-C (and SIGTERM on unix) and raises a shared [`CancelFlag`]. The thread
//! that owns the worker process polls the flag between wait slices.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Shared cancellation flag raised by an external interrupt.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Route Ctrl-C/SIGTERM to `flag` instead of terminating the supervisor.
///
/// Signal handlers are registered before this returns.
pub fn install_interrupt_handler(flag: CancelFlag) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;

    #[cfg(unix)]
    let mut listener = {
        use tokio::signal::unix::{SignalKind, signal};
        let _guard = runtime.enter();
        let interrupt = signal(SignalKind::interrupt()).context("register SIGINT handler")?;
        let terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                None
            }
        };
        (interrupt, terminate)
    };

    thread::Builder::new()
        .name("autopilot-signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    #[cfg(unix)]
                    {
                        let (interrupt, terminate) = &mut listener;
                        match terminate {
                            Some(terminate) => {
                                tokio::select! {
                                    _ = interrupt.recv() => {}
                                    _ = terminate.recv() => {}
                                }
                            }
                            None => {
                                interrupt.recv().await;
                            }
                        }
                    }

                    #[cfg(not(unix))]
                    {
                        if let Err(err) = tokio::signal::ctrl_c().await {
                            tracing::error!(%err, "ctrl-c signal handler failed");
                            return;
                        }
                    }

                    debug!("interrupt received");
                    flag.cancel();
                }
            });
        })
        .context("spawn signal thread")?;
    Ok(())
}
