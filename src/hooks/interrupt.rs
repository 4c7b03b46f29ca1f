//! Ctrl-C handling
//!
//! Once [`Interrupt::listen`] has installed the handler, SIGINT no longer
//! terminates hookrun. The step that is running receives the signal itself
//! (it shares the terminal's process group) and exits; the pipeline sees the
//! flag, stops, and the stash is restored on the normal path. SIGKILL cannot
//! be intercepted: a run killed that way leaves its stash entry behind.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Exit code reported for an interrupted run (128 + SIGINT)
pub const EXIT_INTERRUPTED: i32 = 130;

/// Cancellation token shared between the signal task and the pipeline
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the Ctrl-C handler. Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn listen(&self) -> std::io::Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        // registered here rather than on first poll, so no window is left
        // before the first step starts
        let mut sigint = signal(SignalKind::interrupt())?;
        let flag = Arc::clone(&self.flag);
        tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                tracing::warn!("interrupt received, stopping after the current step");
                flag.store(true, Ordering::SeqCst);
            }
        });
        Ok(())
    }

    /// Install the Ctrl-C handler. Must be called from within a tokio runtime.
    #[cfg(not(unix))]
    pub fn listen(&self) -> std::io::Result<()> {
        let flag = Arc::clone(&self.flag);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current step");
                flag.store(true, Ordering::SeqCst);
            }
        });
        Ok(())
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
