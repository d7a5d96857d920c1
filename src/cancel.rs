//! Cooperative cancellation shared between the signal handler, the process
//! runner and the orchestrators.
//!
//! A single token is created per run. The CLI installs it as the SIGINT /
//! SIGTERM handler; `SystemCommandRunner` polls it while a child is running
//! and kills the child once it is set; the orchestrators check it before
//! every state transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use crate::error::{Error, Result};

/// Exit code used by the CLI when a run was cancelled.
pub const EXIT_CODE_CANCELLED: i32 = 130;

/// Clonable handle to a shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Error::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Route SIGINT and SIGTERM to this token.
    ///
    /// Can only be called once per process; `ctrlc` rejects a second handler.
    pub fn install_signal_handler(&self) -> std::result::Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            warn!("Received termination signal, cancelling run");
            token.cancel();
        })
    }
}
