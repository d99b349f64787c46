//! Cooperative cancellation for in-flight pipeline runs.
//!
//! A [`CancelToken`] is cheap to clone and race against blocking calls with
//! `tokio::select!`. The orchestrator checks it at every stage boundary; the
//! fan-out pool races it against each outstanding AI/network call so a
//! cancelled run aborts promptly instead of letting calls run to completion.

use tokio::sync::watch;

/// Clonable cancellation handle.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
    tx: watch::Sender<bool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { rx, tx }
    }

    /// Signal cancellation to every clone of this token.
    pub fn cancel(&self) {
        // Receivers may all be dropped; that is fine.
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. Never resolves otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        // The sender lives inside self, so changed() only errors if every
        // token clone was dropped, in which case we pend forever.
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
