//! Cooperative shutdown signalling.

use std::future::Future;
use tokio::sync::watch;

/// Creates a linked trigger/signal pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Fires the shutdown signal.
///
/// Dropping the trigger also counts as shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Requests shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Awaits `signal`, then requests shutdown whatever its outcome.
    ///
    /// Returns the signal's output so the caller can report a failed
    /// listener after the running tasks have been told to stop.
    pub async fn trigger_after<F, T>(&self, signal: F) -> T
    where
        F: Future<Output = T>,
    {
        let output = signal.await;
        self.trigger();
        output
    }

    /// Returns another signal linked to this trigger.
    #[must_use]
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes a [`ShutdownTrigger`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Returns true once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Completes when shutdown is requested or the trigger is dropped.
    ///
    /// Cancel safe.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
