//! Periodic window rotation.
//!
//! The [`WindowScheduler`] closes the open window once per interval and hands
//! the count to the emitter.
//!
//! # Timing
//!
//! - The first tick fires one full interval after [`WindowScheduler::run`]
//!   starts, so the first window is a whole window
//! - Each tick runs on the blocking pool and is awaited before the next one
//!   is considered; drains never overlap
//! - A tick that comes due while the previous one is still running is
//!   skipped, not queued (`MissedTickBehavior::Skip`)
//! - Shutdown is checked between ticks; a running tick always completes

use super::shutdown::ShutdownSignal;
use super::window::DedupWindow;
use crate::emitter::Emitter;
use crate::models::EmittedCount;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::instrument;

/// Outcome of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// The window was drained and its count published.
    Published(EmittedCount),
    /// The window was drained but the emitter failed. The count is lost.
    PublishFailed {
        /// The count that could not be delivered.
        emitted: EmittedCount,
        /// Why the emitter failed.
        cause: String,
    },
    /// The store could not drain; the window stays open.
    DrainFailed {
        /// Why the drain failed.
        cause: String,
    },
    /// Another drain was in progress.
    Skipped,
}

impl TickReport {
    /// Returns true if a count reached the emitter successfully.
    #[must_use]
    pub const fn is_published(&self) -> bool {
        matches!(self, Self::Published(_))
    }

    /// The count produced by this tick, whether or not it was delivered.
    #[must_use]
    pub const fn emitted(&self) -> Option<&EmittedCount> {
        match self {
            Self::Published(emitted) | Self::PublishFailed { emitted, .. } => Some(emitted),
            Self::DrainFailed { .. } | Self::Skipped => None,
        }
    }
}

/// Drives drain-and-publish once per window interval.
pub struct WindowScheduler {
    window: Arc<DedupWindow>,
    emitter: Arc<dyn Emitter>,
    interval: Duration,
}

impl WindowScheduler {
    /// Creates a scheduler rotating `window` every `interval`.
    #[must_use]
    pub fn new(window: Arc<DedupWindow>, emitter: Arc<dyn Emitter>, interval: Duration) -> Self {
        Self {
            window,
            emitter,
            interval,
        }
    }

    /// The window length.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// The window being rotated.
    #[must_use]
    pub fn window(&self) -> &Arc<DedupWindow> {
        &self.window
    }

    /// Drains the open window and publishes its count, once.
    ///
    /// Blocking: the emitter may perform network I/O. Failures are logged and
    /// reported, never propagated.
    #[instrument(skip(self), fields(operation = "window_tick", emitter = self.emitter.name()))]
    pub fn tick(&self) -> TickReport {
        let drained = match self.window.try_drain() {
            None => {
                metrics::counter!("tally_ticks_skipped_total").increment(1);
                tracing::warn!("Previous drain still running, skipping tick");
                return TickReport::Skipped;
            },
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Failed to drain window");
                return TickReport::DrainFailed {
                    cause: e.to_string(),
                };
            },
            Some(Ok(drained)) => drained,
        };

        let emitted = drained.to_emitted(self.interval);
        match self.emitter.publish(&emitted) {
            Ok(()) => {
                metrics::counter!(
                    "tally_publish_total",
                    "emitter" => self.emitter.name(),
                    "status" => "success"
                )
                .increment(1);
                tracing::info!(
                    window_id = %emitted.window_id,
                    "Sent unique count to topic '{}': {}",
                    self.emitter.topic(),
                    emitted.count
                );
                TickReport::Published(emitted)
            },
            Err(e) => {
                metrics::counter!(
                    "tally_publish_total",
                    "emitter" => self.emitter.name(),
                    "status" => "error"
                )
                .increment(1);
                tracing::error!(
                    window_id = %emitted.window_id,
                    count = emitted.count,
                    error = %e,
                    "Failed to publish unique count"
                );
                TickReport::PublishFailed {
                    emitted,
                    cause: e.to_string(),
                }
            },
        }
    }

    /// Runs the tick loop until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            emitter = self.emitter.name(),
            topic = %self.emitter.topic(),
            "Window scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.wait() => break,
                _ = ticker.tick() => {},
            }

            let scheduler = Arc::clone(&self);
            if let Err(e) = tokio::task::spawn_blocking(move || scheduler.tick()).await {
                tracing::error!(error = %e, "Tick task panicked");
            }
        }

        tracing::info!("Window scheduler stopped");
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self: Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
