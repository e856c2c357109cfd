//! The open dedup window.
//!
//! [`DedupWindow`] owns the window that is currently accepting identifiers
//! and turns the store's atomic swap into a numbered [`DrainedWindow`].

use crate::models::{DrainedWindow, Identifier, WindowId};
use crate::storage::WindowStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Instant;
use tracing::instrument;

/// Bookkeeping for the window that is open for writes.
#[derive(Debug, Clone, Copy)]
struct OpenWindow {
    id: WindowId,
    opened_at: DateTime<Utc>,
}

impl OpenWindow {
    fn first() -> Self {
        Self {
            id: WindowId::FIRST,
            opened_at: Utc::now(),
        }
    }
}

/// Concurrent distinct-identifier window with an atomic drain.
///
/// # How it works
///
/// 1. `add` inserts into the store's open set; many callers may add at once
/// 2. `drain` takes the drain lock, asks the store to swap the open set for
///    an empty one, and advances the window number
/// 3. The store's swap is a single point in the order of operations, so an
///    add racing a drain lands in exactly one of the two windows
///
/// # Thread Safety
///
/// `add` never takes the drain lock; it only contends with the store's own
/// swap. Drains are serialized by the drain lock: a second `drain` waits,
/// while [`try_drain`](Self::try_drain) gives up instead.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use tally::models::WindowId;
/// use tally::services::DedupWindow;
/// use tally::storage::MemoryWindowStore;
///
/// let window = DedupWindow::new(Arc::new(MemoryWindowStore::new()));
/// window.add(10)?;
///
/// let first = window.drain()?;
/// assert_eq!(first.window_id, WindowId::FIRST);
/// assert_eq!(first.count, 1);
/// assert_eq!(window.current_window_id(), WindowId::new(2));
/// # Ok::<(), tally::Error>(())
/// ```
pub struct DedupWindow {
    store: Arc<dyn WindowStore>,
    open: Mutex<OpenWindow>,
}

impl DedupWindow {
    /// Creates a window over `store`, opening window [`WindowId::FIRST`].
    #[must_use]
    pub fn new(store: Arc<dyn WindowStore>) -> Self {
        Self {
            store,
            open: Mutex::new(OpenWindow::first()),
        }
    }

    /// Records `id` in the open window.
    ///
    /// Returns `true` if the identifier was not yet in the window.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransientStore` if the store could not record the
    /// identifier. The identifier is then dropped.
    #[instrument(skip(self), fields(operation = "window_add", backend = self.store.backend_name()))]
    pub fn add(&self, id: Identifier) -> Result<bool> {
        match self.store.add(id) {
            Ok(true) => {
                metrics::counter!("tally_ids_accepted_total").increment(1);
                Ok(true)
            },
            Ok(false) => {
                metrics::counter!("tally_ids_accepted_total").increment(1);
                metrics::counter!("tally_ids_duplicate_total").increment(1);
                tracing::trace!(id, "Identifier already in open window");
                Ok(false)
            },
            Err(e) => {
                metrics::counter!("tally_ids_failed_total").increment(1);
                Err(e)
            },
        }
    }

    /// Closes the open window and opens a fresh one.
    ///
    /// Blocks while another drain is in progress.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransientStore` if the store could not swap. The open
    /// window keeps its number and contents in that case.
    pub fn drain(&self) -> Result<DrainedWindow> {
        let guard = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        self.drain_locked(guard)
    }

    /// Like [`drain`](Self::drain), but returns `None` instead of waiting
    /// when another drain holds the lock.
    pub fn try_drain(&self) -> Option<Result<DrainedWindow>> {
        let guard = match self.open.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(self.drain_locked(guard))
    }

    #[allow(clippy::cast_precision_loss)]
    #[instrument(skip(self, open), fields(operation = "window_drain", window_id = %open.id))]
    fn drain_locked(&self, mut open: MutexGuard<'_, OpenWindow>) -> Result<DrainedWindow> {
        let start = Instant::now();

        let count = self.store.swap().map_err(|e| {
            tracing::warn!(error = %e, "Window swap failed");
            match e {
                Error::TransientStore { .. } => e,
                other => Error::TransientStore {
                    operation: "window_swap".to_string(),
                    cause: other.to_string(),
                },
            }
        })?;
        let closed_at = Utc::now();

        let drained = DrainedWindow {
            window_id: open.id,
            count,
            opened_at: open.opened_at,
            closed_at,
        };
        *open = OpenWindow {
            id: open.id.next(),
            opened_at: closed_at,
        };
        drop(open);

        let duration_ms = start.elapsed().as_millis();
        metrics::counter!("tally_window_drains_total").increment(1);
        metrics::gauge!("tally_window_unique_count").set(count as f64);
        metrics::histogram!("tally_drain_duration_ms").record(duration_ms as f64);

        tracing::debug!(
            window_id = %drained.window_id,
            count,
            duration_ms = %duration_ms,
            "Window drained"
        );

        Ok(drained)
    }

    /// Returns the number of the window currently open for writes.
    #[must_use]
    pub fn current_window_id(&self) -> WindowId {
        self.open.lock().unwrap_or_else(PoisonError::into_inner).id
    }

    /// Returns when the open window was opened.
    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .opened_at
    }

    /// Approximate number of distinct identifiers in the open window.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub fn len(&self) -> Result<u64> {
        self.store.cardinality()
    }

    /// Returns true if the open window holds no identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Name of the backing store.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}
