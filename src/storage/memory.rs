//! In-process window store.

use crate::Result;
use crate::models::Identifier;
use crate::storage::traits::WindowStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Callback invoked inside the swap critical section.
///
/// Used for fault injection: a test can block in the hook to hold a drain
/// open while racing an `add` against it.
pub type SwapHook = Arc<dyn Fn() + Send + Sync>;

/// Window store backed by a `HashSet` behind a single mutex.
///
/// # Thread Safety
///
/// `add` and `swap` contend on the same lock, so the swap is a single point
/// in the total order of operations. The critical section of `swap` is an
/// O(1) `std::mem::take`; the old set is dropped after the lock is released.
///
/// # Lock Poisoning
///
/// A poisoned lock is recovered rather than reported. Both critical
/// sections leave the set in a valid state even if a panic unwinds through
/// them, so the data behind a poisoned lock is still trustworthy.
pub struct MemoryWindowStore {
    current: Mutex<HashSet<Identifier>>,
    swap_hook: Option<SwapHook>,
}

impl MemoryWindowStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Mutex::new(HashSet::new()),
            swap_hook: None,
        }
    }

    /// Installs a hook that runs inside the swap critical section, after the
    /// lock is taken and before the set is replaced.
    #[must_use]
    pub fn with_swap_hook(mut self, hook: SwapHook) -> Self {
        self.swap_hook = Some(hook);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Identifier>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryWindowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowStore for MemoryWindowStore {
    fn add(&self, id: Identifier) -> Result<bool> {
        Ok(self.lock().insert(id))
    }

    fn cardinality(&self) -> Result<u64> {
        Ok(self.lock().len() as u64)
    }

    fn swap(&self) -> Result<u64> {
        let closed = {
            let mut current = self.lock();
            if let Some(hook) = &self.swap_hook {
                hook();
            }
            std::mem::take(&mut *current)
        };
        Ok(closed.len() as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
