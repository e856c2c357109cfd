//! Window store trait.
//!
//! The window store holds the set of distinct identifiers for the currently
//! open window. It is the only component that touches the set; everything
//! above it works with counts.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Swap primitive |
//! |---------|----------|----------------|
//! | `MemoryWindowStore` | Default; single process | `std::mem::take` under one mutex |
//! | `RedisWindowStore` | Shared set across processes | `MULTI` / `SCARD` / `DEL` / `EXEC` |
//!
//! # Guarantees
//!
//! `swap` is the linearization point between windows. Every `add` that
//! returns `Ok` either completed before the swap (and is included in the
//! returned count) or after it (and is visible only to the next swap). No
//! implementation may read the cardinality and clear the set as two separate
//! steps that an `add` can slip between.
//!
//! # Error Recovery
//!
//! | Error Type | Recovery Strategy |
//! |------------|-------------------|
//! | `Error::TransientStore` on `add` | Drop the identifier, report failure to the caller |
//! | `Error::TransientStore` on `swap` | Nothing was cleared; the window stays open until the next tick |

use crate::Result;
use crate::models::Identifier;

/// Trait for dedup window storage backends.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn WindowStore>`
/// - Use interior mutability for the set and any cached connections
/// - Bound every I/O call with a timeout; `add` sits on the request path
pub trait WindowStore: Send + Sync {
    /// Adds an identifier to the open window.
    ///
    /// Returns `true` if the identifier was not yet a member.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransientStore` if the backing store is unavailable.
    fn add(&self, id: Identifier) -> Result<bool>;

    /// Returns the number of distinct identifiers in the open window.
    ///
    /// Informational only; the value may be stale by the time it is used.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransientStore` if the backing store is unavailable.
    fn cardinality(&self) -> Result<u64>;

    /// Atomically closes the open window and starts an empty one.
    ///
    /// Returns the distinct count of the closed window.
    ///
    /// # Errors
    ///
    /// Returns `Error::TransientStore` if the swap could not be committed.
    /// On error the open window is left intact.
    fn swap(&self) -> Result<u64>;

    /// Returns the backend name for logs and metrics.
    fn backend_name(&self) -> &'static str;
}
