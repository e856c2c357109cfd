//! # Tally
//!
//! Windowed distinct-identifier counting with periodic emission.
//!
//! Callers submit integer identifiers; tally deduplicates them inside a fixed
//! window (one minute by default) and, once per window, publishes the number
//! of distinct identifiers to a downstream topic before starting a fresh
//! window.
//!
//! ## Architecture
//!
//! ```text
//! HTTP /api/accept ──► RequestAcceptor ──► DedupWindow::add ──► WindowStore
//!                                                                   ▲
//! WindowScheduler tick ──► DedupWindow::drain ──────────────────────┘
//!          │
//!          └──► Emitter::publish ──► topic (log | broadcast | webhook | redis)
//! ```
//!
//! The drain is an atomic swap: every identifier accepted by
//! [`DedupWindow::add`] is attributed to exactly one window.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tally::services::DedupWindow;
//! use tally::storage::MemoryWindowStore;
//!
//! let window = DedupWindow::new(Arc::new(MemoryWindowStore::new()));
//! window.add(1)?;
//! window.add(2)?;
//! window.add(1)?;
//!
//! let drained = window.drain()?;
//! assert_eq!(drained.count, 2);
//! # Ok::<(), tally::Error>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod emitter;
pub mod models;
pub mod observability;
pub mod server;
pub mod services;
pub mod storage;

pub use config::TallyConfig;
pub use emitter::Emitter;
pub use models::{AcceptOutcome, DrainedWindow, EmittedCount, Identifier, WindowId};
pub use services::{DedupWindow, RequestAcceptor, ShutdownSignal, WindowScheduler};
pub use storage::{MemoryWindowStore, WindowStore};

/// Error type for tally operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed identifier at the HTTP boundary, invalid config values |
/// | `TransientStore` | Backing store unreachable, timed out, or its lock failed |
/// | `Publish` | Emitter transport could not deliver a count |
/// | `OperationFailed` | Bootstrap, file I/O, observability setup |
/// | `FeatureNotEnabled` | Configured backend requires a disabled Cargo feature |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - The `id` query parameter is missing or not an integer
    /// - A config value is out of range (e.g. a zero window interval)
    /// - A backend name in the config file is unknown
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing store could not complete an add or drain.
    ///
    /// Recovered locally: ingestion drops the identifier and reports a
    /// failure indicator; the scheduler logs and waits for the next tick.
    #[error("store operation '{operation}' failed: {cause}")]
    TransientStore {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An emitter could not deliver a count to its topic.
    ///
    /// Never retried; the next window's count supersedes it.
    #[error("publish to '{topic}' failed: {cause}")]
    Publish {
        /// The destination topic.
        topic: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - Config files cannot be read or parsed
    /// - The HTTP listener cannot bind
    /// - Observability components fail to initialize
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Returns true for errors the caller may recover from by dropping the
    /// current item and carrying on.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore { .. } | Self::Publish { .. })
    }
}

/// Result type alias for tally operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("id must be an integer".to_string());
        assert_eq!(err.to_string(), "invalid input: id must be an integer");

        let err = Error::TransientStore {
            operation: "sadd".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "store operation 'sadd' failed: connection refused"
        );

        let err = Error::Publish {
            topic: "unique-counts".to_string(),
            cause: "HTTP 503".to_string(),
        };
        assert_eq!(err.to_string(), "publish to 'unique-counts' failed: HTTP 503");
    }

    #[test]
    fn test_transient_classification() {
        assert!(
            Error::TransientStore {
                operation: "drain".into(),
                cause: "timeout".into()
            }
            .is_transient()
        );
        assert!(!Error::InvalidInput("x".into()).is_transient());
        assert!(!Error::FeatureNotEnabled("redis".into()).is_transient());
    }
}
