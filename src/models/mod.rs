//! Data models for tally.
//!
//! Value types that cross component boundaries: window identifiers, drain
//! results, emitted counts and ingestion outcomes.

mod ingest;
mod window;

pub use ingest::AcceptOutcome;
pub use window::{DrainedWindow, EmittedCount, Identifier, WindowId};
