//! Window identifiers and drain snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// An identifier submitted by a caller.
///
/// No uniqueness is assumed on arrival; uniqueness is established only
/// within a window.
pub type Identifier = i64;

/// Sequence number of a dedup window.
///
/// The first window opened by a process is [`WindowId::FIRST`]; each drain
/// opens the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(u64);

impl WindowId {
    /// The window that is open when the process starts.
    pub const FIRST: Self = Self(1);

    /// Creates a window ID from its sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the sequence number.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the ID of the window that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of draining a window.
///
/// Carries values only; the identifier set itself is discarded by the drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainedWindow {
    /// The window that was closed.
    pub window_id: WindowId,
    /// Number of distinct identifiers seen in the window.
    pub count: u64,
    /// When the window was opened.
    pub opened_at: DateTime<Utc>,
    /// When the window was swapped out.
    pub closed_at: DateTime<Utc>,
}

impl DrainedWindow {
    /// Builds the emission snapshot for this window.
    ///
    /// `interval` is the configured window length; it drives the wording of
    /// the emitted message, not the measured open time.
    #[must_use]
    pub fn to_emitted(&self, interval: Duration) -> EmittedCount {
        EmittedCount::new(self.window_id, self.count, interval)
    }
}

/// Immutable snapshot handed to an emitter, once per window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedCount {
    /// The window the count belongs to.
    pub window_id: WindowId,
    /// Number of distinct identifiers.
    pub count: u64,
    /// Configured window length in milliseconds.
    pub window_ms: u64,
    /// When the snapshot was produced.
    pub emitted_at: DateTime<Utc>,
}

impl EmittedCount {
    /// Creates a snapshot stamped with the current time.
    #[must_use]
    pub fn new(window_id: WindowId, count: u64, interval: Duration) -> Self {
        Self {
            window_id,
            count,
            window_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            emitted_at: Utc::now(),
        }
    }

    /// Human-readable summary published to the topic.
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use tally::models::{EmittedCount, WindowId};
    ///
    /// let emitted = EmittedCount::new(WindowId::FIRST, 42, Duration::from_secs(60));
    /// assert_eq!(emitted.message(), "Unique count in the last minute: 42");
    /// ```
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Unique count in the last {}: {}",
            describe_window(self.window_ms),
            self.count
        )
    }
}

fn describe_window(window_ms: u64) -> String {
    match window_ms {
        60_000 => "minute".to_string(),
        1_000 => "second".to_string(),
        ms if ms % 60_000 == 0 => format!("{} minutes", ms / 60_000),
        ms if ms % 1_000 == 0 => format!("{} seconds", ms / 1_000),
        ms => format!("{ms} ms"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_window_id_sequence() {
        assert_eq!(WindowId::FIRST.as_u64(), 1);
        assert_eq!(WindowId::FIRST.next(), WindowId::new(2));
        assert!(WindowId::new(3) > WindowId::new(2));
        assert_eq!(WindowId::new(7).to_string(), "7");
    }

    #[test_case(60_000, 0, "Unique count in the last minute: 0" ; "one minute empty")]
    #[test_case(60_000, 2, "Unique count in the last minute: 2" ; "one minute")]
    #[test_case(1_000, 5, "Unique count in the last second: 5" ; "one second")]
    #[test_case(30_000, 9, "Unique count in the last 30 seconds: 9" ; "thirty seconds")]
    #[test_case(300_000, 1, "Unique count in the last 5 minutes: 1" ; "five minutes")]
    #[test_case(250, 3, "Unique count in the last 250 ms: 3" ; "sub second")]
    fn test_message(window_ms: u64, count: u64, expected: &str) {
        let emitted = EmittedCount::new(
            WindowId::FIRST,
            count,
            Duration::from_millis(window_ms),
        );
        assert_eq!(emitted.message(), expected);
    }

    #[test]
    fn test_drained_to_emitted() {
        let now = Utc::now();
        let drained = DrainedWindow {
            window_id: WindowId::new(4),
            count: 11,
            opened_at: now,
            closed_at: now,
        };

        let emitted = drained.to_emitted(Duration::from_secs(60));
        assert_eq!(emitted.window_id, WindowId::new(4));
        assert_eq!(emitted.count, 11);
        assert_eq!(emitted.window_ms, 60_000);
        assert!(emitted.emitted_at >= now);
    }

    #[test]
    fn test_emitted_serializes_window_id_transparently() {
        let emitted = EmittedCount::new(WindowId::new(9), 3, Duration::from_secs(60));
        let json = serde_json::to_value(&emitted).unwrap();
        assert_eq!(json["window_id"], 9);
        assert_eq!(json["count"], 3);
        assert_eq!(json["window_ms"], 60_000);
    }
}
