//! Property-based tests for window counting.
//!
//! Uses proptest to verify invariants across random inputs:
//! - A drained count equals the number of distinct identifiers added
//! - Identifiers are attributed to exactly one window across many drains
//! - The emitted message always ends with the count

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tally::models::{EmittedCount, WindowId};
use tally::services::DedupWindow;
use tally::storage::MemoryWindowStore;

fn memory_window() -> DedupWindow {
    DedupWindow::new(Arc::new(MemoryWindowStore::new()))
}

proptest! {
    /// Property: count equals the number of distinct identifiers added.
    #[test]
    fn prop_count_equals_distinct(ids in prop::collection::vec(any::<i64>(), 0..500)) {
        let window = memory_window();
        for id in &ids {
            window.add(*id).unwrap();
        }

        let distinct: HashSet<i64> = ids.iter().copied().collect();
        prop_assert_eq!(window.drain().unwrap().count, distinct.len() as u64);
        prop_assert_eq!(window.drain().unwrap().count, 0);
    }

    /// Property: with drains interleaved at arbitrary points, each window's
    /// count equals the distinct identifiers added since the previous drain.
    #[test]
    fn prop_interleaved_drains_partition_identifiers(
        batches in prop::collection::vec(prop::collection::vec(-50i64..50, 0..40), 1..10)
    ) {
        let window = memory_window();

        for (seq, batch) in batches.iter().enumerate() {
            for id in batch {
                window.add(*id).unwrap();
            }
            let expected: HashSet<i64> = batch.iter().copied().collect();
            let drained = window.drain().unwrap();

            prop_assert_eq!(drained.count, expected.len() as u64);
            prop_assert_eq!(drained.window_id, WindowId::new(seq as u64 + 1));
        }
    }

    /// Property: the message always reports the exact count.
    #[test]
    fn prop_message_reports_count(count in any::<u64>(), window_ms in 1u64..3_600_000) {
        let emitted = EmittedCount::new(WindowId::FIRST, count, Duration::from_millis(window_ms));
        let message = emitted.message();
        prop_assert!(message.starts_with("Unique count in the last "));
        let expected_suffix = format!(": {count}");
        prop_assert!(message.ends_with(&expected_suffix));
    }
}
