//! Window scheduler integration tests.
//!
//! Runs the scheduler loop on a paused tokio clock:
//! - One count per interval, the first one a full interval after start
//! - A failed publish does not stop the next tick
//! - Shutdown stops the loop before the next tick

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tally::emitter::{BroadcastEmitter, Emitter};
use tally::models::{EmittedCount, WindowId};
use tally::services::{DedupWindow, WindowScheduler, shutdown_channel};
use tally::storage::MemoryWindowStore;
use tally::{Error, Result};
use tokio::sync::mpsc;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

fn memory_window() -> Arc<DedupWindow> {
    Arc::new(DedupWindow::new(Arc::new(MemoryWindowStore::new())))
}

/// Fails the first publish, then reports every attempt on a channel.
struct FlakyEmitter {
    attempts: AtomicUsize,
    sender: mpsc::UnboundedSender<(usize, std::result::Result<EmittedCount, String>)>,
}

impl Emitter for FlakyEmitter {
    fn publish(&self, count: &EmittedCount) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == 1 {
            let _ = self.sender.send((attempt, Err("broker down".to_string())));
            return Err(Error::Publish {
                topic: self.topic().to_string(),
                cause: "broker down".to_string(),
            });
        }
        let _ = self.sender.send((attempt, Ok(count.clone())));
        Ok(())
    }

    fn topic(&self) -> &str {
        "unique-counts"
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::test(start_paused = true)]
async fn test_one_count_per_interval() {
    let window = memory_window();
    let emitter = Arc::new(BroadcastEmitter::new("unique-counts"));
    let mut counts = emitter.subscribe();
    let scheduler = Arc::new(WindowScheduler::new(Arc::clone(&window), emitter, WINDOW));

    let (trigger, shutdown) = shutdown_channel();
    let started = Instant::now();
    let handle = scheduler.spawn(shutdown);

    for id in [1, 2, 1] {
        window.add(id).unwrap();
    }

    let first = counts.recv().await.unwrap();
    assert_eq!(first.window_id, WindowId::FIRST);
    assert_eq!(first.count, 2);
    assert_eq!(first.message(), "Unique count in the last minute: 2");
    assert!(started.elapsed() >= WINDOW);
    assert!(started.elapsed() < WINDOW * 2);

    window.add(7).unwrap();
    let second = counts.recv().await.unwrap();
    assert_eq!(second.window_id, WindowId::new(2));
    assert_eq!(second.count, 1);
    assert!(started.elapsed() >= WINDOW * 2);

    let third = counts.recv().await.unwrap();
    assert_eq!(third.count, 0);

    trigger.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_then_next_tick_fires() {
    let window = memory_window();
    let (sender, mut attempts) = mpsc::unbounded_channel();
    let emitter = Arc::new(FlakyEmitter {
        attempts: AtomicUsize::new(0),
        sender,
    });
    let scheduler = Arc::new(WindowScheduler::new(Arc::clone(&window), emitter, WINDOW));
    let (trigger, shutdown) = shutdown_channel();
    let handle = scheduler.spawn(shutdown);

    window.add(10).unwrap();
    let (attempt, result) = attempts.recv().await.unwrap();
    assert_eq!(attempt, 1);
    assert_eq!(result.unwrap_err(), "broker down");

    window.add(20).unwrap();
    window.add(30).unwrap();
    let (attempt, result) = attempts.recv().await.unwrap();
    assert_eq!(attempt, 2);
    let emitted = result.unwrap();
    assert_eq!(emitted.window_id, WindowId::new(2));
    assert_eq!(emitted.count, 2);

    trigger.trigger();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_before_first_tick_publishes_nothing() {
    let window = memory_window();
    let emitter = Arc::new(BroadcastEmitter::new("unique-counts"));
    let mut counts = emitter.subscribe();
    let scheduler = Arc::new(WindowScheduler::new(Arc::clone(&window), emitter, WINDOW));
    let (trigger, shutdown) = shutdown_channel();
    let handle = scheduler.spawn(shutdown);

    window.add(1).unwrap();
    tokio::time::sleep(WINDOW / 2).await;
    trigger.trigger();
    handle.await.unwrap();

    assert!(counts.try_recv().is_err());
    assert_eq!(window.current_window_id(), WindowId::FIRST);
    assert_eq!(window.len().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_trigger_stops_scheduler() {
    let window = memory_window();
    let emitter = Arc::new(BroadcastEmitter::new("unique-counts"));
    let scheduler = Arc::new(WindowScheduler::new(window, emitter, WINDOW));
    let (trigger, shutdown) = shutdown_channel();
    let handle = scheduler.spawn(shutdown);

    drop(trigger);
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}
