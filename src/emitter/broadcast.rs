//! In-process broadcast emitter.

use super::Emitter;
use crate::Result;
use crate::models::EmittedCount;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 64;

/// Publishes counts on a tokio broadcast channel.
///
/// Publishing with no subscribers is not a failure; the count is simply
/// dropped. Slow subscribers lag and miss the oldest counts.
#[derive(Clone)]
pub struct BroadcastEmitter {
    topic: String,
    sender: broadcast::Sender<EmittedCount>,
}

impl BroadcastEmitter {
    /// Creates an emitter with the default buffer capacity.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_capacity(topic, DEFAULT_CAPACITY)
    }

    /// Creates an emitter with the given buffer capacity.
    #[must_use]
    pub fn with_capacity(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            sender,
        }
    }

    /// Subscribes to counts published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EmittedCount> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Emitter for BroadcastEmitter {
    fn publish(&self, count: &EmittedCount) -> Result<()> {
        match self.sender.send(count.clone()) {
            Ok(receivers) => {
                tracing::debug!(topic = %self.topic, receivers, "Broadcast count");
            },
            Err(_) => {
                tracing::debug!(topic = %self.topic, "No subscribers for count");
            },
        }
        Ok(())
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn name(&self) -> &'static str {
        "broadcast"
    }
}
