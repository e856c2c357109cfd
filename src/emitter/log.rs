//! Log-only emitter.

use super::Emitter;
use crate::Result;
use crate::models::EmittedCount;

/// Writes each count to the log at info level.
///
/// The default emitter; useful when the log pipeline is the consumer.
pub struct LogEmitter {
    topic: String,
}

impl LogEmitter {
    /// Creates a log emitter for `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }
}

impl Emitter for LogEmitter {
    fn publish(&self, count: &EmittedCount) -> Result<()> {
        tracing::info!(
            topic = %self.topic,
            window_id = %count.window_id,
            count = count.count,
            "{}",
            count.message()
        );
        Ok(())
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
