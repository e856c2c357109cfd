//! Downstream emission of window counts.
//!
//! An [`Emitter`] publishes one [`EmittedCount`] per window to a named topic.
//! Publishing is fire-and-forget: a failed publish is reported to the caller
//! as `Error::Publish` and never retried, since the next window's count
//! supersedes it.
//!
//! | Emitter | Transport | Feature |
//! |---------|-----------|---------|
//! | [`LogEmitter`] | `tracing` log line | - |
//! | [`BroadcastEmitter`] | tokio broadcast channel | - |
//! | [`WebhookEmitter`] | HTTP POST of a JSON payload | - |
//! | [`RedisEmitter`] | Redis `PUBLISH` | `redis` |

mod broadcast;
mod log;
mod redis;
mod webhook;

pub use broadcast::BroadcastEmitter;
pub use self::log::LogEmitter;
pub use self::redis::RedisEmitter;
pub use webhook::{WebhookEmitter, WebhookPayload};

use crate::Result;
use crate::models::EmittedCount;

/// Publishes window counts to a topic.
pub trait Emitter: Send + Sync {
    /// Publishes `count` to the topic.
    ///
    /// # Errors
    ///
    /// Returns `Error::Publish` if the transport could not deliver.
    fn publish(&self, count: &EmittedCount) -> Result<()>;

    /// The destination topic.
    fn topic(&self) -> &str;

    /// Short transport name used in logs and metric labels.
    fn name(&self) -> &'static str;
}
