//! Redis pub/sub emitter.
//!
//! Publishes the count message with `PUBLISH <topic> <message>`. Redis
//! pub/sub has no persistence, so a count published with no subscriber
//! connected is lost, which matches the fire-and-forget contract.

#[cfg(feature = "redis")]
mod implementation {
    use crate::emitter::Emitter;
    use crate::models::EmittedCount;
    use crate::storage::RedisPool;
    use crate::{Error, Result};
    use redis::Commands;
    use std::time::Duration;

    /// Emitter publishing to a Redis channel named after the topic.
    pub struct RedisEmitter {
        pool: RedisPool,
        topic: String,
    }

    impl RedisEmitter {
        /// Creates an emitter for `topic` on the server at `connection_url`.
        ///
        /// # Errors
        ///
        /// Returns an error if the URL is invalid.
        pub fn new(connection_url: &str, topic: impl Into<String>, timeout: Duration) -> Result<Self> {
            Ok(Self {
                pool: RedisPool::new(connection_url, timeout)?,
                topic: topic.into(),
            })
        }
    }

    impl Emitter for RedisEmitter {
        fn publish(&self, count: &EmittedCount) -> Result<()> {
            let message = count.message();
            let receivers: u64 = self
                .pool
                .run("redis_publish", |conn| conn.publish(&self.topic, &message))
                .map_err(|e| Error::Publish {
                    topic: self.topic.clone(),
                    cause: e.to_string(),
                })?;
            tracing::debug!(topic = %self.topic, receivers, "Published count to Redis");
            Ok(())
        }

        fn topic(&self) -> &str {
            &self.topic
        }

        fn name(&self) -> &'static str {
            "redis"
        }
    }
}

#[cfg(feature = "redis")]
pub use implementation::RedisEmitter;

#[cfg(not(feature = "redis"))]
mod stub {
    use crate::emitter::Emitter;
    use crate::models::EmittedCount;
    use crate::{Error, Result};
    use std::time::Duration;

    /// Stub Redis emitter when the feature is not enabled.
    pub struct RedisEmitter;

    impl RedisEmitter {
        /// Creates a Redis emitter (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(
            _connection_url: &str,
            _topic: impl Into<String>,
            _timeout: Duration,
        ) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    impl Emitter for RedisEmitter {
        fn publish(&self, _count: &EmittedCount) -> Result<()> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn topic(&self) -> &str {
            ""
        }

        fn name(&self) -> &'static str {
            "redis"
        }
    }
}

#[cfg(not(feature = "redis"))]
pub use stub::RedisEmitter;
