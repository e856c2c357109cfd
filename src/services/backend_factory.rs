//! Backend factory for the window store and emitter.
//!
//! ```text
//! BackendFactory
//!   ├── create_window_store() → Arc<dyn WindowStore>
//!   └── create_emitter()      → Arc<dyn Emitter>
//! ```
//!
//! Unlike optional components, both backends are required: a configured
//! backend that cannot be built is a startup error, never a silent fallback
//! to another backend.

use crate::config::{EmitterBackend, StoreBackend, TallyConfig};
use crate::emitter::{BroadcastEmitter, Emitter, LogEmitter, RedisEmitter, WebhookEmitter};
use crate::storage::{MemoryWindowStore, RedisWindowStore, WindowStore};
use crate::{Error, Result};
use std::sync::Arc;

/// The two backends a running service needs.
pub struct BackendSet {
    /// Holds the open window.
    pub store: Arc<dyn WindowStore>,
    /// Publishes drained counts.
    pub emitter: Arc<dyn Emitter>,
}

/// Factory for creating backends from configuration.
pub struct BackendFactory;

impl BackendFactory {
    /// Creates the store and emitter named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if either backend cannot be created.
    pub fn create_all(config: &TallyConfig) -> Result<BackendSet> {
        Ok(BackendSet {
            store: Self::create_window_store(config)?,
            emitter: Self::create_emitter(config)?,
        })
    }

    /// Creates the configured window store.
    ///
    /// # Errors
    ///
    /// Returns `Error::FeatureNotEnabled` for Redis without the `redis`
    /// feature, or an error if the Redis URL is invalid.
    pub fn create_window_store(config: &TallyConfig) -> Result<Arc<dyn WindowStore>> {
        let store = &config.store;
        match store.backend {
            StoreBackend::Memory => {
                tracing::debug!("Created in-memory window store");
                Ok(Arc::new(MemoryWindowStore::new()))
            },
            StoreBackend::Redis => {
                let backend = RedisWindowStore::new(&store.redis_url, store.key.clone(), store.timeout)
                    .inspect_err(|e| {
                        tracing::error!(error = %e, "Failed to create Redis window store");
                    })?;
                tracing::debug!(key = %store.key, "Created Redis window store");
                Ok(Arc::new(backend))
            },
        }
    }

    /// Creates the configured emitter.
    ///
    /// # Errors
    ///
    /// Returns an error if the webhook URL is missing or the client cannot be
    /// built, or if the Redis emitter is unavailable.
    pub fn create_emitter(config: &TallyConfig) -> Result<Arc<dyn Emitter>> {
        let emitter = &config.emitter;
        let topic = emitter.topic.clone();

        let created: Arc<dyn Emitter> = match emitter.backend {
            EmitterBackend::Log => Arc::new(LogEmitter::new(topic)),
            EmitterBackend::Broadcast => Arc::new(BroadcastEmitter::new(topic)),
            EmitterBackend::Webhook => {
                let url = emitter.webhook_url.clone().ok_or_else(|| {
                    Error::InvalidInput("webhook emitter requires emitter.webhook_url".to_string())
                })?;
                let mut webhook = WebhookEmitter::new(url, topic, emitter.timeout)?;
                if let Some(token) = &emitter.webhook_token {
                    webhook = webhook.with_bearer_token(token.clone());
                }
                Arc::new(webhook)
            },
            EmitterBackend::Redis => Arc::new(RedisEmitter::new(
                &config.store.redis_url,
                topic,
                emitter.timeout,
            )?),
        };

        tracing::debug!(emitter = created.name(), topic = %created.topic(), "Created emitter");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_memory_and_log() {
        let backends = BackendFactory::create_all(&TallyConfig::default()).unwrap();
        assert_eq!(backends.store.backend_name(), "memory");
        assert_eq!(backends.emitter.name(), "log");
        assert_eq!(backends.emitter.topic(), "unique-counts");
    }

    #[test]
    fn test_webhook_without_url_rejected() {
        let mut config = TallyConfig::default();
        config.emitter.backend = EmitterBackend::Webhook;
        assert!(matches!(
            BackendFactory::create_emitter(&config),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_webhook_emitter_built() {
        let mut config = TallyConfig::default();
        config.emitter.backend = EmitterBackend::Webhook;
        config.emitter.webhook_url = Some("http://127.0.0.1:9/counts".to_string());

        let emitter = BackendFactory::create_emitter(&config).unwrap();
        assert_eq!(emitter.name(), "webhook");
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn test_redis_requires_feature() {
        let mut config = TallyConfig::default();
        config.store.backend = StoreBackend::Redis;
        assert!(matches!(
            BackendFactory::create_window_store(&config),
            Err(Error::FeatureNotEnabled(_))
        ));

        config.emitter.backend = EmitterBackend::Redis;
        assert!(matches!(
            BackendFactory::create_emitter(&config),
            Err(Error::FeatureNotEnabled(_))
        ));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn test_redis_store_created_lazily() {
        let mut config = TallyConfig::default();
        config.store.backend = StoreBackend::Redis;
        config.store.redis_url = "redis://127.0.0.1:1".to_string();

        let store = BackendFactory::create_window_store(&config).unwrap();
        assert_eq!(store.backend_name(), "redis");
    }
}
