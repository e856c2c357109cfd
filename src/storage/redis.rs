//! Redis-backed window store.
//!
//! Keeps the open window in a Redis set so several tally processes can share
//! one dedup window.
//!
//! # Atomic Swap
//!
//! The drain runs `SCARD key` and `DEL key` inside a single `MULTI`/`EXEC`
//! transaction. Redis executes a transaction without interleaving commands
//! from other clients, so an `SADD` lands either before the transaction
//! (counted, then deleted with the closed window) or after it (recreating the
//! key as the new window). The next `SADD` after the `DEL` implicitly opens
//! the fresh window.
//!
//! # Connection Handling
//!
//! Connections are pooled in a `Mutex<Vec<Connection>>` of idle connections.
//! A connection whose command failed is dropped instead of returned, so a
//! broken socket is never handed out twice.
//!
//! # Command Timeout
//!
//! Every connection gets read and write timeouts (250 ms by default) so an
//! unresponsive server cannot stall the request path.

#[cfg(feature = "redis")]
mod implementation {
    use crate::models::Identifier;
    use crate::storage::traits::WindowStore;
    use crate::{Error, Result};
    use redis::{Client, Commands, Connection, RedisResult};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Maximum idle connections kept per pool.
    const MAX_IDLE_CONNECTIONS: usize = 16;

    /// Small blocking connection pool shared by the Redis store and emitter.
    pub struct RedisPool {
        client: Client,
        idle: Mutex<Vec<Connection>>,
        timeout: Duration,
    }

    impl RedisPool {
        /// Creates a pool for the given URL.
        ///
        /// No connection is opened until the first command.
        ///
        /// # Errors
        ///
        /// Returns an error if the URL cannot be parsed.
        pub fn new(connection_url: &str, timeout: Duration) -> Result<Self> {
            let client = Client::open(connection_url).map_err(|e| Error::OperationFailed {
                operation: "redis_open".to_string(),
                cause: e.to_string(),
            })?;

            Ok(Self {
                client,
                idle: Mutex::new(Vec::new()),
                timeout,
            })
        }

        /// Runs `f` on a pooled connection.
        ///
        /// # Errors
        ///
        /// Returns `Error::TransientStore` if no connection could be made or
        /// the command failed.
        pub fn run<T>(
            &self,
            operation: &str,
            f: impl FnOnce(&mut Connection) -> RedisResult<T>,
        ) -> Result<T> {
            let mut conn = self.checkout(operation)?;
            match f(&mut conn) {
                Ok(value) => {
                    self.checkin(conn);
                    Ok(value)
                },
                Err(e) => Err(Error::TransientStore {
                    operation: operation.to_string(),
                    cause: e.to_string(),
                }),
            }
        }

        fn checkout(&self, operation: &str) -> Result<Connection> {
            if let Some(conn) = self.idle.lock().ok().and_then(|mut idle| idle.pop()) {
                return Ok(conn);
            }

            let transient = |cause: String| Error::TransientStore {
                operation: operation.to_string(),
                cause,
            };

            let conn = self
                .client
                .get_connection_with_timeout(self.timeout)
                .map_err(|e| transient(e.to_string()))?;
            conn.set_read_timeout(Some(self.timeout))
                .map_err(|e| transient(e.to_string()))?;
            conn.set_write_timeout(Some(self.timeout))
                .map_err(|e| transient(e.to_string()))?;

            Ok(conn)
        }

        fn checkin(&self, conn: Connection) {
            if let Ok(mut idle) = self.idle.lock() {
                if idle.len() < MAX_IDLE_CONNECTIONS {
                    idle.push(conn);
                }
            }
        }
    }

    /// Window store keeping the open window in a Redis set.
    pub struct RedisWindowStore {
        pool: RedisPool,
        key: String,
    }

    impl RedisWindowStore {
        /// Default Redis key for the open window.
        pub const DEFAULT_KEY: &'static str = "tally:unique_ids";

        /// Creates a store for `key` on the server at `connection_url`.
        ///
        /// # Errors
        ///
        /// Returns an error if the URL is invalid.
        pub fn new(connection_url: &str, key: impl Into<String>, timeout: Duration) -> Result<Self> {
            Ok(Self {
                pool: RedisPool::new(connection_url, timeout)?,
                key: key.into(),
            })
        }

        /// Returns the Redis key holding the open window.
        #[must_use]
        pub fn key(&self) -> &str {
            &self.key
        }
    }

    impl WindowStore for RedisWindowStore {
        fn add(&self, id: Identifier) -> Result<bool> {
            let added: u64 = self
                .pool
                .run("redis_sadd", |conn| conn.sadd(&self.key, id))?;
            Ok(added > 0)
        }

        fn cardinality(&self) -> Result<u64> {
            self.pool.run("redis_scard", |conn| conn.scard(&self.key))
        }

        fn swap(&self) -> Result<u64> {
            let (count, _deleted): (u64, u64) = self.pool.run("redis_swap", |conn| {
                redis::pipe()
                    .atomic()
                    .scard(&self.key)
                    .del(&self.key)
                    .query(conn)
            })?;
            Ok(count)
        }

        fn backend_name(&self) -> &'static str {
            "redis"
        }
    }
}

#[cfg(feature = "redis")]
pub use implementation::{RedisPool, RedisWindowStore};

#[cfg(not(feature = "redis"))]
mod stub {
    use crate::models::Identifier;
    use crate::storage::traits::WindowStore;
    use crate::{Error, Result};
    use std::time::Duration;

    /// Stub Redis store when the feature is not enabled.
    pub struct RedisWindowStore;

    impl RedisWindowStore {
        /// Default Redis key for the open window.
        pub const DEFAULT_KEY: &'static str = "tally:unique_ids";

        /// Creates a Redis store (stub).
        ///
        /// # Errors
        ///
        /// Always returns an error because the feature is not enabled.
        pub fn new(
            _connection_url: &str,
            _key: impl Into<String>,
            _timeout: Duration,
        ) -> Result<Self> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }
    }

    impl WindowStore for RedisWindowStore {
        fn add(&self, _id: Identifier) -> Result<bool> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn cardinality(&self) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn swap(&self) -> Result<u64> {
            Err(Error::FeatureNotEnabled("redis".to_string()))
        }

        fn backend_name(&self) -> &'static str {
            "redis"
        }
    }
}

#[cfg(not(feature = "redis"))]
pub use stub::RedisWindowStore;
