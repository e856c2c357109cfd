//! Storage layer abstraction.
//!
//! The storage layer owns the identifier set of the open window. Two
//! backends are provided:
//! - **Memory**: a mutex-guarded `HashSet`, the default
//! - **Redis**: a Redis set shared between processes (feature `redis`)

// Allow significant_drop_tightening - guards are scoped explicitly where it matters.
#![allow(clippy::significant_drop_tightening)]

pub mod memory;
pub mod redis;
pub mod traits;

pub use memory::{MemoryWindowStore, SwapHook};
pub use self::redis::RedisWindowStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisPool;
pub use traits::WindowStore;
