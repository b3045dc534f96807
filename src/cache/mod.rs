//! Folio cache system.
//!
//! A read-through cache over an external TTL key-value store:
//!
//! - **keys**: deterministic, namespaced key construction
//! - **store**: the injected [`CacheStore`] capability (Redis or in-memory)
//! - **read_through**: generic hit/miss/async-fill wrapper
//! - **trigger**: coarse write-path invalidation and admin operations
//!
//! Cache failures never fail a request: every read path falls back to the
//! underlying document query, so an outage costs latency, not correctness.

mod config;
pub mod keys;
mod read_through;
mod store;
mod trigger;

pub use config::{CacheConfig, default_popular_searches};
pub use read_through::read_through;
pub use store::{CacheStore, MemoryStore, RedisStore};
pub use trigger::{CacheStats, CacheTrigger};
