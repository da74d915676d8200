//! Query cache.
//!
//! A process-wide keyed cache of asynchronous results:
//!
//! - **Freshness**: every entry carries a stale timer (serve without loading
//!   until it elapses) and an evict timer (drop once it elapses and nobody
//!   observes the key).
//! - **Coalescing**: concurrent fetches of one key share a single load.
//! - **Ordering**: every load and seed draws an epoch; older results never
//!   replace newer ones.
//! - **Normalization**: collections are stored as id lists with every item
//!   seeded under its own detail key (see [`normalize`]).
//!
//! ## Configuration
//!
//! Timers and capacity are read from the `[cache]` table:
//!
//! ```toml
//! [cache]
//! stale_after_ms = 5000
//! evict_after_ms = 300000
//! max_entries = 1000
//! # ... see config.rs for all options
//! ```

mod config;
mod entry;
mod error;
mod keys;
mod lock;
pub mod normalize;
mod observer;
mod store;

pub use config::{CacheConfig, PolicyError, QueryPolicy};
pub use entry::{CacheEntry, Epoch, QueryValue};
pub use error::QueryError;
pub use keys::{CacheKey, EntityId, EntityKind};
pub use observer::QueryObserver;
pub use store::QueryCache;
