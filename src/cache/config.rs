//! Query cache configuration.
//!
//! Freshness and eviction timers are set from the `[cache]` table of `quire.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use super::keys::{CacheKey, EntityKind};

const DEFAULT_STALE_AFTER_MS: u64 = 5_000;
const DEFAULT_EVICT_AFTER_MS: u64 = 300_000;
const DEFAULT_TODO_DETAIL_STALE_AFTER_MS: u64 = 5_000;
const DEFAULT_TODO_DETAIL_EVICT_AFTER_MS: u64 = 10_000;
const DEFAULT_MAX_ENTRIES: usize = 1_000;
const DEFAULT_GC_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("stale_after ({stale_after:?}) must be shorter than evict_after ({evict_after:?})")]
pub struct PolicyError {
    pub stale_after: Duration,
    pub evict_after: Duration,
}

/// Freshness timers for one cache entry. `stale_after < evict_after` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    stale_after: Duration,
    evict_after: Duration,
}

impl QueryPolicy {
    pub fn new(stale_after: Duration, evict_after: Duration) -> Result<Self, PolicyError> {
        if stale_after >= evict_after {
            return Err(PolicyError {
                stale_after,
                evict_after,
            });
        }
        Ok(Self {
            stale_after,
            evict_after,
        })
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn evict_after(&self) -> Duration {
        self.evict_after
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window for list, feed and profile entries.
    pub stale_after_ms: u64,
    /// Lifetime of an unobserved list, feed or profile entry.
    pub evict_after_ms: u64,
    /// Freshness window for per-todo detail entries.
    pub todo_detail_stale_after_ms: u64,
    /// Lifetime of an unobserved per-todo detail entry.
    pub todo_detail_evict_after_ms: u64,
    /// Capacity of the entry map; least recently used entries go first.
    pub max_entries: usize,
    /// Interval of the background garbage sweep.
    pub gc_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            evict_after_ms: DEFAULT_EVICT_AFTER_MS,
            todo_detail_stale_after_ms: DEFAULT_TODO_DETAIL_STALE_AFTER_MS,
            todo_detail_evict_after_ms: DEFAULT_TODO_DETAIL_EVICT_AFTER_MS,
            max_entries: DEFAULT_MAX_ENTRIES,
            gc_interval_ms: DEFAULT_GC_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    /// Check that every policy this configuration can produce is well formed.
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.default_policy()?;
        self.todo_detail_policy()?;
        Ok(())
    }

    /// Policy applied to entries stored under `key`.
    ///
    /// Falls back to the built-in defaults when the configured timers are
    /// malformed; `validate` reports that case at load time.
    pub fn policy_for(&self, key: &CacheKey) -> QueryPolicy {
        let configured = match key.kind() {
            EntityKind::TodoDetail => self.todo_detail_policy(),
            EntityKind::TodoList | EntityKind::PostList | EntityKind::Profile => {
                self.default_policy()
            }
        };
        configured.unwrap_or_else(|_| match key.kind() {
            EntityKind::TodoDetail => QueryPolicy {
                stale_after: Duration::from_millis(DEFAULT_TODO_DETAIL_STALE_AFTER_MS),
                evict_after: Duration::from_millis(DEFAULT_TODO_DETAIL_EVICT_AFTER_MS),
            },
            EntityKind::TodoList | EntityKind::PostList | EntityKind::Profile => QueryPolicy {
                stale_after: Duration::from_millis(DEFAULT_STALE_AFTER_MS),
                evict_after: Duration::from_millis(DEFAULT_EVICT_AFTER_MS),
            },
        })
    }

    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms.max(1))
    }

    fn default_policy(&self) -> Result<QueryPolicy, PolicyError> {
        QueryPolicy::new(
            Duration::from_millis(self.stale_after_ms),
            Duration::from_millis(self.evict_after_ms),
        )
    }

    fn todo_detail_policy(&self) -> Result<QueryPolicy, PolicyError> {
        QueryPolicy::new(
            Duration::from_millis(self.todo_detail_stale_after_ms),
            Duration::from_millis(self.todo_detail_evict_after_ms),
        )
    }
}
