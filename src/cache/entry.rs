//! Cached values and their freshness stamps.

use tokio::time::Instant;

use crate::domain::entities::{PostRecord, ProfileRecord, RemoteTodo, TodoId};

use super::config::QueryPolicy;
use super::error::QueryError;
use super::keys::CacheKey;

/// Monotonic ticket ordering writes to the cache.
///
/// Every load and every seed draws a new epoch when it starts; a commit only
/// replaces an entry written under an older epoch.
pub type Epoch = u64;

/// The closed set of values the query cache holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Ordered ids of a normalized list.
    Ids(Vec<TodoId>),
    Todo(RemoteTodo),
    Posts(Vec<PostRecord>),
    Profile(ProfileRecord),
}

impl QueryValue {
    pub fn shape(&self) -> &'static str {
        match self {
            QueryValue::Ids(_) => "ids",
            QueryValue::Todo(_) => "todo",
            QueryValue::Posts(_) => "posts",
            QueryValue::Profile(_) => "profile",
        }
    }

    pub fn into_ids(self, key: &CacheKey) -> Result<Vec<TodoId>, QueryError> {
        match self {
            QueryValue::Ids(ids) => Ok(ids),
            other => Err(other.mismatch(key, "ids")),
        }
    }

    pub fn into_todo(self, key: &CacheKey) -> Result<RemoteTodo, QueryError> {
        match self {
            QueryValue::Todo(todo) => Ok(todo),
            other => Err(other.mismatch(key, "todo")),
        }
    }

    pub fn into_posts(self, key: &CacheKey) -> Result<Vec<PostRecord>, QueryError> {
        match self {
            QueryValue::Posts(posts) => Ok(posts),
            other => Err(other.mismatch(key, "posts")),
        }
    }

    pub fn into_profile(self, key: &CacheKey) -> Result<ProfileRecord, QueryError> {
        match self {
            QueryValue::Profile(profile) => Ok(profile),
            other => Err(other.mismatch(key, "profile")),
        }
    }

    fn mismatch(&self, key: &CacheKey, expected: &'static str) -> QueryError {
        QueryError::UnexpectedValue {
            key: key.to_string(),
            expected,
            found: self.shape(),
        }
    }
}

/// One cache slot: a value plus the instants that govern its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: QueryValue,
    pub fetched_at: Instant,
    pub stale_at: Instant,
    pub evict_at: Instant,
    pub epoch: Epoch,
    invalidated: bool,
}

impl CacheEntry {
    pub(crate) fn new(value: QueryValue, epoch: Epoch, policy: QueryPolicy, now: Instant) -> Self {
        Self {
            value,
            fetched_at: now,
            stale_at: now + policy.stale_after(),
            evict_at: now + policy.evict_after(),
            epoch,
            invalidated: false,
        }
    }

    /// True while the entry may be served without a reload.
    pub fn is_fresh(&self, now: Instant) -> bool {
        !self.invalidated && now < self.stale_at
    }

    /// True once the entry may be dropped, provided nobody observes it.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.evict_at
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub(crate) fn invalidate(&mut self) {
        self.invalidated = true;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn freshness_follows_policy() {
        let now = Instant::now();
        let policy = QueryPolicy::new(Duration::from_secs(5), Duration::from_secs(10)).unwrap();
        let mut entry = CacheEntry::new(QueryValue::Ids(vec![1]), 0, policy, now);

        assert!(entry.is_fresh(now + Duration::from_secs(4)));
        assert!(!entry.is_fresh(now + Duration::from_secs(5)));
        assert!(!entry.is_expired(now + Duration::from_secs(9)));
        assert!(entry.is_expired(now + Duration::from_secs(10)));

        entry.invalidate();
        assert!(!entry.is_fresh(now));
        assert!(entry.is_invalidated());
    }

    #[test]
    fn typed_accessors_report_shape_mismatch() {
        let key = CacheKey::TodoList;
        let err = QueryValue::Posts(Vec::new())
            .into_ids(&key)
            .expect_err("posts are not ids");
        assert_eq!(
            err,
            QueryError::UnexpectedValue {
                key: "todo-list".to_string(),
                expected: "ids",
                found: "posts",
            }
        );
        assert_eq!(
            QueryValue::Ids(vec![3, 1]).into_ids(&key),
            Ok(vec![3, 1])
        );
    }
}
