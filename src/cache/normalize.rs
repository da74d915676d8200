//! List/detail normalization.
//!
//! A collection fetch stores only the ordered ids under the list key and seeds
//! every item under its own detail key, so list rows and detail views read the
//! same cached record.

use std::future::Future;

use crate::application::gateway::GatewayError;
use crate::domain::entities::{RemoteTodo, TodoId};

use super::entry::QueryValue;
use super::error::QueryError;
use super::keys::CacheKey;
use super::store::{Loaded, QueryCache};

/// A record that can be split into a list of ids plus per-id details.
pub trait Normalize: Sized + Send + 'static {
    fn id(&self) -> TodoId;

    fn list_key() -> CacheKey;

    fn detail_key(id: TodoId) -> CacheKey;

    fn into_value(self) -> QueryValue;

    fn from_value(value: QueryValue, key: &CacheKey) -> Result<Self, QueryError>;
}

impl Normalize for RemoteTodo {
    fn id(&self) -> TodoId {
        self.id
    }

    fn list_key() -> CacheKey {
        CacheKey::TodoList
    }

    fn detail_key(id: TodoId) -> CacheKey {
        CacheKey::TodoDetail(id)
    }

    fn into_value(self) -> QueryValue {
        QueryValue::Todo(self)
    }

    fn from_value(value: QueryValue, key: &CacheKey) -> Result<Self, QueryError> {
        value.into_todo(key)
    }
}

/// Fetch the collection through the cache and return its ids in server order.
///
/// On a load, the id list and every item's detail entry are committed together
/// with the load's epoch: a detail written after the load started is kept, and
/// a load detached by invalidation writes nothing. An empty collection stores
/// an empty id list and touches no detail key.
pub async fn fetch_list<T, F, Fut>(cache: &QueryCache, loader: F) -> Result<Vec<TodoId>, QueryError>
where
    T: Normalize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, GatewayError>> + Send + 'static,
{
    let key = T::list_key();
    let value = cache
        .fetch_loaded(key.clone(), move || {
            let pending = loader();
            async move { pending.await.map(split_items) }
        })
        .await?;
    value.into_ids(&key)
}

fn split_items<T: Normalize>(items: Vec<T>) -> Loaded {
    let mut ids = Vec::with_capacity(items.len());
    let mut related = Vec::with_capacity(items.len());
    for item in items {
        let id = item.id();
        ids.push(id);
        related.push((T::detail_key(id), item.into_value()));
    }
    Loaded {
        value: QueryValue::Ids(ids),
        related,
    }
}

/// Seed each item under its detail key and return the ids in input order.
///
/// For rows obtained outside a cache load, such as a mutation response.
pub fn seed_items<T: Normalize>(cache: &QueryCache, items: Vec<T>) -> Vec<TodoId> {
    items
        .into_iter()
        .map(|item| {
            let id = item.id();
            cache.seed(T::detail_key(id), item.into_value());
            id
        })
        .collect()
}

/// Read one item from its detail key, loading it with `loader` on a miss.
pub async fn fetch_detail<T, F, Fut>(
    cache: &QueryCache,
    id: TodoId,
    loader: F,
) -> Result<T, QueryError>
where
    T: Normalize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>> + Send + 'static,
{
    let key = T::detail_key(id);
    let value = cache
        .fetch(key.clone(), move || {
            let pending = loader();
            async move { pending.await.map(T::into_value) }
        })
        .await?;
    T::from_value(value, &key)
}
