//! Remote todo queries backed by the query cache.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::application::gateway::{CreateTodoParams, TodosGateway, UpdateTodoParams};
use crate::cache::normalize::{fetch_detail, fetch_list};
use crate::cache::{CacheKey, QueryCache, QueryError, QueryValue};
use crate::domain::entities::{RemoteTodo, TodoId};

#[derive(Clone)]
pub struct TodoQueries {
    cache: QueryCache,
    gateway: Arc<dyn TodosGateway>,
}

impl TodoQueries {
    pub fn new(cache: QueryCache, gateway: Arc<dyn TodosGateway>) -> Self {
        Self { cache, gateway }
    }

    /// Ids of all remote todos in server order; every row is seeded under its
    /// detail key.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<TodoId>, QueryError> {
        let gateway = Arc::clone(&self.gateway);
        fetch_list(&self.cache, move || async move { gateway.fetch_all().await }).await
    }

    /// One todo, served from the detail key and loaded on a miss.
    #[instrument(skip(self))]
    pub async fn detail(&self, id: TodoId) -> Result<RemoteTodo, QueryError> {
        let gateway = Arc::clone(&self.gateway);
        fetch_detail(&self.cache, id, move || async move { gateway.fetch_by_id(id).await }).await
    }

    /// The list resolved into rows through the detail keys.
    pub async fn items(&self) -> Result<Vec<RemoteTodo>, QueryError> {
        let ids = self.list().await?;
        try_join_all(ids.into_iter().map(|id| self.detail(id))).await
    }

    #[instrument(skip(self))]
    pub async fn create(&self, title: &str) -> Result<RemoteTodo, QueryError> {
        let created = self
            .gateway
            .create(CreateTodoParams {
                title: title.trim().to_string(),
            })
            .await?;
        self.cache
            .seed(CacheKey::TodoDetail(created.id), QueryValue::Todo(created.clone()));
        self.cache.invalidate(&CacheKey::TodoList);
        debug!(todo_id = created.id, "created remote todo");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn set_completed(&self, id: TodoId, completed: bool) -> Result<RemoteTodo, QueryError> {
        let updated = self
            .gateway
            .update(
                id,
                UpdateTodoParams {
                    completed: Some(completed),
                    ..Default::default()
                },
            )
            .await?;
        self.cache
            .seed(CacheKey::TodoDetail(id), QueryValue::Todo(updated.clone()));
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::infra::remote::MemoryBackend;

    fn queries(backend: &Arc<MemoryBackend>) -> TodoQueries {
        TodoQueries::new(QueryCache::new(CacheConfig::default()), backend.clone())
    }

    #[tokio::test]
    async fn items_resolve_through_seeded_details() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert_todo("first", false);
        backend.insert_todo("second", true);
        let queries = queries(&backend);

        let items = queries.items().await.unwrap();

        assert_eq!(
            items.iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            ["first", "second"]
        );
        assert_eq!(backend.calls().todo_fetch_all, 1);
        assert_eq!(backend.calls().todo_fetch_by_id, 0);
    }

    #[tokio::test]
    async fn create_invalidates_list() {
        let backend = Arc::new(MemoryBackend::new());
        let queries = queries(&backend);
        assert!(queries.list().await.unwrap().is_empty());

        let created = queries.create("  new  ").await.unwrap();
        assert_eq!(created.title, "new");

        assert_eq!(queries.list().await.unwrap(), vec![created.id]);
        assert_eq!(backend.calls().todo_fetch_all, 2);
    }

    #[tokio::test]
    async fn set_completed_refreshes_detail() {
        let backend = Arc::new(MemoryBackend::new());
        let id = backend.insert_todo("toggle me", false);
        let queries = queries(&backend);
        queries.list().await.unwrap();

        queries.set_completed(id, true).await.unwrap();

        assert!(queries.detail(id).await.unwrap().completed);
        assert_eq!(backend.calls().todo_fetch_by_id, 0);
    }

    #[tokio::test]
    async fn missing_detail_reports_not_found() {
        let backend = Arc::new(MemoryBackend::new());
        let queries = queries(&backend);

        let err = queries.detail(42).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
