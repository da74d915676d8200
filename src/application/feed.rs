//! Post feed and the editor submission flow.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::application::gateway::{
    AuthError, CreatePostParams, GatewayError, PostsGateway, UpdatePostParams,
};
use crate::cache::{CacheKey, QueryCache, QueryError, QueryValue};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::PostContent;
use crate::stores::{ModalState, ModalStore, SessionStore};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("the post editor is not open")]
    EditorClosed,
}

#[derive(Clone)]
pub struct FeedService {
    cache: QueryCache,
    gateway: Arc<dyn PostsGateway>,
    session: SessionStore,
}

impl FeedService {
    pub fn new(cache: QueryCache, gateway: Arc<dyn PostsGateway>, session: SessionStore) -> Self {
        Self {
            cache,
            gateway,
            session,
        }
    }

    pub async fn posts(&self) -> Result<Vec<PostRecord>, QueryError> {
        let gateway = Arc::clone(&self.gateway);
        self.cache
            .fetch(CacheKey::PostList, move || async move {
                gateway.fetch_all().await.map(QueryValue::Posts)
            })
            .await?
            .into_posts(&CacheKey::PostList)
    }

    /// Publish a new post as the signed-in user.
    #[instrument(skip(self, content))]
    pub async fn create_post(&self, content: &str) -> Result<PostRecord, FeedError> {
        self.create(content, None).await
    }

    /// Submit the editor: create or update according to the modal state, then
    /// close the modal. The modal stays open when the submission fails.
    pub async fn submit_editor(
        &self,
        modal: &ModalStore,
        content: &str,
        image_urls: Option<Vec<String>>,
    ) -> Result<PostRecord, FeedError> {
        let post = match modal.state() {
            ModalState::Closed => return Err(FeedError::EditorClosed),
            ModalState::OpenCreate => self.create(content, image_urls).await?,
            ModalState::OpenEdit { post_id, .. } => {
                self.session.require()?;
                let content = PostContent::parse(content)?;
                let updated = self
                    .gateway
                    .update(
                        post_id,
                        UpdatePostParams {
                            content: content.into_inner(),
                            image_urls,
                        },
                    )
                    .await?;
                self.cache.invalidate(&CacheKey::PostList);
                info!(post_id, "updated post");
                updated
            }
        };
        modal.close();
        Ok(post)
    }

    async fn create(
        &self,
        content: &str,
        image_urls: Option<Vec<String>>,
    ) -> Result<PostRecord, FeedError> {
        let session = self.session.require()?;
        let content = PostContent::parse(content)?;
        let created = self
            .gateway
            .create(CreatePostParams {
                content: content.into_inner(),
                image_urls,
                author_id: session.user.id,
            })
            .await?;
        self.cache.invalidate(&CacheKey::PostList);
        info!(post_id = created.id, "created post");
        Ok(created)
    }
}
