//! Profile loading with default-record creation.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::gateway::{CreateProfileParams, ProfilesGateway};
use crate::cache::{CacheKey, QueryCache, QueryError, QueryValue};
use crate::domain::entities::ProfileRecord;
use crate::domain::nickname::random_nickname;
use crate::stores::SessionStore;

#[derive(Clone)]
pub struct ProfileService {
    cache: QueryCache,
    gateway: Arc<dyn ProfilesGateway>,
    session: SessionStore,
}

impl ProfileService {
    pub fn new(
        cache: QueryCache,
        gateway: Arc<dyn ProfilesGateway>,
        session: SessionStore,
    ) -> Self {
        Self {
            cache,
            gateway,
            session,
        }
    }

    /// Load the profile of `user_id`.
    ///
    /// When the signed-in user has no profile row yet, one is created with a
    /// generated nickname. Missing profiles of other users stay `NotFound`.
    #[instrument(skip(self))]
    pub async fn load(&self, user_id: Uuid) -> Result<ProfileRecord, QueryError> {
        let key = CacheKey::Profile(user_id);
        let is_mine = self.session.user_id() == Some(user_id);
        let gateway = Arc::clone(&self.gateway);

        self.cache
            .fetch(key.clone(), move || async move {
                let profile = match gateway.fetch_by_id(user_id).await {
                    Err(err) if is_mine && err.is_not_found() => {
                        let nickname = random_nickname();
                        info!(user_id = %user_id, nickname = %nickname, "creating default profile");
                        gateway
                            .create(CreateProfileParams {
                                id: user_id,
                                nickname,
                            })
                            .await
                    }
                    other => other,
                };
                profile.map(QueryValue::Profile)
            })
            .await?
            .into_profile(&key)
    }
}
