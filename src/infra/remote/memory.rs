//! In-process backend implementing every gateway.
//!
//! Useful offline and in tests: it records call counts and can inject
//! latency and failures.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::application::gateway::{
    AuthError, AuthGateway, AuthReason, CreatePostParams, CreateProfileParams, CreateTodoParams,
    Credentials, GatewayError, PostsGateway, ProfilesGateway, ProviderSignIn, TodosGateway,
    UpdatePostParams, UpdateTodoParams,
};
use crate::domain::entities::{
    PostId, PostRecord, ProfileRecord, RemoteTodo, Session, SessionUser, TodoId,
};

const SUPPORTED_PROVIDERS: &[&str] = &["kakao", "google", "github"];
const SESSION_TTL: time::Duration = time::Duration::hours(1);

/// Number of calls each gateway operation received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub todo_fetch_all: usize,
    pub todo_fetch_by_id: usize,
    pub todo_write: usize,
    pub post_fetch_all: usize,
    pub post_write: usize,
    pub profile_fetch_by_id: usize,
    pub profile_create: usize,
    pub auth: usize,
}

#[derive(Default)]
struct MemoryState {
    todos: Vec<RemoteTodo>,
    posts: Vec<PostRecord>,
    profiles: HashMap<Uuid, ProfileRecord>,
    users: HashMap<String, (Uuid, String)>,
    codes: HashMap<String, String>,
    next_todo_id: TodoId,
    next_post_id: PostId,
    calls: CallCounts,
    failure: Option<GatewayError>,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_todo(&self, title: &str, completed: bool) -> TodoId {
        let mut state = self.state();
        state.next_todo_id += 1;
        let id = state.next_todo_id;
        state.todos.push(RemoteTodo {
            id,
            title: title.to_string(),
            completed,
            created_at: Some(OffsetDateTime::now_utc()),
        });
        id
    }

    pub fn insert_profile(&self, id: Uuid, nickname: &str) {
        self.state().profiles.insert(
            id,
            ProfileRecord {
                id,
                nickname: nickname.to_string(),
                bio: None,
                avatar_url: None,
                created_at: OffsetDateTime::now_utc(),
            },
        );
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.state().posts.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls.clone()
    }

    /// Register `email` if needed and hand out a session for it without
    /// counting an auth call.
    pub fn session_for(&self, email: &str) -> Session {
        let mut state = self.state();
        let user_id = state
            .users
            .entry(email.to_string())
            .or_insert_with(|| (Uuid::new_v4(), String::new()))
            .0;
        issue_session(user_id, email)
    }

    /// Issue a one-shot authorization code for `email`.
    pub fn issue_code(&self, email: &str) -> String {
        let code = Uuid::new_v4().simple().to_string();
        self.state()
            .codes
            .insert(code.clone(), email.to_string());
        code
    }

    /// Make every data call fail with `error` until [`recover`](Self::recover).
    pub fn fail_with(&self, error: GatewayError) {
        self.state().failure = Some(error);
    }

    pub fn recover(&self) {
        self.state().failure = None;
    }

    /// Delay every data call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Count the call, then apply injected latency and failure.
    async fn enter(&self, count: impl FnOnce(&mut CallCounts)) -> Result<(), GatewayError> {
        let (latency, failure) = {
            let mut state = self.state();
            count(&mut state.calls);
            (state.latency, state.failure.clone())
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn issue_session(user_id: Uuid, email: &str) -> Session {
    Session {
        access_token: format!("memory-access-{}", Uuid::new_v4().simple()),
        refresh_token: format!("memory-refresh-{}", Uuid::new_v4().simple()),
        expires_at: OffsetDateTime::now_utc() + SESSION_TTL,
        user: SessionUser {
            id: user_id,
            email: Some(email.to_string()),
        },
    }
}

#[async_trait]
impl TodosGateway for MemoryBackend {
    async fn fetch_all(&self) -> Result<Vec<RemoteTodo>, GatewayError> {
        self.enter(|calls| calls.todo_fetch_all += 1).await?;
        Ok(self.state().todos.clone())
    }

    async fn fetch_by_id(&self, id: TodoId) -> Result<RemoteTodo, GatewayError> {
        self.enter(|calls| calls.todo_fetch_by_id += 1).await?;
        self.state()
            .todos
            .iter()
            .find(|todo| todo.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("todo"))
    }

    async fn create(&self, params: CreateTodoParams) -> Result<RemoteTodo, GatewayError> {
        self.enter(|calls| calls.todo_write += 1).await?;
        let id = self.insert_todo(&params.title, false);
        self.fetch_row(id)
    }

    async fn update(
        &self,
        id: TodoId,
        patch: UpdateTodoParams,
    ) -> Result<RemoteTodo, GatewayError> {
        self.enter(|calls| calls.todo_write += 1).await?;
        let mut state = self.state();
        let todo = state
            .todos
            .iter_mut()
            .find(|todo| todo.id == id)
            .ok_or_else(|| GatewayError::not_found("todo"))?;
        if let Some(title) = patch.title {
            todo.title = title;
        }
        if let Some(completed) = patch.completed {
            todo.completed = completed;
        }
        Ok(todo.clone())
    }
}

impl MemoryBackend {
    fn fetch_row(&self, id: TodoId) -> Result<RemoteTodo, GatewayError> {
        self.state()
            .todos
            .iter()
            .find(|todo| todo.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("todo"))
    }
}

#[async_trait]
impl PostsGateway for MemoryBackend {
    async fn fetch_all(&self) -> Result<Vec<PostRecord>, GatewayError> {
        self.enter(|calls| calls.post_fetch_all += 1).await?;
        Ok(self.state().posts.clone())
    }

    async fn create(&self, params: CreatePostParams) -> Result<PostRecord, GatewayError> {
        self.enter(|calls| calls.post_write += 1).await?;
        let mut state = self.state();
        state.next_post_id += 1;
        let post = PostRecord {
            id: state.next_post_id,
            content: params.content,
            image_urls: params.image_urls,
            author_id: Some(params.author_id),
            created_at: OffsetDateTime::now_utc(),
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update(
        &self,
        id: PostId,
        params: UpdatePostParams,
    ) -> Result<PostRecord, GatewayError> {
        self.enter(|calls| calls.post_write += 1).await?;
        let mut state = self.state();
        let post = state
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or_else(|| GatewayError::not_found("post"))?;
        post.content = params.content;
        post.image_urls = params.image_urls;
        Ok(post.clone())
    }
}

#[async_trait]
impl ProfilesGateway for MemoryBackend {
    async fn fetch_by_id(&self, id: Uuid) -> Result<ProfileRecord, GatewayError> {
        self.enter(|calls| calls.profile_fetch_by_id += 1).await?;
        self.state()
            .profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::not_found("profile"))
    }

    async fn create(&self, params: CreateProfileParams) -> Result<ProfileRecord, GatewayError> {
        self.enter(|calls| calls.profile_create += 1).await?;
        let mut state = self.state();
        if state.profiles.contains_key(&params.id) {
            return Err(GatewayError::remote("duplicate key value violates unique constraint"));
        }
        let profile = ProfileRecord {
            id: params.id,
            nickname: params.nickname,
            bio: None,
            avatar_url: None,
            created_at: OffsetDateTime::now_utc(),
        };
        state.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl AuthGateway for MemoryBackend {
    async fn sign_in(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let mut state = self.state();
        state.calls.auth += 1;
        match state.users.get(&credentials.email) {
            Some((id, password)) if *password == credentials.password => {
                Ok(issue_session(*id, &credentials.email))
            }
            _ => Err(AuthReason::InvalidCredentials.into()),
        }
    }

    async fn sign_up(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let mut state = self.state();
        state.calls.auth += 1;
        if state.users.contains_key(&credentials.email) {
            return Err(AuthReason::UserAlreadyExists.into());
        }
        let id = Uuid::new_v4();
        state
            .users
            .insert(credentials.email.clone(), (id, credentials.password));
        Ok(issue_session(id, &credentials.email))
    }

    async fn sign_in_with_provider(&self, provider: &str) -> Result<ProviderSignIn, AuthError> {
        self.state().calls.auth += 1;
        if !SUPPORTED_PROVIDERS.contains(&provider) {
            return Err(AuthReason::UnsupportedProvider(provider.to_string()).into());
        }
        let mut url = Url::parse("https://auth.memory.invalid/authorize")
            .map_err(|err| AuthError::new(AuthReason::Other(err.to_string())))?;
        url.query_pairs_mut().append_pair("provider", provider);
        Ok(ProviderSignIn::Redirect(url))
    }

    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let mut state = self.state();
        state.calls.auth += 1;
        let email = state
            .codes
            .remove(code)
            .ok_or_else(|| AuthError::new(AuthReason::CodeExchangeFailed))?;
        let id = state
            .users
            .entry(email.clone())
            .or_insert_with(|| (Uuid::new_v4(), String::new()))
            .0;
        Ok(issue_session(id, &email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_failure_applies_until_recovered() {
        let backend = MemoryBackend::new();
        backend.insert_todo("a", false);
        backend.fail_with(GatewayError::remote("boom"));

        assert_eq!(
            TodosGateway::fetch_all(&backend).await,
            Err(GatewayError::remote("boom"))
        );

        backend.recover();
        assert_eq!(TodosGateway::fetch_all(&backend).await.unwrap().len(), 1);
        assert_eq!(backend.calls().todo_fetch_all, 2);
    }

    #[tokio::test]
    async fn codes_are_single_use() {
        let backend = MemoryBackend::new();
        let code = backend.issue_code("x@example.com");

        assert!(backend.exchange_code(&code).await.is_ok());
        let err = backend.exchange_code(&code).await.unwrap_err();
        assert_eq!(err.reason, AuthReason::CodeExchangeFailed);
    }

    #[tokio::test]
    async fn update_patches_only_given_fields() {
        let backend = MemoryBackend::new();
        let id = backend.insert_todo("title", false);

        let updated = TodosGateway::update(
            &backend,
            id,
            UpdateTodoParams {
                completed: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "title");
        assert!(updated.completed);
    }
}
