//! Gateway traits describing the remote store and the auth collaborator.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::domain::entities::{
    PostId, PostRecord, ProfileRecord, RemoteTodo, Session, TodoId,
};

/// Failure reported by a remote data call.
///
/// Clonable so that every caller coalesced onto one load observes the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("remote request failed: {message}")]
    Remote { message: String },
    #[error("remote entity `{entity}` not found")]
    NotFound { entity: &'static str },
}

impl GatewayError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthReason {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email address not confirmed")]
    EmailNotConfirmed,
    #[error("account confirmation required")]
    ConfirmationRequired,
    #[error("user already registered")]
    UserAlreadyExists,
    #[error("too many requests")]
    RateLimited,
    #[error("unsupported provider `{0}`")]
    UnsupportedProvider(String),
    #[error("authorization code exchange failed")]
    CodeExchangeFailed,
    #[error("no active session")]
    SessionMissing,
    #[error("auth service unreachable: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

impl AuthReason {
    /// Map an auth service error code onto a reason.
    pub fn from_code(code: &str, message: &str) -> Self {
        match code {
            "invalid_credentials" | "invalid_grant" => Self::InvalidCredentials,
            "email_not_confirmed" => Self::EmailNotConfirmed,
            "user_already_exists" | "email_exists" => Self::UserAlreadyExists,
            "over_request_rate_limit" | "over_email_send_rate_limit" => Self::RateLimited,
            "bad_code_verifier" | "flow_state_not_found" | "flow_state_expired" => {
                Self::CodeExchangeFailed
            }
            "validation_failed" if message.contains("provider") => {
                Self::UnsupportedProvider(message.to_string())
            }
            _ => Self::Other(message.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("authentication failed: {reason}")]
pub struct AuthError {
    pub reason: AuthReason,
}

impl AuthError {
    pub fn new(reason: AuthReason) -> Self {
        Self { reason }
    }

    pub fn session_missing() -> Self {
        Self::new(AuthReason::SessionMissing)
    }

    /// Human-readable text for a toast-style notification.
    pub fn user_message(&self) -> String {
        match &self.reason {
            AuthReason::InvalidCredentials => {
                "The email or password you entered is incorrect.".to_string()
            }
            AuthReason::EmailNotConfirmed => {
                "Please confirm your email address before signing in.".to_string()
            }
            AuthReason::ConfirmationRequired => {
                "Check your inbox to finish creating your account.".to_string()
            }
            AuthReason::UserAlreadyExists => {
                "An account with this email already exists.".to_string()
            }
            AuthReason::RateLimited => {
                "Too many attempts. Please wait a moment and try again.".to_string()
            }
            AuthReason::UnsupportedProvider(provider) => {
                format!("Signing in with {provider} is not available.")
            }
            AuthReason::CodeExchangeFailed => {
                "The sign-in link has expired. Please try again.".to_string()
            }
            AuthReason::SessionMissing => "Please sign in to continue.".to_string(),
            AuthReason::Transport(_) => {
                "We could not reach the sign-in service. Check your connection.".to_string()
            }
            AuthReason::Other(message) => format!("Sign-in failed: {message}"),
        }
    }
}

impl From<AuthReason> for AuthError {
    fn from(reason: AuthReason) -> Self {
        Self::new(reason)
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Outcome of starting a third-party sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSignIn {
    /// The provider completed inline and produced a session.
    Session(Session),
    /// The user must visit `url`; the callback later calls `exchange_code`.
    Redirect(Url),
}

#[derive(Debug, Clone)]
pub struct CreateTodoParams {
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTodoParams {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub content: String,
    pub image_urls: Option<Vec<String>>,
    pub author_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub content: String,
    pub image_urls: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CreateProfileParams {
    pub id: Uuid,
    pub nickname: String,
}

#[async_trait]
pub trait TodosGateway: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RemoteTodo>, GatewayError>;

    async fn fetch_by_id(&self, id: TodoId) -> Result<RemoteTodo, GatewayError>;

    async fn create(&self, params: CreateTodoParams) -> Result<RemoteTodo, GatewayError>;

    async fn update(
        &self,
        id: TodoId,
        patch: UpdateTodoParams,
    ) -> Result<RemoteTodo, GatewayError>;
}

#[async_trait]
pub trait PostsGateway: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<PostRecord>, GatewayError>;

    async fn create(&self, params: CreatePostParams) -> Result<PostRecord, GatewayError>;

    async fn update(
        &self,
        id: PostId,
        params: UpdatePostParams,
    ) -> Result<PostRecord, GatewayError>;
}

#[async_trait]
pub trait ProfilesGateway: Send + Sync {
    async fn fetch_by_id(&self, id: Uuid) -> Result<ProfileRecord, GatewayError>;

    async fn create(&self, params: CreateProfileParams) -> Result<ProfileRecord, GatewayError>;
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in(&self, credentials: Credentials) -> Result<Session, AuthError>;

    async fn sign_up(&self, credentials: Credentials) -> Result<Session, AuthError>;

    async fn sign_in_with_provider(&self, provider: &str) -> Result<ProviderSignIn, AuthError>;

    async fn exchange_code(&self, code: &str) -> Result<Session, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_map_to_reasons() {
        assert_eq!(
            AuthReason::from_code("invalid_credentials", "Invalid login credentials"),
            AuthReason::InvalidCredentials
        );
        assert_eq!(
            AuthReason::from_code("flow_state_expired", "expired"),
            AuthReason::CodeExchangeFailed
        );
        assert_eq!(
            AuthReason::from_code("weird", "something odd"),
            AuthReason::Other("something odd".to_string())
        );
    }

    #[test]
    fn user_message_is_human_readable() {
        let error = AuthError::new(AuthReason::InvalidCredentials);
        assert_eq!(
            error.user_message(),
            "The email or password you entered is incorrect."
        );
        assert_eq!(
            error.to_string(),
            "authentication failed: invalid email or password"
        );
    }

    #[test]
    fn not_found_is_distinguished_from_remote_failure() {
        assert!(GatewayError::not_found("profile").is_not_found());
        assert!(!GatewayError::remote("timeout").is_not_found());
    }
}
