//! Authentication flows.
//!
//! Successful sessions are written to the [`SessionStore`]; failures carry a
//! human-readable [`AuthError::user_message`].

pub mod callback;

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::application::gateway::{
    AuthError, AuthGateway, AuthReason, Credentials, ProviderSignIn,
};
use crate::cache::QueryCache;
use crate::domain::entities::Session;
use crate::stores::SessionStore;

#[derive(Clone)]
pub struct AuthService {
    gateway: Arc<dyn AuthGateway>,
    session: SessionStore,
    cache: QueryCache,
}

impl AuthService {
    pub fn new(gateway: Arc<dyn AuthGateway>, session: SessionStore, cache: QueryCache) -> Self {
        Self {
            gateway,
            session,
            cache,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let credentials = non_blank(credentials)?;
        let result = self.gateway.sign_in(credentials).await;
        self.establish(result)
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_up(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let credentials = non_blank(credentials)?;
        let result = self.gateway.sign_up(credentials).await;
        self.establish(result)
    }

    /// Start a third-party sign-in. A redirect must be followed by the user;
    /// the callback then completes it through [`callback::resolve`].
    #[instrument(skip(self))]
    pub async fn sign_in_with_provider(&self, provider: &str) -> Result<ProviderSignIn, AuthError> {
        match self.gateway.sign_in_with_provider(provider).await {
            Ok(ProviderSignIn::Session(session)) => {
                self.session.set(session.clone());
                Ok(ProviderSignIn::Session(session))
            }
            Ok(redirect @ ProviderSignIn::Redirect(_)) => {
                info!(provider, "provider sign-in requires redirect");
                Ok(redirect)
            }
            Err(err) => {
                warn!(provider, error = %err, "provider sign-in failed");
                Err(err)
            }
        }
    }

    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let result = self.gateway.exchange_code(code).await;
        self.establish(result)
    }

    /// Drop the session and everything cached on its behalf.
    pub fn sign_out(&self) {
        self.session.clear();
        self.cache.clear();
    }

    fn establish(&self, result: Result<Session, AuthError>) -> Result<Session, AuthError> {
        match result {
            Ok(session) => {
                self.session.set(session.clone());
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "authentication failed");
                Err(err)
            }
        }
    }
}

fn non_blank(credentials: Credentials) -> Result<Credentials, AuthError> {
    if credentials.email.trim().is_empty() || credentials.password.trim().is_empty() {
        return Err(AuthError::new(AuthReason::InvalidCredentials));
    }
    Ok(Credentials {
        email: credentials.email.trim().to_string(),
        password: credentials.password,
    })
}
