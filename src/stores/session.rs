//! Current authentication session.

use tracing::info;
use uuid::Uuid;

use crate::application::gateway::AuthError;
use crate::domain::entities::Session;

use super::container::{Selection, Store};

#[derive(Clone)]
pub struct SessionStore {
    store: Store<Option<Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            store: Store::new(None),
        }
    }

    pub fn set(&self, session: Session) {
        let user_id = session.user.id;
        self.store.update(|current| {
            *current = Some(session);
            true
        });
        info!(user_id = %user_id, "session established");
    }

    pub fn clear(&self) {
        if self.store.update(|current| current.take().is_some()) {
            info!("session cleared");
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.store.get()
    }

    /// The active session, or `SessionMissing`.
    pub fn require(&self) -> Result<Session, AuthError> {
        self.current().ok_or_else(AuthError::session_missing)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.store.read(session_user_id)
    }

    pub fn access_token(&self) -> Option<String> {
        self.store
            .read(|session| session.as_ref().map(|s| s.access_token.clone()))
    }

    /// Observe sign-in and sign-out as changes of the user id.
    pub fn select_user_id(&self) -> UserSelection {
        self.store.select(session_user_id as UserIdSelector)
    }
}

pub type UserIdSelector = fn(&Option<Session>) -> Option<Uuid>;

pub type UserSelection = Selection<Option<Session>, Option<Uuid>, UserIdSelector>;

fn session_user_id(session: &Option<Session>) -> Option<Uuid> {
    session.as_ref().map(|s| s.user.id)
}
