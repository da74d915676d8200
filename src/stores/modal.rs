//! Post editor modal.

use tracing::debug;

use crate::domain::entities::PostId;

use super::container::{Selection, Store};

/// The single global editor modal. `OpenEdit` always names its post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ModalState {
    #[default]
    Closed,
    OpenCreate,
    OpenEdit {
        post_id: PostId,
        content: String,
        image_urls: Option<Vec<String>>,
    },
}

impl ModalState {
    pub fn is_open(&self) -> bool {
        !matches!(self, ModalState::Closed)
    }
}

#[derive(Clone)]
pub struct ModalStore {
    store: Store<ModalState>,
}

impl Default for ModalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ModalStore {
    pub fn new() -> Self {
        Self {
            store: Store::new(ModalState::Closed),
        }
    }

    pub fn open_create(&self) {
        self.transition(ModalState::OpenCreate);
    }

    pub fn open_edit(&self, post_id: PostId, content: String, image_urls: Option<Vec<String>>) {
        self.transition(ModalState::OpenEdit {
            post_id,
            content,
            image_urls,
        });
    }

    pub fn close(&self) {
        self.transition(ModalState::Closed);
    }

    pub fn state(&self) -> ModalState {
        self.store.get()
    }

    pub fn is_open(&self) -> bool {
        self.store.read(ModalState::is_open)
    }

    pub fn select<T, F>(&self, selector: F) -> Selection<ModalState, T, F>
    where
        F: Fn(&ModalState) -> T,
        T: PartialEq + Clone,
    {
        self.store.select(selector)
    }

    fn transition(&self, next: ModalState) {
        self.store.update(|state| {
            if *state == next {
                return false;
            }
            debug!(from = ?state, to = ?next, "editor modal transition");
            *state = next;
            true
        });
    }
}
