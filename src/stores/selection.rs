//! Persisted selection of the user and post currently in focus.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::entities::PostId;

use super::container::Store;
use super::persist::{LocalStorage, Persisted};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySelection {
    pub selected_user_id: Option<i64>,
    pub selected_post_id: Option<PostId>,
}

impl Persisted for QuerySelection {
    const STORAGE_NAME: &'static str = "query-storage";
    const VERSION: u32 = 0;
    type Snapshot = QuerySelection;

    fn snapshot(&self) -> QuerySelection {
        *self
    }

    fn restore(snapshot: QuerySelection) -> Self {
        snapshot
    }
}

#[derive(Clone)]
pub struct SelectionStore {
    store: Store<QuerySelection>,
}

impl SelectionStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            store: Store::persisted(storage),
        }
    }

    pub fn current(&self) -> QuerySelection {
        self.store.get()
    }

    pub fn set_selected_user_id(&self, user_id: Option<i64>) {
        self.store.update(|selection| {
            let changed = selection.selected_user_id != user_id;
            selection.selected_user_id = user_id;
            changed
        });
    }

    pub fn set_selected_post_id(&self, post_id: Option<PostId>) {
        self.store.update(|selection| {
            let changed = selection.selected_post_id != post_id;
            selection.selected_post_id = post_id;
            changed
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::persist::MemoryStorage;

    #[test]
    fn both_fields_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SelectionStore::new(storage.clone());

        store.set_selected_user_id(Some(3));
        store.set_selected_post_id(Some(12));

        assert_eq!(
            storage.load("query-storage").unwrap().as_deref(),
            Some(r#"{"state":{"selected_user_id":3,"selected_post_id":12},"version":0}"#)
        );

        let reopened = SelectionStore::new(storage);
        assert_eq!(
            reopened.current(),
            QuerySelection {
                selected_user_id: Some(3),
                selected_post_id: Some(12),
            }
        );
    }

    #[test]
    fn clearing_selection_persists_null() {
        let storage = Arc::new(MemoryStorage::new());
        let store = SelectionStore::new(storage.clone());
        store.set_selected_post_id(Some(1));
        store.set_selected_post_id(None);

        let reopened = SelectionStore::new(storage);
        assert_eq!(reopened.current().selected_post_id, None);
    }
}
