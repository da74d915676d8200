//! Local todo store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::domain::todos::{Filter, Todo, TodoText};

use super::container::{Selection, Store};
use super::persist::{LocalStorage, Persisted};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoState {
    pub todos: Vec<Todo>,
    pub filter: Filter,
}

/// Persisted projection: the filter always restarts at `All`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TodoSnapshot {
    pub todos: Vec<Todo>,
}

impl Persisted for TodoState {
    const STORAGE_NAME: &'static str = "todo-storage";
    const VERSION: u32 = 0;
    type Snapshot = TodoSnapshot;

    fn snapshot(&self) -> TodoSnapshot {
        TodoSnapshot {
            todos: self.todos.clone(),
        }
    }

    fn restore(snapshot: TodoSnapshot) -> Self {
        Self {
            todos: snapshot.todos,
            filter: Filter::All,
        }
    }
}

#[derive(Clone)]
pub struct TodoStore {
    store: Store<TodoState>,
}

impl TodoStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            store: Store::persisted(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            store: Store::new(TodoState::default()),
        }
    }

    /// Append a new todo. Blank text is rejected and yields `None`.
    pub fn add(&self, text: &str) -> Option<String> {
        let text = TodoText::parse(text).ok()?;
        let todo = Todo::new(text, OffsetDateTime::now_utc());
        let id = todo.id.clone();
        self.store.update(|state| {
            state.todos.push(todo);
            true
        });
        debug!(todo_id = %id, "added todo");
        Some(id)
    }

    /// Flip `completed`. Returns whether a todo matched.
    pub fn toggle(&self, id: &str) -> bool {
        self.store.update(|state| match find(&mut state.todos, id) {
            Some(todo) => {
                todo.completed = !todo.completed;
                true
            }
            None => false,
        })
    }

    /// Replace the text of a todo and bump `updated_at`.
    pub fn update(&self, id: &str, text: &str) -> bool {
        let Ok(text) = TodoText::parse(text) else {
            return false;
        };
        let now = OffsetDateTime::now_utc();
        self.store.update(|state| match find(&mut state.todos, id) {
            Some(todo) => {
                todo.rewrite(text, now);
                true
            }
            None => false,
        })
    }

    pub fn remove(&self, id: &str) -> bool {
        self.store.update(|state| {
            let before = state.todos.len();
            state.todos.retain(|todo| todo.id != id);
            state.todos.len() != before
        })
    }

    pub fn set_filter(&self, filter: Filter) {
        self.store.update(|state| {
            let changed = state.filter != filter;
            state.filter = filter;
            changed
        });
    }

    /// Drop every completed todo; returns how many were removed.
    pub fn clear_completed(&self) -> usize {
        let mut removed = 0;
        self.store.update(|state| {
            let before = state.todos.len();
            state.todos.retain(|todo| !todo.completed);
            removed = before - state.todos.len();
            removed > 0
        });
        removed
    }

    /// Todos matching the current filter, in insertion order.
    pub fn filtered(&self) -> Vec<Todo> {
        self.store.read(|state| {
            state
                .todos
                .iter()
                .filter(|todo| state.filter.matches(todo))
                .cloned()
                .collect()
        })
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.store.read(|state| state.todos.clone())
    }

    pub fn filter(&self) -> Filter {
        self.store.read(|state| state.filter)
    }

    pub fn state(&self) -> TodoState {
        self.store.get()
    }

    pub fn select<T, F>(&self, selector: F) -> Selection<TodoState, T, F>
    where
        F: Fn(&TodoState) -> T,
        T: PartialEq + Clone,
    {
        self.store.select(selector)
    }
}

fn find<'a>(todos: &'a mut [Todo], id: &str) -> Option<&'a mut Todo> {
    todos.iter_mut().find(|todo| todo.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::persist::MemoryStorage;

    #[test]
    fn add_trims_text_and_starts_uncompleted() {
        let store = TodoStore::in_memory();

        let id = store.add("  write docs  ").expect("valid todo");

        let todos = store.todos();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].id, id);
        assert_eq!(todos[0].text, "write docs");
        assert!(!todos[0].completed);
        assert_eq!(todos[0].created_at, todos[0].updated_at);
    }

    #[test]
    fn blank_text_is_rejected() {
        let store = TodoStore::in_memory();
        assert_eq!(store.add("   "), None);
        assert!(store.todos().is_empty());

        let id = store.add("keep").unwrap();
        assert!(!store.update(&id, " \n"));
        assert_eq!(store.todos()[0].text, "keep");
    }

    #[test]
    fn toggle_twice_restores_state() {
        let store = TodoStore::in_memory();
        let id = store.add("flip").unwrap();
        let before = store.state();

        assert!(store.toggle(&id));
        assert!(store.todos()[0].completed);
        assert!(store.toggle(&id));
        assert_eq!(store.state(), before);
    }

    #[test]
    fn update_bumps_updated_at_only() {
        let store = TodoStore::in_memory();
        let id = store.add("draft").unwrap();
        let original = store.todos()[0].clone();

        assert!(store.update(&id, "final"));

        let updated = &store.todos()[0];
        assert_eq!(updated.text, "final");
        assert_eq!(updated.created_at, original.created_at);
        assert!(updated.updated_at >= original.updated_at);
    }

    #[test]
    fn absent_ids_leave_state_and_storage_untouched() {
        let storage = Arc::new(MemoryStorage::new());
        let store = TodoStore::new(storage.clone());
        store.add("only").unwrap();
        let blob = storage.load("todo-storage").unwrap();
        let state = store.state();

        assert!(!store.toggle("missing"));
        assert!(!store.update("missing", "text"));
        assert!(!store.remove("missing"));
        assert_eq!(store.clear_completed(), 0);

        assert_eq!(store.state(), state);
        assert_eq!(storage.load("todo-storage").unwrap(), blob);
    }

    #[test]
    fn filters_preserve_order() {
        let store = TodoStore::in_memory();
        let a = store.add("a").unwrap();
        store.add("b").unwrap();
        let c = store.add("c").unwrap();
        store.toggle(&a);
        store.toggle(&c);

        store.set_filter(Filter::Completed);
        let done: Vec<_> = store.filtered().into_iter().map(|t| t.text).collect();
        assert_eq!(done, ["a", "c"]);

        store.set_filter(Filter::Active);
        let active: Vec<_> = store.filtered().into_iter().map(|t| t.text).collect();
        assert_eq!(active, ["b"]);

        store.set_filter(Filter::All);
        assert_eq!(store.filtered(), store.todos());
    }

    #[test]
    fn clear_completed_keeps_active() {
        let store = TodoStore::in_memory();
        let a = store.add("a").unwrap();
        store.add("b").unwrap();
        store.toggle(&a);

        assert_eq!(store.clear_completed(), 1);
        assert!(store.todos().iter().all(|todo| !todo.completed));
        assert_eq!(store.todos().len(), 1);
    }

    #[test]
    fn clear_completed_is_idempotent() {
        let store = TodoStore::in_memory();
        let a = store.add("a").unwrap();
        store.add("b").unwrap();
        store.toggle(&a);

        store.clear_completed();
        let once = store.state();
        assert_eq!(store.clear_completed(), 0);
        assert_eq!(store.state(), once);
    }

    fn ids_for(store: &TodoStore, filter: Filter) -> Vec<String> {
        store.set_filter(filter);
        store.filtered().into_iter().map(|todo| todo.id).collect()
    }

    fn assert_partitioned(store: &TodoStore) {
        let all = ids_for(store, Filter::All);
        let active = ids_for(store, Filter::Active);
        let completed = ids_for(store, Filter::Completed);

        assert!(active.iter().all(|id| !completed.contains(id)));
        let mut union: Vec<_> = active.into_iter().chain(completed).collect();
        let mut expected = all;
        union.sort();
        expected.sort();
        assert_eq!(union, expected);
    }

    #[test]
    fn active_and_completed_partition_all() {
        let store = TodoStore::in_memory();
        assert_partitioned(&store);

        let mut ids = Vec::new();
        for text in ["one", "two", "three", "four"] {
            ids.push(store.add(text).unwrap());
            assert_partitioned(&store);
        }

        store.toggle(&ids[0]);
        assert_partitioned(&store);
        store.toggle(&ids[2]);
        assert_partitioned(&store);
        store.update(&ids[2], "three, edited");
        assert_partitioned(&store);
        store.remove(&ids[1]);
        assert_partitioned(&store);
        store.toggle(&ids[0]);
        assert_partitioned(&store);
        store.toggle("missing");
        assert_partitioned(&store);
        store.clear_completed();
        assert_partitioned(&store);
    }

    #[test]
    fn todos_survive_reload_but_filter_resets() {
        let storage = Arc::new(MemoryStorage::new());
        let store = TodoStore::new(storage.clone());
        let id = store.add("persist me").unwrap();
        store.toggle(&id);
        store.set_filter(Filter::Completed);

        let blob = storage.load("todo-storage").unwrap().unwrap();
        assert!(!blob.contains("filter"));

        let reopened = TodoStore::new(storage);
        assert_eq!(reopened.todos(), store.todos());
        assert_eq!(reopened.filter(), Filter::All);
    }
}
