use super::container::Store;

#[derive(Clone)]
pub struct CounterStore {
    store: Store<i64>,
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore {
    pub fn new() -> Self {
        Self { store: Store::new(0) }
    }

    pub fn count(&self) -> i64 {
        self.store.get()
    }

    /// Returns `false` when the count is already at its bound.
    pub fn increment(&self) -> bool {
        self.store.update(|count| {
            let next = count.saturating_add(1);
            let changed = next != *count;
            *count = next;
            changed
        })
    }

    /// Returns `false` when the count is already at its bound.
    pub fn decrement(&self) -> bool {
        self.store.update(|count| {
            let next = count.saturating_sub(1);
            let changed = next != *count;
            *count = next;
            changed
        })
    }
}
