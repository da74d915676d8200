//! Observable state container shared by the local stores.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::persist::{self, LocalStorage, Persisted, StorageError};

type Encoder<S> = fn(&S) -> Result<String, StorageError>;

struct Persistence<S> {
    storage: Arc<dyn LocalStorage>,
    name: &'static str,
    encode: Encoder<S>,
}

struct StoreInner<S> {
    sender: watch::Sender<S>,
    persistence: Option<Persistence<S>>,
    // Serializes mutate-then-persist so the last blob written is the latest state.
    writer: Mutex<()>,
}

/// Holds one state value; mutations are applied atomically and broadcast to
/// every selection.
pub struct Store<S> {
    inner: Arc<StoreInner<S>>,
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Send + Sync + 'static> Store<S> {
    /// A store that lives only in memory.
    pub fn new(initial: S) -> Self {
        Self::build(initial, None)
    }

    /// A store restored from `storage` that writes its snapshot after every
    /// committed mutation.
    pub fn persisted(storage: Arc<dyn LocalStorage>) -> Self
    where
        S: Persisted + Default,
    {
        let initial = persist::restore::<S>(storage.as_ref());
        Self::build(
            initial,
            Some(Persistence {
                storage,
                name: S::STORAGE_NAME,
                encode: persist::encode::<S>,
            }),
        )
    }

    fn build(initial: S, persistence: Option<Persistence<S>>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            inner: Arc::new(StoreInner {
                sender,
                persistence,
                writer: Mutex::new(()),
            }),
        }
    }

    /// Run `read` against the current state.
    pub fn read<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        read(&self.inner.sender.borrow())
    }

    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.inner.sender.borrow().clone()
    }

    /// Apply `mutate`; it returns whether it changed anything.
    ///
    /// Unchanged states are neither broadcast nor persisted.
    pub fn update(&self, mutate: impl FnOnce(&mut S) -> bool) -> bool {
        let _writer = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let modified = self.inner.sender.send_if_modified(mutate);
        if modified && let Some(persistence) = &self.inner.persistence {
            let blob = (persistence.encode)(&self.inner.sender.borrow());
            persist::save(persistence.storage.as_ref(), persistence.name, blob);
        }
        modified
    }

    /// Observe the slice of state picked by `selector`.
    pub fn select<T, F>(&self, selector: F) -> Selection<S, T, F>
    where
        F: Fn(&S) -> T,
        T: PartialEq + Clone,
    {
        let receiver = self.inner.sender.subscribe();
        let last = selector(&receiver.borrow());
        Selection {
            receiver,
            selector,
            last,
        }
    }

    /// Number of live selections.
    pub fn subscriber_count(&self) -> usize {
        self.inner.sender.receiver_count()
    }
}

/// A live view of part of a store's state. Dropping it unsubscribes.
pub struct Selection<S, T, F> {
    receiver: watch::Receiver<S>,
    selector: F,
    last: T,
}

impl<S, T, F> Selection<S, T, F>
where
    F: Fn(&S) -> T,
    T: PartialEq + Clone,
{
    pub fn current(&self) -> &T {
        &self.last
    }

    /// Wait until the selected slice differs from the last one seen.
    ///
    /// Returns `None` once every handle to the store is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            self.receiver.changed().await.ok()?;
            let next = (self.selector)(&self.receiver.borrow_and_update());
            if next != self.last {
                self.last = next.clone();
                return Some(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::stores::persist::MemoryStorage;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Pair {
        left: i32,
        right: i32,
    }

    #[tokio::test]
    async fn selection_ignores_unrelated_changes() {
        let store = Store::new(Pair::default());
        let mut left = store.select(|pair: &Pair| pair.left);

        store.update(|pair| {
            pair.right += 1;
            true
        });
        store.update(|pair| {
            pair.left = 7;
            true
        });

        assert_eq!(left.changed().await, Some(7));
        assert_eq!(*left.current(), 7);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), left.changed())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn dropping_selection_unsubscribes() {
        let store = Store::new(Pair::default());
        let selection = store.select(|pair: &Pair| pair.left);
        assert_eq!(store.subscriber_count(), 1);

        drop(selection);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn selection_ends_when_store_is_dropped() {
        let store = Store::new(Pair::default());
        let mut selection = store.select(|pair: &Pair| pair.right);
        drop(store);
        assert_eq!(selection.changed().await, None);
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counted(u32);

    impl Persisted for Counted {
        const STORAGE_NAME: &'static str = "counted";
        const VERSION: u32 = 0;
        type Snapshot = u32;

        fn snapshot(&self) -> u32 {
            self.0
        }

        fn restore(snapshot: u32) -> Self {
            Self(snapshot)
        }
    }

    #[test]
    fn only_modifying_updates_are_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let store: Store<Counted> = Store::persisted(storage.clone());

        assert!(!store.update(|_| false));
        assert_eq!(storage.load("counted").unwrap(), None);

        assert!(store.update(|counted| {
            counted.0 = 3;
            true
        }));
        assert_eq!(
            storage.load("counted").unwrap().as_deref(),
            Some(r#"{"state":3,"version":0}"#)
        );

        let reopened: Store<Counted> = Store::persisted(storage);
        assert_eq!(reopened.get(), Counted(3));
    }
}
