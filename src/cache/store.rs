//! Query cache storage.
//!
//! Holds fetched and seeded values under `CacheKey`s, coalesces concurrent
//! loads of one key and orders commits by epoch.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::gateway::GatewayError;

use super::config::CacheConfig;
use super::entry::{CacheEntry, Epoch, QueryValue};
use super::error::QueryError;
use super::keys::CacheKey;
use super::lock::lock;
use super::observer::QueryObserver;

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "quire_query_cache_hit_total";
const METRIC_MISS: &str = "quire_query_cache_miss_total";
const METRIC_COALESCED: &str = "quire_query_cache_coalesced_total";
const METRIC_EVICT: &str = "quire_query_cache_evict_total";
const METRIC_SUPERSEDED: &str = "quire_query_cache_superseded_total";
const METRIC_LOAD_FAILED: &str = "quire_query_cache_load_failed_total";

type SharedLoad = Shared<BoxFuture<'static, Result<QueryValue, QueryError>>>;

struct InFlight {
    epoch: Epoch,
    detached: Arc<AtomicBool>,
    load: SharedLoad,
}

/// Result of one load: the value for the loaded key plus entries for other
/// keys that were read in the same response.
///
/// Related entries are committed with the load's epoch, and only when the
/// primary value itself is applied.
pub(crate) struct Loaded {
    pub(crate) value: QueryValue,
    pub(crate) related: Vec<(CacheKey, QueryValue)>,
}

impl From<QueryValue> for Loaded {
    fn from(value: QueryValue) -> Self {
        Self {
            value,
            related: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Commit {
    Applied,
    Superseded,
    Detached,
}

struct CacheInner {
    config: CacheConfig,
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    in_flight: DashMap<CacheKey, InFlight>,
    observers: Mutex<HashMap<CacheKey, watch::Sender<Option<QueryValue>>>>,
    epoch_counter: AtomicU64,
}

/// Process-wide keyed cache of asynchronous results.
///
/// Cloning the handle shares the same cache.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.max_entries_non_zero();
        Self {
            inner: Arc::new(CacheInner {
                config,
                entries: Mutex::new(LruCache::new(capacity)),
                in_flight: DashMap::new(),
                observers: Mutex::new(HashMap::new()),
                epoch_counter: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Synchronous lookup. Never loads; drops the entry first if its evict
    /// timer has elapsed and nobody observes it.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.lookup(key, Instant::now())
    }

    /// Return the fresh value under `key`, loading it when absent or stale.
    ///
    /// Concurrent calls for a key share one in-flight load, and every caller
    /// receives the same value or the same error. A failed load leaves no
    /// entry behind. The load runs on its own task, so dropping the returned
    /// future does not stop the cache from being populated.
    ///
    /// `loader` is invoked while the key's in-flight slot is reserved: it must
    /// only build the future and not touch the cache synchronously.
    pub async fn fetch<F, Fut>(&self, key: CacheKey, loader: F) -> Result<QueryValue, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<QueryValue, GatewayError>> + Send + 'static,
    {
        self.fetch_loaded(key, move || {
            let pending = loader();
            async move { pending.await.map(Loaded::from) }
        })
        .await
    }

    /// `fetch` for loads that also yield related entries, such as the detail
    /// rows of a list response.
    pub(crate) async fn fetch_loaded<F, Fut>(
        &self,
        key: CacheKey,
        loader: F,
    ) -> Result<QueryValue, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Loaded, GatewayError>> + Send + 'static,
    {
        let now = Instant::now();
        if let Some(entry) = self.inner.lookup(&key, now).filter(|entry| entry.is_fresh(now)) {
            counter!(METRIC_HIT).increment(1);
            debug!(key = %key, epoch = entry.epoch, "query cache hit");
            return Ok(entry.value);
        }

        counter!(METRIC_MISS).increment(1);
        self.join_or_start(key, loader).await
    }

    /// Install `value` under `key` as a fresh entry without loading.
    pub fn seed(&self, key: CacheKey, value: QueryValue) {
        let epoch = self.inner.next_epoch();
        let outcome = self.inner.commit(&key, epoch, Loaded::from(value), None);
        debug!(key = %key, epoch, outcome = ?outcome, "seeded cache entry");
    }

    /// Mark the entry stale now. A load already in flight for the key is
    /// detached: its callers still get its result, but it is not committed
    /// and the next `fetch` starts a new load.
    pub fn invalidate(&self, key: &CacheKey) {
        let had_entry = {
            let mut entries = lock(&self.inner.entries, SOURCE, "invalidate");
            self.inner.detach(key);
            match entries.peek_mut(key) {
                Some(entry) => {
                    entry.invalidate();
                    true
                }
                None => false,
            }
        };
        info!(key = %key, had_entry, "invalidated cache entry");
    }

    /// Drop the entry under `key`, detaching any in-flight load.
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut entries = lock(&self.inner.entries, SOURCE, "remove");
        self.inner.detach(key);
        entries.pop(key)
    }

    /// Drop every entry and detach every in-flight load.
    pub fn clear(&self) {
        let mut entries = lock(&self.inner.entries, SOURCE, "clear");
        for flight in self.inner.in_flight.iter() {
            flight.detached.store(true, Ordering::SeqCst);
        }
        self.inner.in_flight.clear();
        entries.clear();
        info!("cleared query cache");
    }

    /// Register an observer for `key`, primed with the current value.
    pub fn subscribe(&self, key: CacheKey) -> QueryObserver {
        let current = self.get(&key).map(|entry| entry.value);
        let mut observers = lock(&self.inner.observers, SOURCE, "subscribe");
        let sender = observers
            .entry(key.clone())
            .or_insert_with(|| watch::channel(current.clone()).0);
        // An emptied slot is reset without waking existing observers.
        sender.send_if_modified(|slot| {
            if *slot == current {
                return false;
            }
            let primed = current.is_some();
            *slot = current;
            primed
        });
        let receiver = sender.subscribe();
        QueryObserver::new(key, receiver)
    }

    /// Drop every expired, unobserved entry. Returns how many were removed.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let observed: HashSet<CacheKey> = {
            let mut observers = lock(&self.inner.observers, SOURCE, "collect_garbage.observers");
            observers.retain(|_, sender| sender.receiver_count() > 0);
            observers.keys().cloned().collect()
        };

        let mut entries = lock(&self.inner.entries, SOURCE, "collect_garbage.entries");
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, entry)| entry.is_expired(now) && !observed.contains(*key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            counter!(METRIC_EVICT, "reason" => "expired").increment(expired.len() as u64);
            debug!(evicted = expired.len(), "swept expired cache entries");
        }
        expired.len()
    }

    /// Run `collect_garbage` every `gc_interval` until the cache is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let period = self.inner.config.gc_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                QueryCache { inner }.collect_garbage();
            }
        })
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of loads currently attached to a key.
    pub fn in_flight_len(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Keys that currently hold an entry, in no particular order.
    pub fn keys(&self) -> Vec<CacheKey> {
        lock(&self.inner.entries, SOURCE, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn join_or_start<F, Fut>(&self, key: CacheKey, loader: F) -> SharedLoad
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Loaded, GatewayError>> + Send + 'static,
    {
        match self.inner.in_flight.entry(key) {
            Entry::Occupied(occupied) => {
                counter!(METRIC_COALESCED).increment(1);
                debug!(
                    key = %occupied.key(),
                    epoch = occupied.get().epoch,
                    "joined in-flight load"
                );
                occupied.get().load.clone()
            }
            Entry::Vacant(vacant) => {
                let key = vacant.key().clone();
                let epoch = self.inner.next_epoch();
                let detached = Arc::new(AtomicBool::new(false));
                let pending = loader();

                let inner = Arc::clone(&self.inner);
                let task_detached = Arc::clone(&detached);
                let task_key = key.clone();
                let handle = tokio::spawn(async move {
                    let _slot = InFlightSlot {
                        inner: Arc::clone(&inner),
                        key: task_key.clone(),
                        epoch,
                    };
                    let result = pending.await.map_err(QueryError::from);
                    inner.settle(&task_key, epoch, &task_detached, result)
                });

                let label = key.to_string();
                let load = async move {
                    handle.await.unwrap_or_else(|err| {
                        warn!(key = %label, error = %err, "query load task aborted");
                        Err(QueryError::Aborted { key: label })
                    })
                }
                .boxed()
                .shared();

                debug!(key = %key, epoch, "started load");
                vacant.insert(InFlight {
                    epoch,
                    detached,
                    load: load.clone(),
                });
                load
            }
        }
    }
}

impl CacheInner {
    fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_observed(&self, key: &CacheKey) -> bool {
        lock(&self.observers, SOURCE, "is_observed")
            .get(key)
            .is_some_and(|sender| sender.receiver_count() > 0)
    }

    fn lookup(&self, key: &CacheKey, now: Instant) -> Option<CacheEntry> {
        let observed = self.is_observed(key);
        let mut entries = lock(&self.entries, SOURCE, "lookup");
        let expired = entries.get(key)?.is_expired(now);
        if expired && !observed {
            entries.pop(key);
            counter!(METRIC_EVICT, "reason" => "expired").increment(1);
            debug!(key = %key, "evicted expired entry on read");
            return None;
        }
        entries.peek(key).cloned()
    }

    /// Detach the in-flight load for `key`. Callers hold the entries lock.
    fn detach(&self, key: &CacheKey) {
        if let Some((_, flight)) = self.in_flight.remove(key) {
            flight.detached.store(true, Ordering::SeqCst);
            debug!(key = %key, epoch = flight.epoch, "detached in-flight load");
        }
    }

    /// Store `loaded` and its related entries at `epoch`.
    ///
    /// Nothing is written when the load was detached or a newer value already
    /// holds `key`. A related entry is skipped when its key holds a newer value.
    fn commit(
        &self,
        key: &CacheKey,
        epoch: Epoch,
        loaded: Loaded,
        detached: Option<&AtomicBool>,
    ) -> Commit {
        let Loaded { value, related } = loaded;
        let mut notifications = Vec::with_capacity(related.len() + 1);
        {
            let mut entries = lock(&self.entries, SOURCE, "commit");
            if detached.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                return Commit::Detached;
            }
            if self.is_superseded(&entries, key, epoch) {
                return Commit::Superseded;
            }

            for (related_key, related_value) in related {
                if self.is_superseded(&entries, &related_key, epoch) {
                    continue;
                }
                self.insert(&mut entries, related_key.clone(), related_value.clone(), epoch);
                notifications.push((related_key, related_value));
            }
            self.insert(&mut entries, key.clone(), value.clone(), epoch);
            notifications.push((key.clone(), value));
        }

        for (key, value) in notifications {
            self.notify(&key, value);
        }
        Commit::Applied
    }

    fn is_superseded(
        &self,
        entries: &LruCache<CacheKey, CacheEntry>,
        key: &CacheKey,
        epoch: Epoch,
    ) -> bool {
        match entries.peek(key) {
            Some(current) if current.epoch > epoch => {
                counter!(METRIC_SUPERSEDED).increment(1);
                debug!(
                    key = %key,
                    epoch,
                    current_epoch = current.epoch,
                    "dropped out-of-order commit"
                );
                true
            }
            _ => false,
        }
    }

    fn insert(
        &self,
        entries: &mut LruCache<CacheKey, CacheEntry>,
        key: CacheKey,
        value: QueryValue,
        epoch: Epoch,
    ) {
        let policy = self.config.policy_for(&key);
        let entry = CacheEntry::new(value, epoch, policy, Instant::now());
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_EVICT, "reason" => "capacity").increment(1);
            debug!(key = %evicted, "evicted least recently used entry");
        }
    }

    fn settle(
        &self,
        key: &CacheKey,
        epoch: Epoch,
        detached: &AtomicBool,
        result: Result<Loaded, QueryError>,
    ) -> Result<QueryValue, QueryError> {
        match result {
            Ok(loaded) => {
                let value = loaded.value.clone();
                let outcome = self.commit(key, epoch, loaded, Some(detached));
                debug!(key = %key, epoch, outcome = ?outcome, "load settled");
                Ok(value)
            }
            Err(err) => {
                counter!(METRIC_LOAD_FAILED).increment(1);
                warn!(key = %key, epoch, error = %err, "query load failed");
                Err(err)
            }
        }
    }

    fn notify(&self, key: &CacheKey, value: QueryValue) {
        let observers = lock(&self.observers, SOURCE, "notify");
        if let Some(sender) = observers.get(key)
            && sender.receiver_count() > 0
        {
            sender.send_replace(Some(value));
        }
    }
}

/// Releases a key's in-flight slot when its load task ends, even by panic.
struct InFlightSlot {
    inner: Arc<CacheInner>,
    key: CacheKey,
    epoch: Epoch,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        let epoch = self.epoch;
        self.inner
            .in_flight
            .remove_if(&self.key, |_, flight| flight.epoch == epoch);
    }
}
