//! Time-bounded, single-flight memoization of async fetches.

use crate::error::FetchError;
use crate::utils::clock::{Clock, SystemClock};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

type SharedFetch<V> = Shared<BoxFuture<'static, Result<Arc<V>, FetchError>>>;

/// A value installed by a successful fetch.
pub struct CacheEntry<V> {
    value: Arc<V>,
    /// `None` when `now + ttl` does not fit in an `Instant`.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            expires_at: self.expires_at,
        }
    }
}

struct Inflight<V> {
    id: u64,
    fetch: SharedFetch<V>,
}

struct Slot<V> {
    entry: Option<CacheEntry<V>>,
    inflight: Option<Inflight<V>>,
}

enum Lookup<V> {
    Hit(Arc<V>),
    Join(SharedFetch<V>),
    Miss,
}

impl<V> Default for Slot<V> {
    fn default() -> Self {
        Self {
            entry: None,
            inflight: None,
        }
    }
}

/// Async memoizer with per-key expiry and at most one fetch in flight per key.
///
/// A fresh value is served without suspending. A missing or expired key
/// starts exactly one producer call; every caller arriving while it runs
/// awaits that same call and receives the same `Arc` (or the same error).
/// A failed fetch stores nothing, so the next call retries.
///
/// The shared fetch is driven by a spawned task, so a caller that gives up
/// waiting does not cancel it for the others. `get` therefore has to run
/// inside a tokio runtime.
///
/// # Example
///
/// ```no_run
/// use cfw_guide::TtlCache;
/// use std::time::Duration;
///
/// # async fn demo() -> Result<(), cfw_guide::FetchError> {
/// let cache: TtlCache<&'static str, Vec<String>> = TtlCache::new();
/// let apps = cache
///     .get("apps", || async { Ok(vec!["Dopamine".to_string()]) }, Duration::from_secs(3600))
///     .await?;
/// assert_eq!(apps.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct TtlCache<K, V> {
    slots: Arc<DashMap<K, Slot<V>>>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Option<Duration>,
    next_fetch_id: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            clock,
            fetch_timeout: None,
            next_fetch_id: AtomicU64::new(0),
        }
    }

    /// Fail a fetch with [`FetchError::Timeout`] if the producer takes longer than `timeout`.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Returns the cached value for `key`, fetching it with `producer` if it
    /// is missing or expired.
    ///
    /// `producer` is called only when no fresh value or in-flight fetch was
    /// found, and never under a lock, so it may read this cache. If another
    /// caller registers a fetch first, the future it returned is dropped
    /// unpolled. `ttl` is measured from the moment the fetch completes; zero
    /// disables caching.
    pub async fn get<F, Fut>(&self, key: K, producer: F, ttl: Duration) -> Result<Arc<V>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let pending = match self.lookup(&key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Join(fetch) => return fetch.await,
            Lookup::Miss => producer(),
        };

        let (fetch, started) = {
            let now = self.clock.now();
            let mut slot = self.slots.entry(key.clone()).or_default();

            if let Some(entry) = slot.entry.as_ref().filter(|entry| entry.is_fresh(now)) {
                debug!(?key, "filled while preparing fetch");
                return Ok(Arc::clone(&entry.value));
            }

            match &slot.inflight {
                Some(inflight) => {
                    debug!(?key, "joining fetch registered while preparing ours");
                    (inflight.fetch.clone(), false)
                }
                None => {
                    debug!(?key, "cache miss, starting fetch");
                    let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                    let fetch = self.start_fetch(key, id, pending, ttl);
                    slot.inflight = Some(Inflight {
                        id,
                        fetch: fetch.clone(),
                    });
                    (fetch, true)
                }
            }
        };

        if started {
            tokio::spawn(fetch.clone().map(|_| ()));
        }

        fetch.await
    }

    /// The fresh cached value for `key`, if any. Never starts a fetch.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        let now = self.clock.now();
        let slot = self.slots.get(key)?;
        slot.entry
            .as_ref()
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Whether a fetch for `key` is currently registered.
    pub fn is_fetching(&self, key: &K) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.inflight.is_some())
    }

    /// Drops the entry for `key`.
    ///
    /// Callers already joined on an in-flight fetch still receive its result,
    /// but that result is not installed.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.slots.remove(key).is_some();
        if removed {
            debug!(?key, "invalidated cache entry");
        }
        removed
    }

    pub fn clear(&self) {
        let count = self.slots.len();
        self.slots.clear();
        debug!(cleared = count, "cleared cache");
    }

    /// Removes expired entries that have no fetch in flight.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            slot.inflight.is_some() || slot.entry.as_ref().is_some_and(|entry| entry.is_fresh(now))
        });
        let removed = before.saturating_sub(self.slots.len());
        if removed > 0 {
            debug!(removed, remaining = self.slots.len(), "purged expired cache entries");
        }
        removed
    }

    /// Number of keys with a cached value or a fetch in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn lookup(&self, key: &K) -> Lookup<V> {
        let now = self.clock.now();
        let Some(slot) = self.slots.get(key) else {
            return Lookup::Miss;
        };
        if let Some(entry) = slot.entry.as_ref().filter(|entry| entry.is_fresh(now)) {
            debug!(?key, "cache hit");
            return Lookup::Hit(Arc::clone(&entry.value));
        }
        match &slot.inflight {
            Some(inflight) => {
                debug!(?key, "joining in-flight fetch");
                Lookup::Join(inflight.fetch.clone())
            }
            None => Lookup::Miss,
        }
    }

    fn start_fetch<Fut>(&self, key: K, id: u64, producer: Fut, ttl: Duration) -> SharedFetch<V>
    where
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let clock = Arc::clone(&self.clock);
        let timeout = self.fetch_timeout;

        async move {
            let bounded = async move {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, producer)
                        .await
                        .unwrap_or_else(|_| Err(FetchError::Timeout(limit))),
                    None => producer.await,
                }
            };
            let outcome = AssertUnwindSafe(bounded)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(FetchError::Panicked(panic_message(panic.as_ref()))))
                .map(Arc::new);

            // The slot may have been invalidated, or replaced by a newer fetch.
            if let Some(mut slot) = slots.get_mut(&key) {
                if slot.inflight.as_ref().is_some_and(|inflight| inflight.id == id) {
                    slot.inflight = None;
                    if let Ok(value) = &outcome {
                        slot.entry = Some(CacheEntry {
                            value: Arc::clone(value),
                            expires_at: clock.now().checked_add(ttl),
                        });
                    }
                }
            }

            match &outcome {
                Ok(_) => debug!(?key, ?ttl, "fetch complete"),
                Err(err) => warn!(?key, error = %err, "fetch failed"),
            }
            outcome
        }
        .boxed()
        .shared()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

type Producer<V> = Box<dyn Fn() -> BoxFuture<'static, Result<V, FetchError>> + Send + Sync>;

/// A cache key bound to its TTL and the fetch that fills it.
///
/// Call sites hold one of these instead of repeating the key, TTL and
/// producer at every `get`.
pub struct CachedFetch<K, V> {
    cache: Arc<TtlCache<K, V>>,
    key: K,
    ttl: Duration,
    producer: Producer<V>,
}

impl<K, V> CachedFetch<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new<F, Fut>(cache: Arc<TtlCache<K, V>>, key: K, ttl: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        Self {
            cache,
            key,
            ttl,
            producer: Box::new(move || fetch().boxed()),
        }
    }

    pub async fn get(&self) -> Result<Arc<V>, FetchError> {
        self.cache
            .get(self.key.clone(), || (self.producer)(), self.ttl)
            .await
    }

    pub fn invalidate(&self) -> bool {
        self.cache.invalidate(&self.key)
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
