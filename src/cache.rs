use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Duration;
use tracing::info;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of the current instant, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: StdMutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: StdMutex::new(Instant::now()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub enabled: bool,
    pub ttl: Duration,
    /// Let concurrent misses on one key share a single fetch.
    pub coalesce: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_TTL,
            coalesce: false,
        }
    }
}

struct Entry<V> {
    fetched_at: Instant,
    value: Arc<V>,
}

pub struct Cache<K, V> {
    enabled: bool,
    coalesce: bool,
    inner: RwLock<HashMap<K, Entry<V>>>,
    in_flight: Mutex<HashMap<K, Arc<Mutex<()>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> Cache<K, V>
where
    K: Clone + Debug + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            enabled: config.enabled,
            coalesce: config.coalesce,
            ttl: config.ttl,
            clock,
            inner: Default::default(),
            in_flight: Default::default(),
        })
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.fetched_at) < self.ttl
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub async fn insert(&self, key: K, value: V) -> Arc<V> {
        let arcd = Arc::new(value);
        if !self.enabled {
            return arcd;
        }

        let entry = Entry {
            fetched_at: self.clock.now(),
            value: Arc::clone(&arcd),
        };
        self.inner.write().await.insert(key, entry);

        arcd
    }

    /// The value under `key` unless it has outlived the TTL. Expired entries
    /// are dropped on the way.
    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        if !self.enabled {
            return None;
        }

        let now = self.clock.now();
        {
            let inner = self.inner.read().await;
            match inner.get(key) {
                Some(entry) if self.is_fresh(entry, now) => return Some(Arc::clone(&entry.value)),
                None => return None,
                Some(_) => {}
            }
        }

        let mut inner = self.inner.write().await;
        if inner.get(key).is_some_and(|entry| !self.is_fresh(entry, now)) {
            inner.remove(key);
        }
        None
    }

    /// Cached value for `key`, or the result of `fetch` stored in its place.
    /// `force` skips the lookup. A failed fetch leaves the cache untouched.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, force: bool, fetch: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if !force {
            if let Some(hit) = self.get(&key).await {
                info!(?key, "cache hit");
                return Ok(hit);
            }
        }

        if !(self.enabled && self.coalesce) {
            info!(?key, force, "cache miss");
            let value = fetch().await?;
            return Ok(self.store(key, value).await);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key.clone()).or_default())
        };
        let _turn = gate.lock().await;

        if !force {
            if let Some(hit) = self.get(&key).await {
                info!(?key, "cache hit after waiting on a concurrent fetch");
                return Ok(hit);
            }
        }

        info!(?key, force, "cache miss");
        let fetched = match fetch().await {
            Ok(value) => Ok(self.store(key.clone(), value).await),
            Err(err) => Err(err),
        };

        // the gate goes only once waiters can see the stored value
        self.in_flight.lock().await.remove(&key);
        fetched
    }

    async fn store(&self, key: K, value: V) -> Arc<V> {
        if self.enabled {
            info!(?key, "cache store");
        }
        self.insert(key, value).await
    }

    /// Drops every entry whose key matches, returning how many went.
    pub async fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|key, _| !predicate(key));
        before - inner.len()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, entry| self.is_fresh(entry, now));
        before - inner.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
