use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.fetched_at)
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Keyed value cache with one TTL for every slot.
///
/// A fresh slot is served without calling the fetcher. An expired or empty
/// slot blocks on the fetcher; there is no stale-while-revalidate. The slot
/// lock is never held across a fetch, so two concurrent misses both fetch
/// and whichever resolves last wins the slot.
pub struct TimedCache<V> {
    ttl: Duration,
    slots: RwLock<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TimedCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The slot's value, only while it is within TTL.
    pub async fn get_fresh(&self, key: &str) -> Option<V> {
        let slots = self.slots.read().await;
        slots
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.value.clone())
    }

    /// The slot's entry regardless of age.
    pub async fn peek(&self, key: &str) -> Option<CacheEntry<V>> {
        self.slots.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: &str, value: V) {
        let entry = CacheEntry {
            value,
            fetched_at: Instant::now(),
        };
        self.slots.write().await.insert(key.to_string(), entry);
    }

    pub async fn invalidate(&self, key: &str) {
        self.slots.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }

    /// Serve the slot if fresh, otherwise fetch and store. A failed fetch
    /// leaves the previous entry and its timestamp untouched.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get_fresh(key).await {
            debug!("Cache hit for {}", key);
            return Ok(value);
        }

        debug!("Cache miss for {}, fetching", key);
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }
}
