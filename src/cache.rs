use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Configuration for the response cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a cached response stays valid
    pub expiry: Duration,
    /// Maximum number of entries before oldest-entry eviction
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            expiry: Duration::from_secs(5 * 60),
            capacity: 50,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    stored_at: Instant,
    /// Insertion order, used to pick the eviction victim
    seq: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

/// Bounded in-memory cache for idempotent GET responses.
///
/// Entries expire individually; once the capacity ceiling is reached the
/// oldest entry is evicted. The whole cache is invalidated wholesale when
/// session/auth state changes.
pub struct ResponseCache {
    config: CacheConfig,
    inner: RwLock<CacheInner>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        ResponseCache {
            config,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Get a cached response if present and not expired
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let inner = self.inner.read().await;
        let entry = inner.entries.get(key)?;

        if entry.stored_at.elapsed() >= self.config.expiry {
            debug!("ResponseCache: entry expired for {}", key);
            return None;
        }

        debug!("ResponseCache: hit for {}", key);
        Some(entry.value.clone())
    }

    /// Store a response, evicting the oldest entry at capacity
    pub async fn put(&self, key: &str, value: serde_json::Value) {
        let mut inner = self.inner.write().await;

        while inner.entries.len() >= self.config.capacity
            && !inner.entries.contains_key(key)
            && !inner.entries.is_empty()
        {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!("ResponseCache: evicting oldest entry {}", oldest);
                inner.entries.remove(&oldest);
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                seq,
            },
        );
    }

    /// Drop every entry whose key starts with the given prefix
    pub async fn clear_prefix(&self, prefix: &str) {
        let mut inner = self.inner.write().await;
        inner.entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Drop all entries (called whenever session/auth state changes)
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        debug!("ResponseCache: cleared all entries");
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}
