//! Request cache: bounded, TTL-expiring, LRU-evicting store of refinement results.

use super::key::Fingerprint;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub max_size: usize,
    pub ttl: Duration,
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 50,
            ttl: Duration::from_millis(3_600_000),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    /// Creation time, refreshed on every hit.
    pub touched_at: Instant,
    pub model_id: String,
    pub input_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub max_size: usize,
    pub ttl: Duration,
}

struct CacheState {
    config: CacheConfig,
    entries: LruCache<Fingerprint, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.touched_at) > self.config.ttl
    }

    /// Drops `key` if it is present but stale. Returns whether a live entry remains.
    fn purge_if_expired(&mut self, key: &Fingerprint, now: Instant) -> bool {
        let expired = match self.entries.peek(key) {
            Some(e) => self.is_expired(e, now),
            None => return false,
        };
        if expired {
            self.entries.pop(key);
            debug!(fingerprint = %key, "cache entry expired");
        }
        !expired
    }
}

fn capacity(max_size: usize) -> NonZeroUsize {
    NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN)
}

/// Session-scoped cache keyed by [`Fingerprint`].
///
/// Recency order and `touched_at` move together: every hit promotes the entry and
/// refreshes its timestamp, so the least-recently-used entry is always the one
/// with the oldest timestamp and is the one evicted under capacity pressure.
pub struct RequestCache {
    state: Mutex<CacheState>,
}

impl RequestCache {
    pub fn new(config: CacheConfig) -> Self {
        let entries = LruCache::new(capacity(config.max_size));
        Self {
            state: Mutex::new(CacheState {
                config,
                entries,
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the cached value if present and fresh; refreshes its timestamp on a hit.
    pub fn get(&self, key: &Fingerprint) -> Option<String> {
        let now = Instant::now();
        let mut st = self.state();
        if !st.config.enabled || !st.purge_if_expired(key, now) {
            st.misses += 1;
            return None;
        }
        let value = st.entries.get_mut(key).map(|e| {
            e.touched_at = now;
            e.value.clone()
        });
        if value.is_some() {
            st.hits += 1;
        } else {
            st.misses += 1;
        }
        value
    }

    /// Like [`get`](Self::get) but leaves the hit/miss counters alone. Used when
    /// a request looks the same key up again after its first lookup was counted.
    pub fn peek(&self, key: &Fingerprint) -> Option<String> {
        let now = Instant::now();
        let mut st = self.state();
        if !st.config.enabled || !st.purge_if_expired(key, now) {
            return None;
        }
        st.entries.get_mut(key).map(|e| {
            e.touched_at = now;
            e.value.clone()
        })
    }

    /// Same expiry semantics as [`get`](Self::get), without counters or promotion.
    pub fn has(&self, key: &Fingerprint) -> bool {
        let mut st = self.state();
        st.config.enabled && st.purge_if_expired(key, Instant::now())
    }

    /// Inserts a value, evicting the least recently touched entry when full.
    pub fn set(
        &self,
        key: Fingerprint,
        value: impl Into<String>,
        model_id: impl Into<String>,
        input_length: usize,
    ) {
        let mut st = self.state();
        if !st.config.enabled {
            return;
        }
        let entry = CacheEntry {
            value: value.into(),
            touched_at: Instant::now(),
            model_id: model_id.into(),
            input_length,
        };
        if let Some((evicted, _)) = st.entries.push(key.clone(), entry) {
            if evicted != key {
                debug!(fingerprint = %evicted, "cache entry evicted (capacity)");
            }
        }
    }

    pub fn remove(&self, key: &Fingerprint) -> bool {
        self.state().entries.pop(key).is_some()
    }

    /// Removes every expired entry regardless of capacity.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut st = self.state();
        let expired: Vec<Fingerprint> = st
            .entries
            .iter()
            .filter(|(_, e)| st.is_expired(e, now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            st.entries.pop(k);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "pruned expired cache entries");
        }
        expired.len()
    }

    /// Empties the store and resets hit/miss counters.
    pub fn clear(&self) {
        let mut st = self.state();
        st.entries.clear();
        st.hits = 0;
        st.misses = 0;
    }

    /// Lifecycle alias for [`clear`](Self::clear).
    pub fn reset(&self) {
        self.clear();
    }

    /// Applies new limits immediately; shrinking evicts least recently used entries.
    pub fn reconfigure(&self, config: CacheConfig) {
        let mut st = self.state();
        let before = st.entries.len();
        st.entries.resize(capacity(config.max_size));
        if !config.enabled {
            st.entries.clear();
        }
        let evicted = before.saturating_sub(st.entries.len());
        if evicted > 0 {
            debug!(evicted, max_size = config.max_size, "cache reconfigured");
        }
        st.config = config;
    }

    pub fn config(&self) -> CacheConfig {
        self.state().config.clone()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let st = self.state();
        let total = st.hits + st.misses;
        CacheStats {
            size: st.entries.len(),
            hits: st.hits,
            misses: st.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                st.hits as f64 / total as f64
            },
            max_size: st.config.max_size,
            ttl: st.config.ttl,
        }
    }
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
