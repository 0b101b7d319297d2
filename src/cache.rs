use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use crate::config::ConfigError;

/// Counters reported in the run summary. `accesses == hits + misses` holds
/// after every `get`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
}

struct LruInner<K, V> {
    store: HashMap<K, V>,
    // Front is least recently used, back is most recently used.
    order: VecDeque<K>,
    accesses: u64,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash + Clone, V> LruInner<K, V> {
    fn promote(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.clone());
    }
}

/// Thread-safe bounded memo for link-check outcomes. A single lock guards
/// the map, the recency order and the counters, so no caller ever observes a
/// partially updated structure.
pub struct LruCache<K, V> {
    max_size: usize,
    inner: Mutex<LruInner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(max_size: usize) -> Result<Self, ConfigError> {
        if max_size == 0 {
            return Err(ConfigError::InvalidCacheCapacity(max_size));
        }
        Ok(Self {
            max_size,
            inner: Mutex::new(LruInner {
                store: HashMap::new(),
                order: VecDeque::new(),
                accesses: 0,
                hits: 0,
                misses: 0,
            }),
        })
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Look up a key, counting the access and promoting the entry to most
    /// recently used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.accesses += 1;
        if let Some(value) = inner.store.get(key).cloned() {
            inner.hits += 1;
            inner.promote(key);
            Some(value)
        } else {
            inner.misses += 1;
            None
        }
    }

    /// Insert or overwrite. Overwrites promote the key; inserts that push the
    /// cache past capacity evict the single least recently used entry.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.store.insert(key.clone(), value);
        inner.promote(&key);
        if inner.store.len() > self.max_size
            && let Some(oldest) = inner.order.pop_front()
        {
            inner.store.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock poisoned");
        let hit_ratio = if inner.accesses > 0 {
            inner.hits as f64 / inner.accesses as f64
        } else {
            0.0
        };
        CacheStats {
            accesses: inner.accesses,
            hits: inner.hits,
            misses: inner.misses,
            hit_ratio,
        }
    }
}
