//! Bounded dedupe cache with TTL and max-size eviction
//!
//! Remembers which burns and deposits the relay already handled during this
//! run, without growing without bound. Durable dedupe lives on the ledger
//! (recorded burn entries); this cache only saves repeated work between ticks.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Default entry lifetime (24h)
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Cache of keys with TTL and capacity limits.
///
/// On insert at capacity, expired entries are evicted first, then the oldest
/// remaining entry by insertion time.
#[derive(Debug)]
pub struct BoundedCache<K> {
    map: HashMap<K, Instant>,
    max_size: usize,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone> BoundedCache<K> {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            map: HashMap::new(),
            max_size: max_size.max(1),
            ttl,
        }
    }

    /// Returns true if the key is present and not expired.
    pub fn contains(&self, key: &K) -> bool {
        self.map.get(key).is_some_and(|&t| t.elapsed() < self.ttl)
    }

    /// Insert a key, returning false if it was already present and live.
    pub fn insert(&mut self, key: K) -> bool {
        if self.contains(&key) {
            return false;
        }

        let now = Instant::now();
        self.map.retain(|_, &mut t| now.duration_since(t) < self.ttl);

        while self.map.len() >= self.max_size {
            let oldest = self.map.iter().min_by_key(|(_, t)| **t).map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    self.map.remove(&k);
                }
                None => break,
            }
        }

        self.map.insert(key, now);
        true
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
