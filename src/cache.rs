//! Bounded in-memory map for transient correlation state.
//!
//! Entries expire after `max_age`; when `capacity` is reached the oldest
//! entry is evicted on insert.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted: Instant,
}

pub struct BoundedCache<K, V> {
    inner: Mutex<HashMap<K, Entry<V>>>,
    capacity: usize,
    max_age: Duration,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            max_age,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn insert_at(&self, key: K, value: V, now: Instant) {
        let mut map = self.inner.lock();
        map.retain(|_, e| now.saturating_duration_since(e.inserted) < self.max_age);
        if !map.contains_key(&key) && map.len() >= self.capacity {
            let oldest = map
                .iter()
                .min_by_key(|(_, e)| e.inserted)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                map.remove(&oldest);
            }
        }
        map.insert(key, Entry { value, inserted: now });
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut map = self.inner.lock();
        let expired = match map.get(key) {
            Some(e) if now.saturating_duration_since(e.inserted) < self.max_age => {
                return Some(e.value.clone())
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            map.remove(key);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
