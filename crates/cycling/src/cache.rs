// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded caches for hot parse and navigation paths

use indexmap::IndexMap;
use std::hash::Hash;

/// An insertion-ordered map that evicts its stalest entry once full.
///
/// Hits are moved to the back, so the front is always the least recently
/// used entry. Capacities are small (hundreds to low thousands) and the
/// occasional `shift_remove_index(0)` shuffle is cheap at that size.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    map: IndexMap<K, V>,
    capacity: usize,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: IndexMap::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Look up `key`, refreshing its recency on a hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let index = self.map.get_index_of(key)?;
        let back = self.map.len() - 1;
        self.map.move_index(index, back);
        self.map.get_index(back).map(|(_, v)| v.clone())
    }

    /// Insert or refresh an entry, evicting the stalest one if full.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(index) = self.map.get_index_of(&key) {
            self.map[index] = value;
            let back = self.map.len() - 1;
            self.map.move_index(index, back);
            return;
        }
        if self.map.len() >= self.capacity {
            self.map.shift_remove_index(0);
        }
        self.map.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
