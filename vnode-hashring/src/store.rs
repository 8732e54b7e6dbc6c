use crate::HashValue;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Ordered map from ring positions to values.
///
/// Lookups that walk clockwise (`ceiling`, `successor`, `walk_from`) wrap from
/// the largest position back to the smallest. Nothing here returns an error:
/// an absent entry is `None`.
#[derive(Debug, Clone)]
pub struct RingStore<V> {
    entries: BTreeMap<HashValue, V>,
}

impl<V> Default for RingStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RingStore<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert or overwrite, returning the previous value at `key`.
    pub fn put(&mut self, key: HashValue, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: HashValue) -> Option<V> {
        self.entries.remove(&key)
    }

    pub fn get(&self, key: HashValue) -> Option<&V> {
        self.entries.get(&key)
    }

    /// Smallest stored key that is `>= key`. Does not wrap.
    pub fn ceiling(&self, key: HashValue) -> Option<(HashValue, &V)> {
        self.entries
            .range(key..)
            .next()
            .map(|(k, v)| (*k, v))
    }

    /// Largest stored key that is `<= key`. Does not wrap.
    pub fn floor(&self, key: HashValue) -> Option<(HashValue, &V)> {
        self.entries
            .range(..=key)
            .next_back()
            .map(|(k, v)| (*k, v))
    }

    pub fn first(&self) -> Option<(HashValue, &V)> {
        self.entries.iter().next().map(|(k, v)| (*k, v))
    }

    pub fn last(&self) -> Option<(HashValue, &V)> {
        self.entries.iter().next_back().map(|(k, v)| (*k, v))
    }

    /// Clockwise successor: `ceiling(key)`, or `first()` once the walk passes
    /// the largest position. `None` only when the store is empty.
    pub fn successor(&self, key: HashValue) -> Option<(HashValue, &V)> {
        self.ceiling(key).or_else(|| self.first())
    }

    /// Counter-clockwise predecessor: the largest key strictly below `key`,
    /// wrapping to `last()`. `None` only when the store is empty.
    pub fn predecessor(&self, key: HashValue) -> Option<(HashValue, &V)> {
        self.entries
            .range((Bound::Unbounded, Bound::Excluded(key)))
            .next_back()
            .map(|(k, v)| (*k, v))
            .or_else(|| self.last())
    }

    /// Every entry once, in clockwise order starting at `ceiling(key)`.
    pub fn walk_from(&self, key: HashValue) -> impl Iterator<Item = (HashValue, &V)> + '_ {
        self.entries
            .range(key..)
            .chain(self.entries.range(..key))
            .map(|(k, v)| (*k, v))
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (HashValue, &V)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
