//! Small ordered maps and sets, one per basic block, for control-flow edge storage.
//!
//! Grounded on the forest-of-B+-trees crate the control-flow graph builder this project descends
//! from uses to store one predecessor map and one successor set per block without a heap
//! allocation apiece: most blocks have one or two edges, so a shared compact representation beats
//! a `HashMap`/`HashSet` per block. This crate reaches the same goal with a plain sorted `Vec`
//! per map/set instead of a shared B+-tree arena — a basic block's edge count is small enough in
//! practice that the asymptotic advantage of sharing node storage across many instances does not
//! pay for the extra indirection, so `Map`/`Set` here own their storage directly. The API shape
//! (`insert`, `remove`, `contains`, iteration, `retain`) mirrors the teacher crate's so callers
//! that have used one recognize the other.

/// A small ordered map from `K` to `V`, backed by a sorted vector of pairs.
#[derive(Clone, Debug)]
pub struct Map<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Map<K, V>
where
    K: Ord + Copy,
{
    /// Create a new, empty map.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Is the map empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn search(&self, key: K) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&key, |(k, _)| *k)
    }

    /// Look up the value for `key`.
    pub fn get(&self, key: K) -> Option<&V> {
        self.search(key).ok().map(|idx| &self.entries[idx].1)
    }

    /// Insert `key -> value`, returning the previous value if `key` was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.search(key) {
            Ok(idx) => Some(std::mem::replace(&mut self.entries[idx].1, value)),
            Err(pos) => {
                self.entries.insert(pos, (key, value));
                None
            }
        }
    }

    /// Remove `key`, returning its value if present.
    pub fn remove(&mut self, key: K) -> Option<V> {
        match self.search(key) {
            Ok(idx) => Some(self.entries.remove(idx).1),
            Err(_) => None,
        }
    }

    /// Remove every entry for which `predicate` returns `false`.
    pub fn retain(&mut self, mut predicate: impl FnMut(K, &V) -> bool) {
        self.entries.retain(|(k, v)| predicate(*k, v));
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Iterate over keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }
}

impl<K, V> Default for Map<K, V>
where
    K: Ord + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A small ordered set of `K`, backed by a sorted vector.
#[derive(Clone, Debug)]
pub struct Set<K> {
    entries: Vec<K>,
}

impl<K> Set<K>
where
    K: Ord + Copy,
{
    /// Create a new, empty set.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Does the set contain `key`?
    pub fn contains(&self, key: K) -> bool {
        self.entries.binary_search(&key).is_ok()
    }

    /// Insert `key`. Returns `true` if it was not already present.
    pub fn insert(&mut self, key: K) -> bool {
        match self.entries.binary_search(&key) {
            Ok(_) => false,
            Err(pos) => {
                self.entries.insert(pos, key);
                true
            }
        }
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn remove(&mut self, key: K) -> bool {
        match self.entries.binary_search(&key) {
            Ok(idx) => {
                self.entries.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove every member for which `predicate` returns `false`.
    pub fn retain(&mut self, mut predicate: impl FnMut(K) -> bool) {
        self.entries.retain(|k| predicate(*k));
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().copied()
    }
}

impl<K> Default for Set<K>
where
    K: Ord + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_insert_get_remove() {
        let mut m: Map<u32, &str> = Map::new();
        assert_eq!(m.insert(2, "two"), None);
        assert_eq!(m.insert(1, "one"), None);
        assert_eq!(m.get(1), Some(&"one"));
        assert_eq!(m.insert(1, "uno"), Some("one"));
        let keys: Vec<u32> = m.keys().collect();
        assert_eq!(keys, vec![1, 2]);
        assert_eq!(m.remove(2), Some("two"));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn map_retain_matches_invalidation_pattern() {
        let mut m: Map<u32, u32> = Map::new();
        for i in 0..5 {
            m.insert(i, i * 10);
        }
        m.retain(|k, _| k != 2);
        let keys: Vec<u32> = m.keys().collect();
        assert_eq!(keys, vec![0, 1, 3, 4]);
    }

    #[test]
    fn set_insert_contains_remove() {
        let mut s: Set<u32> = Set::new();
        assert!(s.insert(3));
        assert!(!s.insert(3));
        assert!(s.contains(3));
        assert!(s.remove(3));
        assert!(!s.contains(3));
    }

    #[test]
    fn set_stays_sorted() {
        let mut s: Set<u32> = Set::new();
        for i in [5, 1, 4, 2, 3] {
            s.insert(i);
        }
        let values: Vec<u32> = s.iter().collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }
}
