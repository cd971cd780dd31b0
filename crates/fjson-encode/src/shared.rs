//! Shared containers with interior synchronization.
//!
//! Both containers take `&self` for every operation: callers — including the
//! harness's mutator and encoder-driver threads — never add locking of their
//! own. Mutation and traversal hold a container-internal lock only long
//! enough to read or update one structural unit, mirroring the short
//! critical-section snapshot the encoder's traversal path relies on.
//!
//! [`SharedMap`] is sharded so that concurrent inserts, deletes, and
//! traversals contend on independent locks; a whole-map snapshot locks one
//! shard at a time and may therefore observe transient cross-shard state.
//! That is deliberate: per-shard reads are internally consistent (no torn
//! nodes), and nothing stronger is promised.

use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash, Hasher};

use parking_lot::RwLock;

/// Number of independently locked shards in a [`SharedMap`].
const SHARD_COUNT: usize = 16;

/// Ordered sequence of integers, safe for concurrent mutation and traversal.
#[derive(Debug, Default)]
pub struct SharedSeq {
    inner: RwLock<Vec<i64>>,
}

impl SharedSeq {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence seeded with `0..len`.
    #[must_use]
    pub fn seeded(len: usize) -> Self {
        let values = (0..len).map(|i| i as i64).collect();
        Self {
            inner: RwLock::new(values),
        }
    }

    /// Append a value at the back.
    pub fn push(&self, value: i64) {
        self.inner.write().push(value);
    }

    /// Remove and return the most recently appended value.
    pub fn pop(&self) -> Option<i64> {
        self.inner.write().pop()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Consistent point-in-time copy of the sequence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<i64> {
        self.inner.read().clone()
    }
}

/// Mapping from short string keys to integers, sharded for concurrency.
#[derive(Debug)]
pub struct SharedMap {
    shards: Vec<RwLock<HashMap<String, i64>>>,
    hasher: RandomState,
}

impl Default for SharedMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMap {
    #[must_use]
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Map seeded with `"0".."len"` keys mapping to their own index.
    #[must_use]
    pub fn seeded(len: usize) -> Self {
        let map = Self::new();
        for i in 0..len {
            map.insert(i.to_string(), i as i64);
        }
        map
    }

    fn shard_for(&self, key: &str) -> &RwLock<HashMap<String, i64>> {
        let mut hasher = self.hasher.build_hasher();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % SHARD_COUNT;
        &self.shards[index]
    }

    /// Insert or overwrite a key. Returns the previous value, if any.
    pub fn insert(&self, key: String, value: i64) -> Option<i64> {
        self.shard_for(&key).write().insert(key, value)
    }

    /// Remove a key. Absent keys are a no-op returning `None`.
    pub fn remove(&self, key: &str) -> Option<i64> {
        self.shard_for(key).write().remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<i64> {
        self.shard_for(key).read().get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    /// Key-ordered copy of the map.
    ///
    /// Shards are read one at a time, so entries inserted or removed in
    /// other shards while the snapshot is in progress may or may not appear.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        let mut out = BTreeMap::new();
        for shard in &self.shards {
            for (key, value) in shard.read().iter() {
                out.insert(key.clone(), *value);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{SharedMap, SharedSeq};

    #[test]
    fn seq_push_pop_snapshot() {
        let seq = SharedSeq::seeded(3);
        seq.push(10);
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.pop(), Some(10));
        assert_eq!(seq.snapshot(), vec![0, 1, 2]);
        assert!(!seq.is_empty());
    }

    #[test]
    fn empty_seq_pop_is_none() {
        let seq = SharedSeq::new();
        assert!(seq.is_empty());
        assert_eq!(seq.pop(), None);
    }

    #[test]
    fn map_insert_remove_get() {
        let map = SharedMap::seeded(8);
        assert_eq!(map.len(), 8);
        assert_eq!(map.get("3"), Some(3));
        assert_eq!(map.insert("3".to_owned(), 33), Some(3));
        assert_eq!(map.remove("3"), Some(33));
        assert_eq!(map.remove("3"), None);
        assert_eq!(map.len(), 7);
    }

    #[test]
    fn map_snapshot_is_key_ordered() {
        let map = SharedMap::new();
        map.insert("b".to_owned(), 2);
        map.insert("a".to_owned(), 1);
        map.insert("c".to_owned(), 3);
        let snapshot = map.snapshot();
        let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn map_seeded_covers_all_keys() {
        let map = SharedMap::seeded(256);
        for i in 0..256 {
            assert_eq!(map.get(&i.to_string()), Some(i as i64));
        }
    }
}
