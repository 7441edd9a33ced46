//! The public façade: owns the root, the two allocators, and the
//! insert/lookup traversal.

use std::fmt;
use std::hash::Hash;
use std::ops::Index;

use arrayvec::ArrayVec;

use crate::arena::{NodeArena, NodePtr};
use crate::hash::{chunk, default_hash, HASH_MASK};
use crate::node::{Internal, Leaf, Node};
use crate::pool::{ChildrenPool, PoolStats};

/// Fixed trie depth: ten levels of six bits address the sixty usable
/// bits of a hash exactly.
pub const MAX_LEVEL: usize = 10;

/// Longest possible root-to-leaf path: MAX_LEVEL internal nodes plus
/// the leaf itself. Bounds the traversal stack used by [`Iter`].
const MAX_PATH_LEN: usize = MAX_LEVEL + 1;

/// Default slab size for the child-pointer pool.
pub const DEFAULT_POOL_CAPACITY: usize = 4_000_000;

/// Default node count per arena block.
pub const DEFAULT_ARENA_BLOCK: usize = 1024;

/// Constructor knobs for [`Map`]: allocator sizing plus an optional
/// custom hash function.
pub struct MapConfig<K> {
    pub pool_capacity: usize,
    pub arena_block: usize,
    pub hash_fn: Option<Box<dyn Fn(&K) -> u64>>,
}

impl<K> Default for MapConfig<K> {
    fn default() -> Self {
        MapConfig {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            arena_block: DEFAULT_ARENA_BLOCK,
            hash_fn: None,
        }
    }
}

/// Structural snapshot of the trie, used by the test suite's structural
/// assertions and not on the hot path.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TreeStats {
    pub entries: usize,
    pub max_observed_depth: usize,
    pub internal_count: usize,
    pub leaf_count: usize,
    pub avg_children_per_internal: f64,
    pub total_child_pointers: usize,
}

/// An in-memory associative map implemented as a Hash Array Mapped
/// Trie. Single-threaded; not safe for concurrent mutation.
pub struct Map<K, V>
where
    K: Eq + Hash,
{
    root: NodePtr<K, V>,
    arena: NodeArena<K, V>,
    pool: ChildrenPool<K, V>,
    hash_fn: Option<Box<dyn Fn(&K) -> u64>>,
    size: usize,
}

impl<K, V> Map<K, V>
where
    K: Eq + Hash,
{
    /// An empty map using the default hash and default allocator
    /// sizes.
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }

    /// An empty map that hashes keys with `hash_fn` instead of the
    /// default SipHash. Allocator sizes remain at their defaults.
    pub fn with_hash_fn(hash_fn: impl Fn(&K) -> u64 + 'static) -> Self {
        Self::with_config(MapConfig {
            hash_fn: Some(Box::new(hash_fn)),
            ..MapConfig::default()
        })
    }

    /// An empty map with full control over the allocator sizes and
    /// hash function.
    pub fn with_config(config: MapConfig<K>) -> Self {
        let mut arena = NodeArena::new(config.arena_block);
        let pool = ChildrenPool::new(config.pool_capacity);

        let root = arena.allocate();
        unsafe {
            root.as_ptr().write(Node::Internal(Internal::empty()));
        }

        Map {
            root,
            arena,
            pool,
            hash_fn: config.hash_fn,
            size: 0,
        }
    }

    fn hash(&self, key: &K) -> u64 {
        let raw = match &self.hash_fn {
            Some(f) => f(key),
            None => default_hash(key),
        };
        raw & HASH_MASK
    }

    /// Inserts `key -> value`. If `key` was already present its value
    /// is overwritten and `len()` is unchanged; otherwise `len()`
    /// increases by one.
    pub fn insert(&mut self, key: K, value: V) {
        let h = self.hash(&key);
        let mut current = self.root;

        for level in 0..MAX_LEVEL {
            let c = chunk(h, level);
            let internal = unsafe {
                match current.as_mut() {
                    Node::Internal(internal) => internal,
                    Node::Leaf(_) => {
                        unreachable!("invariant violation: expected internal node at level {level}")
                    }
                }
            };

            current = match internal.get_child(c) {
                Some(child) => child,
                None => internal.add_child(c, &mut self.arena, &mut self.pool, level < MAX_LEVEL - 1),
            };
        }

        let leaf = unsafe {
            match current.as_mut() {
                Node::Leaf(leaf) => leaf,
                Node::Internal(_) => unreachable!("invariant violation: expected leaf at level {MAX_LEVEL}"),
            }
        };

        if leaf.add(key, value) {
            self.size += 1;
        }
    }

    fn walk_to_leaf(&self, key: &K) -> Option<&Leaf<K, V>> {
        let h = self.hash(key);
        let mut current = self.root;

        for level in 0..MAX_LEVEL {
            let internal = unsafe {
                match current.as_ref() {
                    Node::Internal(internal) => internal,
                    Node::Leaf(_) => {
                        unreachable!("invariant violation: expected internal node at level {level}")
                    }
                }
            };
            current = internal.get_child(chunk(h, level))?;
        }

        unsafe {
            match current.as_ref() {
                Node::Leaf(leaf) => Some(leaf),
                Node::Internal(_) => unreachable!("invariant violation: expected leaf at level {MAX_LEVEL}"),
            }
        }
    }

    /// Returns a clone of the value stored for `key`, or `None` if
    /// absent.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.walk_to_leaf(key).and_then(|leaf| leaf.get(key))
    }

    /// Equivalent to `self.get(key).is_some()`.
    pub fn contains(&self, key: &K) -> bool {
        self.walk_to_leaf(key)
            .map(|leaf| leaf.get_ref(key).is_some())
            .unwrap_or(false)
    }

    /// Current number of distinct keys held by the map.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Iterates every `(K, V)` pair exactly once, in trie traversal
    /// order (ascending dense-index order at each internal node,
    /// insertion order within a leaf). Order is deterministic for a
    /// fixed insertion history but not pinned across implementations.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut stack = ArrayVec::new();
        stack.push((self.root, 0usize));
        Iter {
            stack,
            _marker: std::marker::PhantomData,
        }
    }

    /// Structural snapshot used by the test suite; not on the hot
    /// path.
    pub fn tree_stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            entries: self.size,
            ..TreeStats::default()
        };
        let mut total_children_seen = 0usize;
        unsafe { Self::collect_stats(self.root, 0, &mut stats, &mut total_children_seen) };
        stats.avg_children_per_internal = if stats.internal_count == 0 {
            0.0
        } else {
            total_children_seen as f64 / stats.internal_count as f64
        };
        stats
    }

    unsafe fn collect_stats(
        ptr: NodePtr<K, V>,
        depth: usize,
        stats: &mut TreeStats,
        total_children_seen: &mut usize,
    ) {
        stats.max_observed_depth = stats.max_observed_depth.max(depth);
        match ptr.as_ref() {
            Node::Leaf(_) => {
                stats.leaf_count += 1;
            }
            Node::Internal(internal) => {
                stats.internal_count += 1;
                let live = internal.live_count();
                *total_children_seen += live;
                stats.total_child_pointers += live;
                if let Some(children) = internal.children {
                    for i in 0..live {
                        let child = *children.as_ptr().add(i);
                        Self::collect_stats(child, depth + 1, stats, total_children_seen);
                    }
                }
            }
        }
    }

    /// Clone of the value reference used by the throwing subscript
    /// accessor; returns `None` on an absent key without panicking.
    fn get_ref(&self, key: &K) -> Option<&V> {
        self.walk_to_leaf(key).and_then(|leaf| leaf.get_ref(key))
    }

    /// Diagnostics for the child-pointer pool: allocation, fallback, and
    /// reuse counters.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Walks the whole tree and checks that every internal node's
    /// bitmap and dense child array genuinely agree: scanning all 64
    /// possible chunk values through `get_child` must turn up exactly
    /// `popcount(bitmap)` children (no fewer, and no stray reads past
    /// the live prefix into uninitialized capacity), every reachable
    /// node pointer is visited exactly once, and leaves appear only at
    /// `MAX_LEVEL`.
    #[cfg(test)]
    fn check_bitmap_consistency(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        unsafe { Self::check_subtree(self.root, 0, &mut seen) }
    }

    #[cfg(test)]
    unsafe fn check_subtree(
        ptr: NodePtr<K, V>,
        depth: usize,
        seen: &mut std::collections::HashSet<usize>,
    ) -> bool {
        if !seen.insert(ptr.as_ptr() as usize) {
            return false;
        }
        match ptr.as_ref() {
            Node::Leaf(_) => depth == MAX_LEVEL,
            Node::Internal(internal) => {
                if depth == MAX_LEVEL {
                    return false;
                }
                let mut observed = 0usize;
                for c in 0..64u8 {
                    if let Some(child) = internal.get_child(c) {
                        observed += 1;
                        if !Self::check_subtree(child, depth + 1, seen) {
                            return false;
                        }
                    }
                }
                observed == internal.live_count()
            }
        }
    }

    unsafe fn destroy_subtree(ptr: NodePtr<K, V>) {
        if let Node::Internal(internal) = ptr.as_ref() {
            if let Some(children) = internal.children {
                let live = internal.live_count();
                for i in 0..live {
                    let child = *children.as_ptr().add(i);
                    Self::destroy_subtree(child);
                }
            }
        }
        std::ptr::drop_in_place(ptr.as_ptr());
    }
}

impl<K, V> Default for Map<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for Map<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // The tree must be walked — destructing every leaf's (K, V)
        // payload — before `self.arena` and `self.pool` are dropped
        // (Rust drops a struct's own fields only after this body
        // returns, so that ordering is guaranteed for free).
        unsafe { Self::destroy_subtree(self.root) };
    }
}

impl<'a, K, V> Index<&'a K> for Map<K, V>
where
    K: Eq + Hash,
{
    type Output = V;

    /// Panics with a "key not found" message if `key` is absent — the
    /// Rust idiom for a throwing subscript accessor, matching
    /// `std::collections::HashMap`'s own `Index` impl.
    fn index(&self, key: &'a K) -> &V {
        self.get_ref(key).expect("key not found")
    }
}

impl<K, V> fmt::Display for Map<K, V>
where
    K: Eq + Hash + fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

/// Stack-based iterator over a [`Map`]'s entries. Each stack frame is
/// a node plus the next dense-index child (or leaf entry) to visit.
pub struct Iter<'a, K, V> {
    stack: ArrayVec<(NodePtr<K, V>, usize), MAX_PATH_LEN>,
    _marker: std::marker::PhantomData<&'a Map<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (node_ptr, idx) = self.stack.last_mut()?;
            let node_ptr = *node_ptr;

            // SAFETY: node_ptr is reachable from the map this iterator
            // borrows, so it stays valid for 'a.
            match unsafe { node_ptr.as_ref() } {
                Node::Leaf(leaf) => {
                    if *idx < leaf.entries.len() {
                        let (k, v) = &leaf.entries[*idx];
                        *idx += 1;
                        return Some((k, v));
                    }
                    self.stack.pop();
                }
                Node::Internal(internal) => {
                    let live = internal.live_count();
                    if *idx < live {
                        let i = *idx;
                        *idx += 1;
                        let child = unsafe { *internal.children.unwrap().as_ptr().add(i) };
                        self.stack.push((child, 0));
                    } else {
                        self.stack.pop();
                    }
                }
            }
        }
    }
}

impl<'a, K, V> IntoIterator for &'a Map<K, V>
where
    K: Eq + Hash,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_then_get_round_trips() {
        let mut map: Map<i32, i32> = Map::new();
        map.insert(7, 70);
        assert_eq!(map.get(&7), Some(70));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn reinserting_the_same_key_updates_without_growing_len() {
        let mut map: Map<i32, i32> = Map::new();
        map.insert(7, 70);
        map.insert(7, 700);
        assert_eq!(map.get(&7), Some(700));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn absent_key_returns_none_and_contains_is_false() {
        let map: Map<i32, i32> = Map::new();
        assert_eq!(map.get(&1), None);
        assert!(!map.contains(&1));
    }

    #[test]
    fn index_panics_on_an_absent_key() {
        let map: Map<i32, i32> = Map::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| map[&1]));
        assert!(result.is_err());
    }

    #[test]
    fn index_returns_a_reference_to_the_stored_value() {
        let mut map: Map<i32, i32> = Map::new();
        map.insert(1, 42);
        assert_eq!(map[&1], 42);
    }

    #[test]
    fn to_string_is_dict_like_and_empty_is_braces() {
        let map: Map<i32, &str> = Map::new();
        assert_eq!(map.to_string(), "{}");

        let mut map: Map<i32, &str> = Map::new();
        map.insert(42, "answer");
        let s = map.to_string();
        assert!(s.contains("42"));
        assert!(s.contains("answer"));
    }

    #[test]
    fn iter_yields_every_entry_exactly_once() {
        let mut map: Map<i32, i32> = Map::new();
        for i in 0..20 {
            map.insert(i, i * 10);
        }
        let mut seen: Vec<(i32, i32)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        seen.sort();
        let expected: Vec<(i32, i32)> = (0..20).map(|i| (i, i * 10)).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn collision_correctness_with_a_constant_hash() {
        let mut map: Map<i32, &str> = Map::with_hash_fn(|_| 42);
        map.insert(1, "one");
        map.insert(2, "two");
        map.insert(100, "hundred");
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(&1), Some("one"));
        assert_eq!(map.get(&2), Some("two"));
        assert_eq!(map.get(&100), Some("hundred"));

        let stats = map.tree_stats();
        assert_eq!(stats.leaf_count, 1);
        assert_eq!(stats.max_observed_depth, MAX_LEVEL);
    }

    #[test]
    fn tree_stats_depth_never_exceeds_max_level() {
        let mut map: Map<i32, i32> = Map::new();
        for i in 0..200 {
            map.insert(i, i);
        }
        let stats = map.tree_stats();
        assert!(stats.max_observed_depth <= MAX_LEVEL);
        assert_eq!(stats.entries, 200);
    }

    #[test]
    fn bitmap_consistency_holds_after_many_inserts() {
        let mut map: Map<i64, i64> = Map::new();
        for i in 0..2000i64 {
            map.insert(i * 104_729, i);
        }
        assert!(map.check_bitmap_consistency());
    }

    #[test]
    fn bitmap_consistency_holds_under_forced_collisions() {
        let mut map: Map<i32, i32> = Map::with_hash_fn(|_| 7);
        for i in 0..50 {
            map.insert(i, i);
        }
        assert!(map.check_bitmap_consistency());
    }

    proptest! {
        #[test]
        fn bitmap_agrees_with_dense_children_for_random_keys(
            keys in prop::collection::hash_set(any::<i64>(), 1..300)
        ) {
            let mut map: Map<i64, i64> = Map::new();
            for k in keys {
                map.insert(k, k);
            }
            prop_assert!(map.check_bitmap_consistency());
        }
    }
}
