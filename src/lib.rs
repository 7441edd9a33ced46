//! An in-memory associative map implemented as a Hash Array Mapped
//! Trie (HAMT): compact bitmap-indexed internal nodes, a small
//! collision bucket at each leaf, and two pooled allocators — a node
//! arena and a child-pointer-array pool — that keep the insert/lookup
//! hot path free of general-purpose heap traffic.
//!
//! Single-threaded, mutated in place; no persistence, no structural
//! sharing, no concurrent mutation, no delete (see [`Map`]'s docs for
//! the full contract).

mod arena;
mod hash;
mod node;
mod pool;
mod map;

pub use map::{Map, MapConfig, TreeStats, Iter, MAX_LEVEL, DEFAULT_ARENA_BLOCK, DEFAULT_POOL_CAPACITY};
pub use pool::PoolStats;
