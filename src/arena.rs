//! Block allocator for [`Node`] records.
//!
//! Nodes are handed out one at a time but never individually freed by
//! value: the arena only ever reclaims a slot once its caller has
//! already destructed whatever payload lived there (see the teardown
//! discussion on [`crate::Map`]'s `Drop` impl). Blocks are boxed slices
//! of `MaybeUninit<Node<K, V>>`, so dropping a block never runs a
//! `Node`'s destructor — only the Map's own recursive traversal does.

use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::node::Node;

/// A stable pointer to a Node slot inside an arena block.
pub(crate) type NodePtr<K, V> = NonNull<Node<K, V>>;

pub(crate) struct NodeArena<K, V> {
    blocks: Vec<Box<[MaybeUninit<Node<K, V>>]>>,
    block_size: usize,
    next_index: usize,
    free_list: Vec<NodePtr<K, V>>,
}

impl<K, V> NodeArena<K, V> {
    pub(crate) fn new(block_size: usize) -> Self {
        assert!(block_size > 0, "arena block size must be positive");
        NodeArena {
            blocks: Vec::new(),
            block_size,
            next_index: 0,
            free_list: Vec::new(),
        }
    }

    /// Returns a pointer to a fresh, uninitialized Node slot. Callers
    /// must write a valid `Node<K, V>` into it before reading through
    /// the pointer.
    pub(crate) fn allocate(&mut self) -> NodePtr<K, V> {
        if let Some(ptr) = self.free_list.pop() {
            return ptr;
        }

        if self.blocks.is_empty() || self.next_index == self.block_size {
            self.blocks.push(Self::new_block(self.block_size));
            self.next_index = 0;
        }

        let block = self.blocks.last_mut().expect("block just pushed");
        let slot = &mut block[self.next_index];
        self.next_index += 1;
        unsafe { NonNull::new_unchecked(slot.as_mut_ptr()) }
    }

    /// Returns `ptr` to the free-list. The caller must have already
    /// dropped whatever `Node` payload lived at `ptr`.
    #[allow(dead_code)]
    pub(crate) fn recycle(&mut self, ptr: NodePtr<K, V>) {
        self.free_list.push(ptr);
    }

    fn new_block(size: usize) -> Box<[MaybeUninit<Node<K, V>>]> {
        let mut block = Vec::with_capacity(size);
        block.resize_with(size, MaybeUninit::uninit);
        block.into_boxed_slice()
    }

    #[cfg(test)]
    pub(crate) fn block_count(&self) -> usize {
        self.blocks.len()
    }
}
