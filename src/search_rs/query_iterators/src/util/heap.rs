/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! A semi-indirect min-heap for k-way merges.
//!
//! This module provides [`SemiIndirectHeap`], the priority queue behind the union,
//! interval conjunction and cluster merge iterators. Keys live in a side array
//! indexed by slot (one slot per child); the heap itself only orders slot numbers.
//! That makes the operations the merges need cheap:
//!
//! - [`SemiIndirectHeap::changed`]: the root's key was updated in place, sift it down
//! - [`SemiIndirectHeap::rebuild`]: every key changed, heapify again
//! - [`SemiIndirectHeap::front`]: all slots whose key equals the root's

/// A min-heap of slots ordered by their keys.
///
/// # Example
///
/// ```
/// use query_iterators::util::SemiIndirectHeap;
///
/// let mut heap = SemiIndirectHeap::new(vec![10u64, 5, 5]);
/// heap.push(0);
/// heap.push(1);
/// heap.push(2);
/// assert_eq!(heap.peek_key(), Some(5));
///
/// let mut front = Vec::new();
/// heap.front(&mut front);
/// front.sort();
/// assert_eq!(front, vec![1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct SemiIndirectHeap<K> {
    /// Key of each slot, whether enqueued or not.
    keys: Vec<K>,
    /// Enqueued slots, in heap order.
    heap: Vec<usize>,
}

impl<K> Default for SemiIndirectHeap<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            heap: Vec::new(),
        }
    }
}

impl<K: Ord + Copy> SemiIndirectHeap<K> {
    /// Creates an empty heap over the given slot keys.
    #[must_use]
    pub fn new(keys: Vec<K>) -> Self {
        let heap = Vec::with_capacity(keys.len());
        Self { keys, heap }
    }

    /// Returns the number of enqueued slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Dequeues every slot. Keys are kept.
    #[inline]
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Dequeues every slot and makes room for `slots` keys, all set to `fill`.
    pub fn reset(&mut self, slots: usize, fill: K) {
        self.heap.clear();
        self.keys.clear();
        self.keys.resize(slots, fill);
    }

    /// The key of `slot`.
    #[inline]
    pub fn key(&self, slot: usize) -> K {
        self.keys[slot]
    }

    /// Updates the key of `slot`.
    ///
    /// If `slot` is enqueued, restore the heap with [`Self::changed`] (root) or
    /// [`Self::rebuild`] before the next query.
    #[inline]
    pub fn set_key(&mut self, slot: usize, key: K) {
        self.keys[slot] = key;
    }

    /// The enqueued slots, in no particular order.
    #[inline]
    pub fn slots(&self) -> &[usize] {
        &self.heap
    }

    /// The slot with the smallest key.
    #[inline]
    pub fn peek(&self) -> Option<usize> {
        self.heap.first().copied()
    }

    /// The smallest key.
    #[inline]
    pub fn peek_key(&self) -> Option<K> {
        self.peek().map(|slot| self.keys[slot])
    }

    /// Enqueues `slot` with its current key.
    pub fn push(&mut self, slot: usize) {
        debug_assert!(slot < self.keys.len());
        self.heap.push(slot);
        self.sift_up(self.heap.len() - 1);
    }

    /// Dequeues and returns the slot with the smallest key.
    pub fn pop(&mut self) -> Option<usize> {
        if self.heap.is_empty() {
            return None;
        }

        let result = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(result)
    }

    /// Restores the heap after the root's key changed.
    pub fn changed(&mut self) {
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
    }

    /// Replaces the root's key and restores the heap.
    pub fn replace_root_key(&mut self, key: K) {
        debug_assert!(!self.heap.is_empty(), "cannot replace root of empty heap");
        if let Some(&root) = self.heap.first() {
            self.keys[root] = key;
            self.sift_down(0);
        }
    }

    /// Restores the heap after arbitrary key changes.
    pub fn rebuild(&mut self) {
        for idx in (0..self.heap.len() / 2).rev() {
            self.sift_down(idx);
        }
    }

    /// Calls `f` on every enqueued slot whose key equals the root's.
    pub fn for_each_root<F>(&self, mut f: F)
    where
        F: FnMut(usize),
    {
        if let Some(root) = self.peek_key() {
            self.for_each_root_recursive(0, root, &mut f);
        }
    }

    /// Collects into `out` every enqueued slot whose key equals the root's.
    pub fn front(&self, out: &mut Vec<usize>) {
        out.clear();
        self.for_each_root(|slot| out.push(slot));
    }

    /// Children of a node have keys no smaller than the node, so the walk prunes
    /// as soon as it meets a larger key.
    fn for_each_root_recursive<F>(&self, idx: usize, root: K, f: &mut F)
    where
        F: FnMut(usize),
    {
        let Some(&slot) = self.heap.get(idx) else {
            return;
        };
        if self.keys[slot] != root {
            return;
        }

        f(slot);

        self.for_each_root_recursive(2 * idx + 1, root, f);
        self.for_each_root_recursive(2 * idx + 2, root, f);
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.keys[self.heap[a]] < self.keys[self.heap[b]]
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent) {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;

            if left < self.heap.len() && self.less(left, smallest) {
                smallest = left;
            }
            if right < self.heap.len() && self.less(right, smallest) {
                smallest = right;
            }

            if smallest == idx {
                break;
            }

            self.heap.swap(idx, smallest);
            idx = smallest;
        }
    }
}
