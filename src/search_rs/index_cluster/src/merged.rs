/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Fan-in over local indices whose pointers interleave.

use std::ops::ControlFlow;

use tracing::trace;

use query_iterators::util::SemiIndirectHeap;
use query_iterators::{
    DocId, DocumentIterator, DocumentIteratorVisitor, DocumentState, IndexId, IndexSet, Interval,
    IntervalState, QueryError, Traversal,
};

use crate::strategy::DocumentalClusteringStrategy;
use crate::{ClusterError, frequency_sum, shard_indices};

/// Merges the shards by global pointer with a heap.
///
/// Shards hold disjoint sets of documents, so the heap top alone holds the current
/// document and no duplicates need collapsing.
pub struct MergedCluster<I, S> {
    strategy: S,
    /// `(local index, iterator)`.
    shards: Vec<(usize, I)>,
    /// Shard slots keyed by the global pointer of their current document.
    heap: SemiIndirectHeap<DocId>,
    /// Slot of the shard holding the current document.
    current: Option<usize>,
    state: DocumentState,
    indices: IndexSet,
}

impl<I: DocumentIterator, S: DocumentalClusteringStrategy> MergedCluster<I, S> {
    /// `shards` pairs each iterator with the local index it reads; each local index
    /// appears at most once.
    pub fn new(strategy: S, shards: Vec<(usize, I)>) -> Result<Self, ClusterError> {
        let count = strategy.number_of_local_indices();
        let mut seen = vec![false; count];
        for &(shard, _) in &shards {
            match seen.get_mut(shard) {
                None => return Err(ClusterError::ShardOutOfRange { shard, shards: count }),
                Some(true) => return Err(ClusterError::DuplicateShard(shard)),
                Some(slot) => *slot = true,
            }
        }
        let indices = shard_indices(&shards);
        let heap = SemiIndirectHeap::new(vec![0; shards.len()]);
        Ok(Self {
            strategy,
            shards,
            heap,
            current: None,
            state: DocumentState::Unstarted,
            indices,
        })
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Position every shard on its first document at or beyond `target`.
    fn prime(&mut self, target: DocId) -> Result<(), QueryError> {
        for slot in 0..self.shards.len() {
            let (shard, iterator) = &mut self.shards[slot];
            let local = self.strategy.local_skip_target(*shard, target);
            if let Some(local) = iterator.skip_to(local)? {
                self.heap.set_key(slot, self.strategy.global_pointer(*shard, local));
                self.heap.push(slot);
            }
        }
        Ok(())
    }

    /// Take the heap top as the current document.
    fn settle(&mut self) -> Option<DocId> {
        let top = self.heap.peek();
        if top != self.current
            && let Some(slot) = top
        {
            trace!(shard = self.shards[slot].0, "moving to local index");
        }
        self.current = top;
        self.state = DocumentState::after(self.heap.peek_key());
        self.heap.peek_key()
    }

    fn exhausted(&mut self) -> Option<DocId> {
        self.heap.clear();
        self.current = None;
        self.state = DocumentState::Exhausted;
        None
    }

    fn holder(&mut self) -> Result<&mut I, QueryError> {
        self.state.positioned()?;
        let slot = self.current.ok_or(QueryError::NotPositioned)?;
        Ok(&mut self.shards[slot].1)
    }
}

impl<I: DocumentIterator, S: DocumentalClusteringStrategy> DocumentIterator for MergedCluster<I, S> {
    fn state(&self) -> DocumentState {
        self.state
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        match self.state {
            DocumentState::Exhausted => return Ok(None),
            DocumentState::Unstarted => self.prime(0)?,
            DocumentState::Positioned(_) => {
                let Some(slot) = self.current else {
                    return Ok(self.exhausted());
                };
                let (shard, iterator) = &mut self.shards[slot];
                match iterator.next_document()? {
                    Some(local) => {
                        let global = self.strategy.global_pointer(*shard, local);
                        self.heap.replace_root_key(global);
                    }
                    None => {
                        self.heap.pop();
                    }
                }
            }
        }
        Ok(self.settle())
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        if self.state.reached(target) {
            return Ok(self.state.document());
        }
        if target >= self.strategy.number_of_documents() {
            return Ok(self.exhausted());
        }
        if self.state == DocumentState::Unstarted {
            self.prime(target)?;
            return Ok(self.settle());
        }

        while let Some(slot) = self.heap.peek()
            && self.heap.key(slot) < target
        {
            let (shard, iterator) = &mut self.shards[slot];
            let local = self.strategy.local_skip_target(*shard, target);
            match iterator.skip_to(local)? {
                Some(local) => {
                    let global = self.strategy.global_pointer(*shard, local);
                    if global < target {
                        // Only a strategy breaking its own contract gets here.
                        self.heap.pop();
                    } else {
                        self.heap.replace_root_key(global);
                    }
                }
                None => {
                    self.heap.pop();
                }
            }
        }
        Ok(self.settle())
    }

    fn may_have_next(&self) -> bool {
        match self.state {
            DocumentState::Exhausted => false,
            DocumentState::Unstarted => self.shards.iter().any(|(_, it)| it.may_have_next()),
            DocumentState::Positioned(_) => {
                self.heap.len() > 1
                    || self
                        .heap
                        .slots()
                        .iter()
                        .any(|&slot| self.shards[slot].1.may_have_next())
            }
        }
    }

    fn frequency(&self) -> Option<u64> {
        frequency_sum(&self.shards)
    }

    fn indices(&self) -> &IndexSet {
        &self.indices
    }

    fn weight(&self) -> f64 {
        self.shards.first().map_or(1.0, |(_, iterator)| iterator.weight())
    }

    fn intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        let covered = self.indices.contains(index);
        let holder = self.holder()?;
        if !covered {
            return Ok(IntervalState::False);
        }
        holder.intervals(index)
    }

    fn reset_intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        let covered = self.indices.contains(index);
        let holder = self.holder()?;
        if !covered {
            return Ok(IntervalState::False);
        }
        holder.reset_intervals(index)
    }

    fn next_interval(&mut self, index: IndexId) -> Result<Option<Interval>, QueryError> {
        let covered = self.indices.contains(index);
        let holder = self.holder()?;
        if !covered {
            return Ok(None);
        }
        holder.next_interval(index)
    }

    fn extent(&self, index: IndexId) -> u32 {
        self.shards
            .iter()
            .map(|(_, iterator)| iterator.extent(index))
            .min()
            .unwrap_or(0)
    }

    fn accept(
        &mut self,
        visitor: &mut dyn DocumentIteratorVisitor,
        traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError> {
        match self.shards.get_mut(self.current.unwrap_or(0)) {
            Some((_, iterator)) => iterator.accept(visitor, traversal),
            None => Ok(ControlFlow::Continue(())),
        }
    }

    fn dispose(&mut self) -> Result<(), QueryError> {
        for (_, iterator) in &mut self.shards {
            iterator.dispose()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{
        ContiguousDocumentalStrategy, DocumentalPartitioningStrategy, IdentityDocumentalStrategy,
        InterleavedDocumentalStrategy,
    };
    use pretty_assertions::assert_eq;
    use query_iterators::{MemoryIndex, MemoryPostings, TermIterator};
    use query_iterators_test_utils::{VecPosting, VecPostings, collect_documents};

    /// Split `documents` with `strategy` and read `term` from every shard.
    fn cluster<S: DocumentalPartitioningStrategy>(
        documents: &[&str],
        strategy: S,
        term: &str,
    ) -> MergedCluster<TermIterator<MemoryPostings>, S> {
        let mut local: Vec<Vec<&str>> = vec![Vec::new(); strategy.number_of_local_indices()];
        for (global, text) in documents.iter().enumerate() {
            local[strategy.local_index(global as u64).unwrap()].push(*text);
        }
        let shards = local
            .into_iter()
            .enumerate()
            .map(|(shard, texts)| {
                let index = MemoryIndex::from_documents(IndexId(0), "text", texts);
                (shard, index.documents(term))
            })
            .collect();
        MergedCluster::new(strategy, shards).unwrap()
    }

    const DOCUMENTS: [&str; 7] = ["a", "b", "a b", "b", "a", "a b", "a"];

    #[test]
    fn test_interleaved_shards_merge_in_order() {
        let strategy = InterleavedDocumentalStrategy::new(3, 7).unwrap();
        let mut it = cluster(&DOCUMENTS, strategy, "a");
        assert_eq!(collect_documents(&mut it).unwrap(), vec![0, 2, 4, 5, 6]);
        assert_eq!(it.frequency(), Some(5));
        assert!(!it.may_have_next());
    }

    #[test]
    fn test_skip_to_matches_next_document() {
        let strategy = InterleavedDocumentalStrategy::new(3, 7).unwrap();
        for target in 0..8 {
            let mut skipping = cluster(&DOCUMENTS, strategy, "b");
            let mut reading = cluster(&DOCUMENTS, strategy, "b");
            let expected = std::iter::from_fn(|| reading.next_document().unwrap())
                .find(|&doc| doc >= target);
            assert_eq!(skipping.skip_to(target).unwrap(), expected, "target {target}");
        }
    }

    #[test]
    fn test_skip_after_reading() {
        let strategy = InterleavedDocumentalStrategy::new(2, 7).unwrap();
        let mut it = cluster(&DOCUMENTS, strategy, "a");
        assert_eq!(it.next_document().unwrap(), Some(0));
        assert_eq!(it.skip_to(3).unwrap(), Some(4));
        assert_eq!(it.skip_to(3).unwrap(), Some(4));
        assert_eq!(it.next_document().unwrap(), Some(5));
        assert_eq!(it.skip_to(7).unwrap(), None);
    }

    #[test]
    fn test_term_in_a_single_contiguous_shard() {
        let documents = ["a b", "b", "a", "a"];
        let strategy = ContiguousDocumentalStrategy::uniform(2, 4).unwrap();
        let mut it = cluster(&documents, strategy, "b");
        assert_eq!(it.skip_to(2).unwrap(), None);
    }

    #[test]
    fn test_intervals_come_from_the_holding_shard() {
        let strategy = InterleavedDocumentalStrategy::new(3, 7).unwrap();
        let mut it = cluster(&DOCUMENTS, strategy, "b");
        assert_eq!(it.skip_to(4).unwrap(), Some(5));
        assert_eq!(it.next_interval(IndexId(0)).unwrap(), Some(Interval::singleton(1)));
        assert_eq!(it.next_interval(IndexId(0)).unwrap(), None);
    }

    #[test]
    fn test_identity_strategy_needs_no_translation() {
        let odd = VecPostings::documents(IndexId(0), "t", &[1, 3, 5]);
        let even = VecPostings::documents(IndexId(0), "t", &[0, 4]);
        let shards = vec![(0, odd.into_iterator()), (1, even.into_iterator())];
        let mut it = MergedCluster::new(IdentityDocumentalStrategy::new(2, 6), shards).unwrap();
        assert_eq!(collect_documents(&mut it).unwrap(), vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn test_duplicate_shards_are_rejected() {
        let postings = || VecPostings::new(IndexId(0), "t", vec![VecPosting::new(0, &[0])]);
        let shards = vec![(1, postings().into_iterator()), (1, postings().into_iterator())];
        assert!(matches!(
            MergedCluster::new(IdentityDocumentalStrategy::new(2, 6), shards),
            Err(ClusterError::DuplicateShard(1))
        ));
    }
}
