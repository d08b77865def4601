/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Fan-in over local indices whose pointer ranges follow one another.

use std::ops::ControlFlow;

use tracing::trace;

use query_iterators::{
    DocId, DocumentIterator, DocumentIteratorVisitor, DocumentState, IndexId, IndexSet, Interval,
    IntervalState, QueryError, Traversal,
};

use crate::strategy::{
    ContiguousDocumentalStrategy, DocumentalClusteringStrategy, DocumentalPartitioningStrategy,
};
use crate::{ClusterError, frequency_sum, shard_indices};

/// Reads the shards one after the other, translating their local pointers.
///
/// Shards are kept in increasing local-index order, so the shard holding the
/// current document is always the one under the cursor. A skip jumps directly to
/// the shard owning the target.
pub struct ConcatenatedCluster<I> {
    strategy: ContiguousDocumentalStrategy,
    /// `(local index, iterator)`, by increasing local index.
    shards: Vec<(usize, I)>,
    /// Offset in `shards` of the shard being read.
    current: usize,
    state: DocumentState,
    indices: IndexSet,
}

impl<I: DocumentIterator> ConcatenatedCluster<I> {
    /// `shards` pairs each iterator with the local index it reads, in strictly
    /// increasing local-index order. Local indices without a pair are skipped.
    pub fn new(
        strategy: ContiguousDocumentalStrategy,
        shards: Vec<(usize, I)>,
    ) -> Result<Self, ClusterError> {
        let count = strategy.number_of_local_indices();
        if let Some(&(shard, _)) = shards.iter().find(|(shard, _)| *shard >= count) {
            return Err(ClusterError::ShardOutOfRange {
                shard,
                shards: count,
            });
        }
        if shards.windows(2).any(|pair| pair[0].0 >= pair[1].0) {
            return Err(ClusterError::UnorderedShards);
        }
        let indices = shard_indices(&shards);
        Ok(Self {
            strategy,
            shards,
            current: 0,
            state: DocumentState::Unstarted,
            indices,
        })
    }

    pub fn strategy(&self) -> &ContiguousDocumentalStrategy {
        &self.strategy
    }

    fn positioned(&mut self, local: DocId) -> Option<DocId> {
        let (shard, _) = self.shards[self.current];
        let global = self.strategy.global_pointer(shard, local);
        self.state = DocumentState::Positioned(global);
        Some(global)
    }

    fn exhausted(&mut self) -> Option<DocId> {
        self.current = self.shards.len();
        self.state = DocumentState::Exhausted;
        None
    }

    fn advance_shard(&mut self) {
        self.current += 1;
        if let Some((shard, _)) = self.shards.get(self.current) {
            trace!(shard, "moving to next local index");
        }
    }

    /// The shard holding the current document.
    fn holder(&mut self) -> Result<&mut I, QueryError> {
        self.state.positioned()?;
        Ok(&mut self.shards[self.current].1)
    }
}

impl<I: DocumentIterator> DocumentIterator for ConcatenatedCluster<I> {
    fn state(&self) -> DocumentState {
        self.state
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        if self.state.is_exhausted() {
            return Ok(None);
        }
        while let Some((_, iterator)) = self.shards.get_mut(self.current) {
            if let Some(local) = iterator.next_document()? {
                return Ok(self.positioned(local));
            }
            self.advance_shard();
        }
        Ok(self.exhausted())
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        if self.state.reached(target) {
            return Ok(self.state.document());
        }
        if target >= self.strategy.number_of_documents() {
            return Ok(self.exhausted());
        }

        let owner = self.strategy.local_index(target)?;
        while self
            .shards
            .get(self.current)
            .is_some_and(|(shard, _)| *shard < owner)
        {
            self.advance_shard();
        }
        // The owner may have no shard, in which case the first document of the
        // next one is the answer; its skip target then is its first pointer.
        while let Some((shard, iterator)) = self.shards.get_mut(self.current) {
            let local = self.strategy.local_skip_target(*shard, target);
            if let Some(local) = iterator.skip_to(local)? {
                return Ok(self.positioned(local));
            }
            self.advance_shard();
        }
        Ok(self.exhausted())
    }

    fn may_have_next(&self) -> bool {
        !self.state.is_exhausted()
            && self
                .shards
                .get(self.current..)
                .is_some_and(|rest| rest.iter().any(|(_, iterator)| iterator.may_have_next()))
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
        let last = self.shards.len().saturating_sub(1);
        match self.shards.get_mut(self.current.min(last)) {
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
    use pretty_assertions::assert_eq;
    use query_iterators::{MemoryIndex, MemoryPostings, TermIterator};
    use query_iterators_test_utils::collect_documents;

    /// Shard `i` of the documents in `ranges[i]`, for the shards that contain `term`.
    fn cluster(
        documents: &[&str],
        strategy: ContiguousDocumentalStrategy,
        term: &str,
    ) -> ConcatenatedCluster<TermIterator<MemoryPostings>> {
        let shards = (0..strategy.number_of_local_indices())
            .filter_map(|shard| {
                let range = strategy.range(shard).unwrap();
                let index = MemoryIndex::from_documents(
                    IndexId(0),
                    "text",
                    documents[range.start as usize..range.end as usize].iter().copied(),
                );
                let iterator = index.documents(term);
                iterator.may_have_next().then_some((shard, iterator))
            })
            .collect();
        ConcatenatedCluster::new(strategy, shards).unwrap()
    }

    const DOCUMENTS: [&str; 6] = ["a", "b", "a b", "b", "a", "a b"];

    #[test]
    fn test_reads_shards_in_order() {
        let strategy = ContiguousDocumentalStrategy::uniform(3, 6).unwrap();
        let mut it = cluster(&DOCUMENTS, strategy, "a");
        assert_eq!(collect_documents(&mut it).unwrap(), vec![0, 2, 4, 5]);
        assert_eq!(it.next_document().unwrap(), None);
        assert_eq!(it.frequency(), Some(4));
    }

    #[test]
    fn test_skip_into_a_shard_without_the_term() {
        // "b" only occurs in shards 0 and 1.
        let documents = ["a b", "b", "a", "a"];
        let strategy = ContiguousDocumentalStrategy::uniform(2, 4).unwrap();
        let mut it = cluster(&documents, strategy, "b");
        assert_eq!(it.skip_to(2).unwrap(), None);
        assert!(it.state().is_exhausted());
    }

    #[test]
    fn test_skip_past_a_missing_owner_lands_on_the_next_shard() {
        // Shard 1 (documents 2 and 3) holds no "c".
        let documents = ["c", "x", "x", "x", "x", "c"];
        let strategy = ContiguousDocumentalStrategy::uniform(3, 6).unwrap();
        let mut it = cluster(&documents, strategy, "c");
        assert_eq!(it.skip_to(1).unwrap(), Some(5));
        assert_eq!(it.next_document().unwrap(), None);
    }

    #[test]
    fn test_skip_within_and_across_shards() {
        let strategy = ContiguousDocumentalStrategy::uniform(3, 6).unwrap();
        let mut it = cluster(&DOCUMENTS, strategy, "b");
        assert_eq!(it.skip_to(2).unwrap(), Some(2));
        assert_eq!(it.skip_to(2).unwrap(), Some(2));
        assert_eq!(it.skip_to(4).unwrap(), Some(5));
        assert_eq!(it.skip_to(9).unwrap(), None);
    }

    #[test]
    fn test_intervals_come_from_the_holding_shard() {
        let strategy = ContiguousDocumentalStrategy::uniform(3, 6).unwrap();
        let mut it = cluster(&DOCUMENTS, strategy, "b");
        assert!(matches!(it.intervals(IndexId(0)), Err(QueryError::NotPositioned)));
        it.skip_to(5).unwrap();
        assert_eq!(it.intervals(IndexId(0)).unwrap(), IntervalState::Ready);
        assert_eq!(it.next_interval(IndexId(0)).unwrap(), Some(Interval::singleton(1)));
        assert_eq!(it.intervals(IndexId(7)).unwrap(), IntervalState::False);
    }

    #[test]
    fn test_shards_must_be_ordered() {
        let strategy = ContiguousDocumentalStrategy::uniform(2, 4).unwrap();
        let index = MemoryIndex::from_documents(IndexId(0), "text", ["a"]);
        let shards = vec![(1, index.documents("a")), (0, index.documents("a"))];
        assert!(matches!(
            ConcatenatedCluster::new(strategy.clone(), shards),
            Err(ClusterError::UnorderedShards)
        ));
        let shards = vec![(2, index.documents("a"))];
        assert!(matches!(
            ConcatenatedCluster::new(strategy, shards),
            Err(ClusterError::ShardOutOfRange { shard: 2, shards: 2 })
        ));
    }
}
