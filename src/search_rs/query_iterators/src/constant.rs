/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The constant iterators: every document, or none.

use std::ops::ControlFlow;

use crate::{
    DocId, DocumentIterator, DocumentIteratorVisitor, DocumentState, IndexId, IndexSet, Interval,
    IntervalState, LeafInfo, QueryError, Traversal,
};

/// Yields every document of the collection, with `True` intervals on its index.
#[derive(Debug, Clone)]
pub struct TrueIterator {
    indices: IndexSet,
    number_of_documents: u64,
    state: DocumentState,
}

impl TrueIterator {
    pub fn new(index: IndexId, number_of_documents: u64) -> Self {
        Self {
            indices: IndexSet::single(index),
            number_of_documents,
            state: DocumentState::Unstarted,
        }
    }

    fn position(&mut self, doc: DocId) -> Option<DocId> {
        let next = (doc < self.number_of_documents).then_some(doc);
        self.state = DocumentState::after(next);
        next
    }
}

impl DocumentIterator for TrueIterator {
    fn state(&self) -> DocumentState {
        self.state
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        Ok(match self.state {
            DocumentState::Unstarted => self.position(0),
            DocumentState::Positioned(doc) => self.position(doc + 1),
            DocumentState::Exhausted => None,
        })
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        if self.state.reached(target) {
            return Ok(self.state.document());
        }
        Ok(self.position(target))
    }

    fn may_have_next(&self) -> bool {
        match self.state {
            DocumentState::Unstarted => self.number_of_documents > 0,
            DocumentState::Positioned(doc) => doc + 1 < self.number_of_documents,
            DocumentState::Exhausted => false,
        }
    }

    fn indices(&self) -> &IndexSet {
        &self.indices
    }

    fn intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        Ok(if self.indices.contains(index) {
            IntervalState::True
        } else {
            IntervalState::False
        })
    }

    fn reset_intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        self.intervals(index)
    }

    fn next_interval(&mut self, index: IndexId) -> Result<Option<Interval>, QueryError> {
        self.intervals(index)?;
        Ok(None)
    }

    fn extent(&self, _index: IndexId) -> u32 {
        0
    }

    fn accept(
        &mut self,
        visitor: &mut dyn DocumentIteratorVisitor,
        _traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError> {
        let Some(index) = self.indices.sole() else {
            return Ok(ControlFlow::Continue(()));
        };
        Ok(visitor.visit_leaf(&LeafInfo {
            index,
            term: None,
            term_number: None,
            frequency: Some(self.number_of_documents),
            count: None,
            weight: 1.0,
        }))
    }
}

/// Yields no document at all.
#[derive(Debug, Clone)]
pub struct FalseIterator {
    indices: IndexSet,
}

impl FalseIterator {
    pub fn new(index: IndexId) -> Self {
        Self {
            indices: IndexSet::single(index),
        }
    }
}

impl DocumentIterator for FalseIterator {
    fn state(&self) -> DocumentState {
        DocumentState::Exhausted
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        Ok(None)
    }

    fn skip_to(&mut self, _target: DocId) -> Result<Option<DocId>, QueryError> {
        Ok(None)
    }

    fn may_have_next(&self) -> bool {
        false
    }

    fn frequency(&self) -> Option<u64> {
        Some(0)
    }

    fn indices(&self) -> &IndexSet {
        &self.indices
    }

    fn intervals(&mut self, _index: IndexId) -> Result<IntervalState, QueryError> {
        Err(QueryError::NotPositioned)
    }

    fn reset_intervals(&mut self, _index: IndexId) -> Result<IntervalState, QueryError> {
        Err(QueryError::NotPositioned)
    }

    fn next_interval(&mut self, _index: IndexId) -> Result<Option<Interval>, QueryError> {
        Err(QueryError::NotPositioned)
    }

    fn extent(&self, _index: IndexId) -> u32 {
        0
    }

    fn accept(
        &mut self,
        _visitor: &mut dyn DocumentIteratorVisitor,
        _traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError> {
        Ok(ControlFlow::Continue(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_true_yields_every_document() {
        let mut it = TrueIterator::new(IndexId(0), 3);
        assert!(it.may_have_next());
        assert_eq!(it.next_document().unwrap(), Some(0));
        assert_eq!(it.intervals(IndexId(0)).unwrap(), IntervalState::True);
        assert_eq!(it.intervals(IndexId(1)).unwrap(), IntervalState::False);
        assert_eq!(it.skip_to(2).unwrap(), Some(2));
        assert!(!it.may_have_next());
        assert_eq!(it.skip_to(1).unwrap(), Some(2));
        assert_eq!(it.next_document().unwrap(), None);
    }

    #[test]
    fn test_true_skip_beyond_collection() {
        let mut it = TrueIterator::new(IndexId(0), 3);
        assert_eq!(it.skip_to(3).unwrap(), None);
        assert!(it.state().is_exhausted());
    }

    #[test]
    fn test_false_is_exhausted_from_the_start() {
        let mut it = FalseIterator::new(IndexId(0));
        assert!(!it.may_have_next());
        assert_eq!(it.next_document().unwrap(), None);
        assert!(matches!(it.intervals(IndexId(0)), Err(QueryError::NotPositioned)));
    }
}
