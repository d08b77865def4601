/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Leaf iterator over the postings of one term.

use std::ops::ControlFlow;

use smallvec::SmallVec;

use crate::{
    DocId, DocumentIterator, DocumentIteratorVisitor, DocumentState, IndexId, IndexSet, Interval,
    IntervalState, LeafInfo, Position, PostingSource, QueryError, Traversal,
};

/// Yields the documents of a posting list; each position becomes a singleton interval.
///
/// Postings without positions make every document `True`. Positions of the current
/// document are read once, on the first interval request, and kept so that
/// [`DocumentIterator::reset_intervals`] can replay them.
pub struct TermIterator<S> {
    source: S,
    indices: IndexSet,
    state: DocumentState,
    weight: f64,
    positions: SmallVec<[Position; 8]>,
    /// Next position to hand out.
    cursor: usize,
    resolved: Option<IntervalState>,
}

impl<S: PostingSource> TermIterator<S> {
    pub fn new(source: S) -> Self {
        let indices = IndexSet::single(source.index());
        Self {
            source,
            indices,
            state: DocumentState::Unstarted,
            weight: 1.0,
            positions: SmallVec::new(),
            cursor: 0,
            resolved: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn index(&self) -> IndexId {
        self.source.index()
    }

    fn moved(&mut self, next: Option<DocId>) -> Option<DocId> {
        self.state = DocumentState::after(next);
        self.resolved = None;
        self.positions.clear();
        self.cursor = 0;
        next
    }

    fn load(&mut self) -> Result<IntervalState, QueryError> {
        if !self.source.has_positions() {
            return Ok(IntervalState::True);
        }
        self.positions.clear();
        self.cursor = 0;
        while let Some(position) = self.source.next_position()? {
            self.positions.push(position);
        }
        Ok(if self.positions.is_empty() {
            IntervalState::False
        } else {
            IntervalState::Ready
        })
    }
}

impl<S: PostingSource> DocumentIterator for TermIterator<S> {
    fn state(&self) -> DocumentState {
        self.state
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        if self.state.is_exhausted() {
            return Ok(None);
        }
        let next = self.source.next_document()?;
        Ok(self.moved(next))
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        if self.state.reached(target) {
            return Ok(self.state.document());
        }
        let next = self.source.skip_to(target)?;
        Ok(self.moved(next))
    }

    fn may_have_next(&self) -> bool {
        !self.state.is_exhausted() && self.source.may_have_next()
    }

    fn frequency(&self) -> Option<u64> {
        Some(self.source.frequency())
    }

    fn indices(&self) -> &IndexSet {
        &self.indices
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        if index != self.source.index() {
            return Ok(IntervalState::False);
        }
        if let Some(resolved) = self.resolved {
            return Ok(resolved);
        }
        let resolved = self.load()?;
        self.resolved = Some(resolved);
        Ok(resolved)
    }

    fn reset_intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        let state = self.intervals(index)?;
        if index == self.source.index() {
            self.cursor = 0;
        }
        Ok(state)
    }

    fn next_interval(&mut self, index: IndexId) -> Result<Option<Interval>, QueryError> {
        if self.intervals(index)? != IntervalState::Ready {
            return Ok(None);
        }
        let position = self.positions.get(self.cursor).copied();
        if position.is_some() {
            self.cursor += 1;
        }
        Ok(position.map(Interval::singleton))
    }

    fn extent(&self, index: IndexId) -> u32 {
        u32::from(index == self.source.index())
    }

    fn accept(
        &mut self,
        visitor: &mut dyn DocumentIteratorVisitor,
        _traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError> {
        Ok(visitor.visit_leaf(&LeafInfo {
            index: self.source.index(),
            term: Some(self.source.term()),
            term_number: self.source.term_number(),
            frequency: Some(self.source.frequency()),
            count: self.state.document().map(|_| self.source.count()),
            weight: self.weight,
        }))
    }

    fn dispose(&mut self) -> Result<(), QueryError> {
        self.source.dispose()
    }
}
