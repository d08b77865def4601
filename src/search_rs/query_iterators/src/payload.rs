/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Leaf filtering postings by payload.

use std::ops::ControlFlow;

use crate::{
    DocId, DocumentIterator, DocumentIteratorVisitor, DocumentState, IndexId, IndexSet, Interval,
    IntervalState, Payload, PostingSource, QueryError, TermIterator, Traversal,
    UnconditionalSkip,
};

/// Yields the documents of a term whose payload satisfies a predicate.
///
/// Skipping is cheap but evaluating the predicate is not, so conjunctions position
/// these leaves last with [`DocumentIterator::skip_unconditionally_to`], which
/// reports a rejected document instead of scanning past it.
pub struct PayloadPredicate<S, F> {
    inner: TermIterator<S>,
    predicate: F,
    /// The inner iterator sits on a document the predicate rejected.
    rejected: bool,
}

impl<S, F> PayloadPredicate<S, F>
where
    S: PostingSource,
    F: Fn(Payload) -> bool,
{
    pub fn new(inner: TermIterator<S>, predicate: F) -> Self {
        Self {
            inner,
            predicate,
            rejected: false,
        }
    }

    fn accepts(&self) -> bool {
        self.inner
            .source()
            .payload()
            .is_some_and(|payload| (self.predicate)(payload))
    }
}

impl<S, F> DocumentIterator for PayloadPredicate<S, F>
where
    S: PostingSource,
    F: Fn(Payload) -> bool,
{
    fn state(&self) -> DocumentState {
        self.inner.state()
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        self.rejected = false;
        while let Some(doc) = self.inner.next_document()? {
            if self.accepts() {
                return Ok(Some(doc));
            }
        }
        Ok(None)
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        if self.inner.state().reached(target) {
            if self.rejected {
                return self.next_document();
            }
            return Ok(self.inner.document());
        }
        self.rejected = false;
        match self.inner.skip_to(target)? {
            Some(_) if !self.accepts() => self.next_document(),
            next => Ok(next),
        }
    }

    fn skip_unconditionally_to(&mut self, target: DocId) -> Result<UnconditionalSkip, QueryError> {
        if !self.inner.state().reached(target) {
            self.inner.skip_to(target)?;
        }
        let Some(doc) = self.inner.document() else {
            return Ok(UnconditionalSkip::Exhausted);
        };
        self.rejected = !self.accepts();
        Ok(if self.rejected {
            UnconditionalSkip::Rejected(doc)
        } else {
            UnconditionalSkip::Accepted(doc)
        })
    }

    fn is_payload_filtered(&self) -> bool {
        true
    }

    fn may_have_next(&self) -> bool {
        self.inner.may_have_next()
    }

    fn frequency(&self) -> Option<u64> {
        self.inner.frequency()
    }

    fn indices(&self) -> &IndexSet {
        self.inner.indices()
    }

    fn weight(&self) -> f64 {
        self.inner.weight()
    }

    fn intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        self.inner.intervals(index)
    }

    fn reset_intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        self.inner.reset_intervals(index)
    }

    fn next_interval(&mut self, index: IndexId) -> Result<Option<Interval>, QueryError> {
        self.inner.next_interval(index)
    }

    fn extent(&self, index: IndexId) -> u32 {
        self.inner.extent(index)
    }

    fn accept(
        &mut self,
        visitor: &mut dyn DocumentIteratorVisitor,
        traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError> {
        self.inner.accept(visitor, traversal)
    }

    fn dispose(&mut self) -> Result<(), QueryError> {
        self.inner.dispose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryIndex;

    fn dated() -> MemoryIndex {
        MemoryIndex::builder(IndexId(0), "dated")
            .document_with_payload("news", 1990)
            .document_with_payload("news", 2005)
            .document("news")
            .document_with_payload("news", 2010)
            .build()
    }

    #[test]
    fn test_next_document_filters_by_payload() {
        let index = dated();
        let mut it = PayloadPredicate::new(index.documents("news"), |year| year >= 2000);
        assert_eq!(it.next_document().unwrap(), Some(1));
        assert_eq!(it.next_document().unwrap(), Some(3));
        assert_eq!(it.next_document().unwrap(), None);
    }

    #[test]
    fn test_skip_unconditionally_reports_rejection() {
        let index = dated();
        let mut it = PayloadPredicate::new(index.documents("news"), |year| year >= 2000);
        assert_eq!(it.skip_unconditionally_to(0).unwrap(), UnconditionalSkip::Rejected(0));
        assert_eq!(it.skip_unconditionally_to(1).unwrap(), UnconditionalSkip::Accepted(1));
        assert_eq!(it.skip_unconditionally_to(2).unwrap(), UnconditionalSkip::Rejected(2));
        assert_eq!(it.skip_to(2).unwrap(), Some(3));
        assert_eq!(it.skip_unconditionally_to(4).unwrap(), UnconditionalSkip::Exhausted);
    }

    #[test]
    fn test_skip_to_moves_past_rejected() {
        let index = dated();
        let mut it = PayloadPredicate::new(index.documents("news"), |year| year < 2000);
        assert!(it.is_payload_filtered());
        assert_eq!(it.skip_to(1).unwrap(), None);
    }
}
