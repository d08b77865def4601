/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Query evaluation over inverted-index postings.
//!
//! Every operator is a [`DocumentIterator`]: it yields a strictly increasing
//! stream of document pointers and, for each document, the minimal intervals
//! witnessing the match on each index it covers. Composite queries are assembled
//! with a [`QueryBuilder`] into an arena-backed [`QueryTree`].

use std::ops::ControlFlow;

use thiserror::Error;

mod align;
mod and;
pub mod builder;
mod consecutive;
pub mod constant;
mod containment;
mod difference;
pub mod index;
pub mod interval;
mod low_pass;
pub mod memory;
mod not;
mod or;
mod ordered_and;
pub mod payload;
pub mod posting;
mod remapping;
mod slots;
pub mod term;
pub mod tree;
pub mod util;
pub mod visitor;

pub use builder::QueryBuilder;
pub use constant::{FalseIterator, TrueIterator};
pub use index::{IndexId, IndexInfo, IndexSet};
pub use interval::{
    DocumentIteratorExt, Interval, IntervalIterator, IntervalIteratorResult, Intervals,
};
pub use memory::{MemoryIndex, MemoryIndexBuilder, MemoryPostings};
pub use payload::PayloadPredicate;
pub use posting::{Payload, PostingSource};
pub use term::TermIterator;
pub use tree::{NodeId, OperatorKind, QueryTree};
pub use visitor::{
    CounterCollector, DocumentIteratorVisitor, LeafInfo, TermCollector, Traversal,
};

/// A document pointer, an ordinal in `[0, number_of_documents)`.
pub type DocId = u64;

/// A position within a document.
pub type Position = u32;

#[derive(Debug, Error)]
/// A failure while building or evaluating a query.
pub enum QueryError {
    /// A posting source failed to read.
    #[error("failed to read from posting source")]
    Io(#[from] std::io::Error),
    /// An operator that needs at least one operand was given none.
    #[error("{operator} needs at least one operand")]
    EmptyOperands { operator: OperatorKind },
    /// The gap array of a consecutive operator does not match its operands.
    #[error("{gaps} gaps given for {operands} operands")]
    GapCountMismatch { gaps: usize, operands: usize },
    /// An operator that works on a single index was given a multi-index operand.
    #[error("{operator} operands must span exactly one index")]
    MultipleIndices { operator: OperatorKind },
    /// A node id that was not handed out by this builder.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    /// A node was used as the operand of more than one operator.
    #[error("node {0} already has a parent")]
    NodeReused(NodeId),
    /// A node was built but never attached below the root.
    #[error("node {0} is not reachable from the root")]
    DetachedNode(NodeId),
    /// An index remapping that does not fit the remapped iterator.
    #[error("cannot remap index {from} to index {to}")]
    InvalidRemapping { from: IndexId, to: IndexId },
    /// Intervals were requested while the iterator is not on a document.
    #[error("iterator is not positioned on a document")]
    NotPositioned,
    /// The sole-index accessor was used on an iterator spanning several indices.
    #[error("iterator does not span exactly one index")]
    NoSoleIndex,
    /// A pointer outside the collection was handed to a pointer mapping.
    #[error("pointer {pointer} is out of range (limit {limit})")]
    PointerOutOfRange { pointer: DocId, limit: DocId },
}

/// Where a [`DocumentIterator`] stands in its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentState {
    /// No positioning call has been made yet.
    #[default]
    Unstarted,
    /// Positioned on the given document.
    Positioned(DocId),
    /// The stream is over.
    Exhausted,
}

impl DocumentState {
    /// The current document, `None` unless positioned.
    pub const fn document(self) -> Option<DocId> {
        match self {
            Self::Positioned(doc) => Some(doc),
            Self::Unstarted | Self::Exhausted => None,
        }
    }

    pub const fn is_exhausted(self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// Whether `skip_to(target)` is a no-op from this state.
    pub const fn reached(self, target: DocId) -> bool {
        match self {
            Self::Positioned(doc) => doc >= target,
            Self::Exhausted => true,
            Self::Unstarted => false,
        }
    }

    /// The state after a positioning call returned `next`.
    pub const fn after(next: Option<DocId>) -> Self {
        match next {
            Some(doc) => Self::Positioned(doc),
            None => Self::Exhausted,
        }
    }

    /// The current document, or a [`QueryError::NotPositioned`] error.
    pub fn positioned(self) -> Result<DocId, QueryError> {
        self.document().ok_or(QueryError::NotPositioned)
    }
}

/// The outcome of [`DocumentIterator::skip_unconditionally_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnconditionalSkip {
    /// The iterator reached this document and its filter accepts it.
    Accepted(DocId),
    /// The iterator reached this document but its filter rejects it.
    Rejected(DocId),
    /// No document at or beyond the target.
    Exhausted,
}

/// The interval availability of an iterator on its current document, for one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalState {
    /// The document matches without a specific witness.
    True,
    /// The document does not match on this index.
    False,
    /// Intervals can be read with [`DocumentIterator::next_interval`].
    Ready,
}

/// A stream of documents, each carrying per-index interval witnesses.
///
/// Document pointers are strictly increasing. Interval access is only valid while
/// the iterator is positioned on a document, and interval state is rebuilt lazily
/// after each move.
pub trait DocumentIterator {
    /// Where the iterator stands.
    fn state(&self) -> DocumentState;

    /// The current document, `None` unless positioned.
    fn document(&self) -> Option<DocId> {
        self.state().document()
    }

    /// Advance to the next document, returning `None` once exhausted.
    fn next_document(&mut self) -> Result<Option<DocId>, QueryError>;

    /// Advance to the first document at or beyond `target`.
    ///
    /// If the iterator is already at or beyond `target` this is a no-op returning the
    /// current document. The returned document is never returned again by
    /// [`DocumentIterator::next_document`].
    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError>;

    /// Like [`DocumentIterator::skip_to`], but a filtering leaf reports whether the
    /// reached document passes its filter instead of skipping past rejected ones.
    fn skip_unconditionally_to(&mut self, target: DocId) -> Result<UnconditionalSkip, QueryError> {
        Ok(match self.skip_to(target)? {
            Some(doc) => UnconditionalSkip::Accepted(doc),
            None => UnconditionalSkip::Exhausted,
        })
    }

    /// Whether this iterator filters postings by payload.
    fn is_payload_filtered(&self) -> bool {
        false
    }

    /// Conservative liveness hint: `false` means certainly exhausted.
    fn may_have_next(&self) -> bool;

    /// Number of postings, for leaves backed by a posting list.
    fn frequency(&self) -> Option<u64> {
        None
    }

    /// The indices this iterator can produce intervals for.
    fn indices(&self) -> &IndexSet;

    /// Opaque multiplier consumed by scorers.
    fn weight(&self) -> f64 {
        1.0
    }

    /// Resolve the interval state for `index` on the current document.
    ///
    /// Repeated calls on the same document return the cached state.
    fn intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError>;

    /// Restart interval enumeration for `index` on the current document.
    fn reset_intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError>;

    /// The next interval for `index`, in increasing order.
    fn next_interval(&mut self, index: IndexId) -> Result<Option<Interval>, QueryError>;

    /// A lower bound on the length of any interval produced for `index`.
    fn extent(&self, index: IndexId) -> u32;

    /// Walk the iterator with `visitor`.
    fn accept(
        &mut self,
        visitor: &mut dyn DocumentIteratorVisitor,
        traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError>;

    /// Release the resources held by the leaves.
    fn dispose(&mut self) -> Result<(), QueryError> {
        Ok(())
    }
}

impl<T: DocumentIterator + ?Sized> DocumentIterator for Box<T> {
    fn state(&self) -> DocumentState {
        (**self).state()
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        (**self).next_document()
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        (**self).skip_to(target)
    }

    fn skip_unconditionally_to(&mut self, target: DocId) -> Result<UnconditionalSkip, QueryError> {
        (**self).skip_unconditionally_to(target)
    }

    fn is_payload_filtered(&self) -> bool {
        (**self).is_payload_filtered()
    }

    fn may_have_next(&self) -> bool {
        (**self).may_have_next()
    }

    fn frequency(&self) -> Option<u64> {
        (**self).frequency()
    }

    fn indices(&self) -> &IndexSet {
        (**self).indices()
    }

    fn weight(&self) -> f64 {
        (**self).weight()
    }

    fn intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        (**self).intervals(index)
    }

    fn reset_intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        (**self).reset_intervals(index)
    }

    fn next_interval(&mut self, index: IndexId) -> Result<Option<Interval>, QueryError> {
        (**self).next_interval(index)
    }

    fn extent(&self, index: IndexId) -> u32 {
        (**self).extent(index)
    }

    fn accept(
        &mut self,
        visitor: &mut dyn DocumentIteratorVisitor,
        traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError> {
        (**self).accept(visitor, traversal)
    }

    fn dispose(&mut self) -> Result<(), QueryError> {
        (**self).dispose()
    }
}
