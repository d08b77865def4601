/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Complement.

use smallvec::SmallVec;

use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, QueryError};

/// Documents of `[0, number_of_documents)` on which the operand does not match.
///
/// There is never a witness for a negated match: intervals are `True` on the
/// operand's indices and `False` elsewhere.
pub(crate) struct Not {
    children: [NodeId; 1],
    number_of_documents: u64,
    /// Next document to consider.
    next_candidate: DocId,
    /// Next document the operand excludes, `number_of_documents` once it is exhausted.
    next_to_skip: DocId,
    primed: bool,
    indices: IndexSet,
    state: DocumentState,
}

impl Not {
    pub(crate) fn new(child: NodeId, below: ChildView<'_>, number_of_documents: u64) -> Self {
        Self {
            children: [child],
            number_of_documents,
            next_candidate: 0,
            next_to_skip: 0,
            primed: false,
            indices: below.indices(child).clone(),
            state: DocumentState::Unstarted,
        }
    }

    fn child(&self) -> NodeId {
        self.children[0]
    }
}

impl Operator for Not {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Not
    }

    fn children(&self) -> &[NodeId] {
        &self.children
    }

    fn state(&self) -> DocumentState {
        self.state
    }

    fn indices(&self) -> &IndexSet {
        &self.indices
    }

    fn next_document(&mut self, below: &mut Children<'_>) -> Result<Option<DocId>, QueryError> {
        if !self.primed {
            self.primed = true;
            self.next_to_skip = below
                .next_document(self.child())?
                .unwrap_or(self.number_of_documents);
        }
        loop {
            if self.next_candidate >= self.number_of_documents {
                self.state = DocumentState::Exhausted;
                return Ok(None);
            }
            if self.next_candidate < self.next_to_skip {
                let doc = self.next_candidate;
                self.next_candidate += 1;
                self.state = DocumentState::Positioned(doc);
                return Ok(Some(doc));
            }
            self.next_candidate += 1;
            self.next_to_skip = below
                .next_document(self.child())?
                .unwrap_or(self.number_of_documents);
        }
    }

    fn skip_to(
        &mut self,
        below: &mut Children<'_>,
        target: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        if self.state.reached(target) {
            return Ok(self.state.document());
        }
        self.primed = true;
        self.next_candidate = target;
        self.next_to_skip = below
            .skip_to(self.child(), target)?
            .unwrap_or(self.number_of_documents);
        self.next_document(below)
    }

    fn may_have_next(&self, _below: ChildView<'_>) -> bool {
        !self.state.is_exhausted() && self.next_candidate < self.number_of_documents
    }

    fn intervals(
        &mut self,
        _below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        Ok(if self.indices.contains(index) {
            IntervalState::True
        } else {
            IntervalState::False
        })
    }

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.intervals(below, index)
    }

    fn next_interval(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        self.intervals(below, index)?;
        Ok(None)
    }

    fn extent(&self, _below: ChildView<'_>, _index: IndexId) -> u32 {
        0
    }

    fn true_path_children(
        &mut self,
        _below: &mut Children<'_>,
    ) -> Result<SmallVec<[NodeId; 4]>, QueryError> {
        Ok(SmallVec::new())
    }
}
