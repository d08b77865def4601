/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Length filter on intervals.

use crate::slots::{IndexSlots, Resolution};
use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, QueryError};

/// The operand's documents and intervals, without intervals longer than
/// `threshold`.
///
/// `True` and `False` pass through, since their truth does not depend on length.
/// Documents left with no interval on any index are skipped.
pub(crate) struct LowPass {
    children: [NodeId; 1],
    threshold: u32,
    indices: IndexSet,
    state: DocumentState,
    slots: IndexSlots<LowPassIntervals>,
}

impl LowPass {
    pub(crate) fn new(child: NodeId, threshold: u32, below: ChildView<'_>) -> Self {
        let indices = below.indices(child).clone();
        Self {
            children: [child],
            threshold,
            slots: IndexSlots::new(&indices),
            indices,
            state: DocumentState::Unstarted,
        }
    }

    fn child(&self) -> NodeId {
        self.children[0]
    }

    fn moved(&mut self, next: Option<DocId>) {
        self.state = DocumentState::after(next);
        self.slots.invalidate();
    }

    fn settled(&mut self, below: &mut Children<'_>) -> Result<bool, QueryError> {
        if self.state.is_exhausted() {
            return Ok(true);
        }
        for index in self.indices.clone().iter() {
            if self.intervals(below, index)? != IntervalState::False {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Operator for LowPass {
    fn kind(&self) -> OperatorKind {
        OperatorKind::LowPass
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
        if self.state.is_exhausted() {
            return Ok(None);
        }
        loop {
            let next = below.next_document(self.child())?;
            self.moved(next);
            if self.settled(below)? {
                return Ok(next);
            }
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
        let next = below.skip_to(self.child(), target)?;
        self.moved(next);
        if self.settled(below)? {
            return Ok(next);
        }
        self.next_document(below)
    }

    fn may_have_next(&self, below: ChildView<'_>) -> bool {
        !self.state.is_exhausted() && below.may_have_next(self.child())
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        let (child, threshold) = (self.child(), self.threshold);
        self.slots.resolve(below, index, |below, own| {
            Ok(match below.intervals(child, index)? {
                IntervalState::True => Resolution::True,
                IntervalState::False => Resolution::False,
                IntervalState::Ready => Resolution::own(own.reset(child, threshold, below, index)?),
            })
        })
    }

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        below.reset_intervals(self.child(), index)?;
        self.slots.unresolve(index);
        self.intervals(below, index)
    }

    fn next_interval(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        self.intervals(below, index)?;
        let (child, threshold) = (self.child(), self.threshold);
        self.slots.next_interval(below, index, |below, own| {
            own.next(child, threshold, below, index)
        })
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        let (child, threshold) = (self.child(), self.threshold);
        self.slots.extent(below, index, |below, _| {
            below.extent(child, index).min(threshold)
        })
    }
}

#[derive(Debug, Default)]
struct LowPassIntervals {
    pending: Option<Interval>,
}

impl LowPassIntervals {
    fn reset(
        &mut self,
        child: NodeId,
        threshold: u32,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.pending = None;
        self.pending = self.next(child, threshold, below, index)?;
        Ok(if self.pending.is_some() {
            IntervalState::Ready
        } else {
            IntervalState::False
        })
    }

    fn next(
        &mut self,
        child: NodeId,
        threshold: u32,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        while let Some(interval) = below.next_interval(child, index)? {
            if interval.length() <= threshold {
                return Ok(Some(interval));
            }
        }
        Ok(None)
    }
}
