/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Difference: intervals of the minuend that contain no interval of the subtrahend.

use smallvec::SmallVec;

use crate::slots::{IndexSlots, Resolution};
use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, QueryError};

#[derive(Debug, Clone, Copy)]
struct Operands {
    minuend: NodeId,
    subtrahend: NodeId,
    left_margin: i64,
    right_margin: i64,
}

/// Documents of the minuend, restricted to the minuend intervals that, once
/// widened by the margins, contain no subtrahend interval.
///
/// A document the subtrahend does not match keeps all of the minuend's
/// intervals. Documents left with no interval on any index are skipped.
pub(crate) struct Difference {
    children: [NodeId; 2],
    operands: Operands,
    /// The subtrahend might match some document.
    maybe_non_empty_subtrahend: bool,
    /// The subtrahend does not match the current document.
    no_subtrahend: bool,
    indices: IndexSet,
    state: DocumentState,
    slots: IndexSlots<DifferenceIntervals>,
}

impl Difference {
    pub(crate) fn new(
        minuend: NodeId,
        subtrahend: NodeId,
        left_margin: u32,
        right_margin: u32,
        below: ChildView<'_>,
    ) -> Self {
        let indices = below.indices(minuend).clone();
        Self {
            children: [minuend, subtrahend],
            operands: Operands {
                minuend,
                subtrahend,
                left_margin: i64::from(left_margin),
                right_margin: i64::from(right_margin),
            },
            maybe_non_empty_subtrahend: below.may_have_next(subtrahend),
            no_subtrahend: true,
            slots: IndexSlots::new(&indices),
            indices,
            state: DocumentState::Unstarted,
        }
    }

    fn moved(&mut self, next: Option<DocId>) {
        self.state = DocumentState::after(next);
        self.slots.invalidate();
    }

    /// Whether the current document is left with no interval at all.
    fn no_intervals(&mut self, below: &mut Children<'_>) -> Result<bool, QueryError> {
        let doc = self.state.positioned()?;
        self.no_subtrahend = !self.maybe_non_empty_subtrahend
            || below.skip_to(self.operands.subtrahend, doc)? != Some(doc);
        if self.no_subtrahend {
            return Ok(false);
        }
        for index in self.indices.clone().iter() {
            if self.intervals(below, index)? != IntervalState::False {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Operator for Difference {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Difference
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
            let next = below.next_document(self.operands.minuend)?;
            self.moved(next);
            if next.is_none() || !self.no_intervals(below)? {
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
        let next = below.skip_to(self.operands.minuend, target)?;
        self.moved(next);
        if next.is_none() || !self.no_intervals(below)? {
            return Ok(next);
        }
        self.next_document(below)
    }

    fn may_have_next(&self, below: ChildView<'_>) -> bool {
        !self.state.is_exhausted() && below.may_have_next(self.operands.minuend)
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        let operands = self.operands;
        let subtracting = self.maybe_non_empty_subtrahend && !self.no_subtrahend;
        self.slots.resolve(below, index, |below, own| {
            let minuend = below.intervals(operands.minuend, index)?;
            if minuend == IntervalState::False {
                return Ok(Resolution::False);
            }
            if subtracting {
                let subtrahend = below.intervals(operands.subtrahend, index)?;
                if subtrahend == IntervalState::True {
                    return Ok(Resolution::False);
                }
                if minuend != IntervalState::True && subtrahend != IntervalState::False {
                    return Ok(Resolution::own(own.reset(operands, below, index)?));
                }
            }
            Ok(Resolution::delegate(operands.minuend, minuend))
        })
    }

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        below.reset_intervals(self.operands.minuend, index)?;
        if self.maybe_non_empty_subtrahend && !self.no_subtrahend {
            below.reset_intervals(self.operands.subtrahend, index)?;
        }
        self.slots.unresolve(index);
        self.intervals(below, index)
    }

    fn next_interval(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        self.intervals(below, index)?;
        let operands = self.operands;
        self.slots
            .next_interval(below, index, |below, own| own.next(operands, below, index))
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        let minuend = self.operands.minuend;
        self.slots
            .extent(below, index, |below, _| below.extent(minuend, index))
    }

    fn true_path_children(
        &mut self,
        _below: &mut Children<'_>,
    ) -> Result<SmallVec<[NodeId; 4]>, QueryError> {
        Ok(SmallVec::from_slice(&[self.operands.minuend]))
    }
}

#[derive(Debug, Default)]
struct DifferenceIntervals {
    /// Whether `subtrahend` holds the subtrahend's current interval yet.
    started: bool,
    subtrahend: Option<Interval>,
    pending: Option<Interval>,
}

impl DifferenceIntervals {
    fn reset(
        &mut self,
        operands: Operands,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.started = false;
        self.subtrahend = None;
        self.pending = None;
        self.pending = self.next(operands, below, index)?;
        Ok(if self.pending.is_some() {
            IntervalState::Ready
        } else {
            IntervalState::False
        })
    }

    fn next(
        &mut self,
        operands: Operands,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        if !self.started {
            self.started = true;
            self.subtrahend = below.next_interval(operands.subtrahend, index)?;
        }

        let widened_left = |s: Interval| i64::from(s.left) - operands.left_margin;
        let widened_right = |s: Interval| i64::from(s.right) + operands.right_margin;
        while let Some(minuend) = below.next_interval(operands.minuend, index)? {
            let (left, right) = (i64::from(minuend.left), i64::from(minuend.right));
            while let Some(s) = self.subtrahend
                && widened_left(s) < left
                && widened_right(s) < right
            {
                self.subtrahend = below.next_interval(operands.subtrahend, index)?;
            }
            match self.subtrahend {
                Some(s) if widened_left(s) >= left && widened_right(s) <= right => {}
                _ => return Ok(Some(minuend)),
            }
        }
        Ok(None)
    }
}
