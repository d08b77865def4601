/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Containment: intervals of the first operand that contain an interval of the second.

use smallvec::SmallVec;

use crate::slots::{IndexSlots, Resolution};
use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, QueryError};

/// The operands of a containment and the margins widening the first operand's
/// intervals before testing containment.
#[derive(Debug, Clone, Copy)]
struct Operands {
    first: NodeId,
    second: NodeId,
    first_index: IndexId,
    second_index: IndexId,
    left_margin: i64,
    right_margin: i64,
}

/// Documents on which both operands match and some interval of `first`, widened by
/// the margins, contains an interval of `second`.
///
/// Both operands must span a single index; the result spans the index of `first`.
pub(crate) struct Containment {
    children: [NodeId; 2],
    operands: Operands,
    indices: IndexSet,
    state: DocumentState,
    slots: IndexSlots<ContainmentIntervals>,
}

impl Containment {
    pub(crate) fn new(
        first: NodeId,
        second: NodeId,
        left_margin: u32,
        right_margin: u32,
        below: ChildView<'_>,
    ) -> Result<Self, QueryError> {
        let single = |child| {
            below.indices(child).sole().ok_or(QueryError::MultipleIndices {
                operator: OperatorKind::Containment,
            })
        };
        let operands = Operands {
            first,
            second,
            first_index: single(first)?,
            second_index: single(second)?,
            left_margin: i64::from(left_margin),
            right_margin: i64::from(right_margin),
        };
        let indices = below.indices(first).clone();
        Ok(Self {
            children: [first, second],
            operands,
            slots: IndexSlots::new(&indices),
            indices,
            state: DocumentState::Unstarted,
        })
    }

    /// The first document at or beyond `first` on which both operands match.
    fn align(
        &self,
        below: &mut Children<'_>,
        mut first: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        let mut second = None;
        loop {
            match second {
                Some(doc) if doc == first => return Ok(Some(first)),
                Some(doc) if first < doc => match below.skip_to(self.operands.first, doc)? {
                    Some(doc) => first = doc,
                    None => return Ok(None),
                },
                _ => match below.skip_to(self.operands.second, first)? {
                    Some(doc) => second = Some(doc),
                    None => return Ok(None),
                },
            }
        }
    }

    fn moved(&mut self, next: Option<DocId>) {
        self.state = DocumentState::after(next);
        self.slots.invalidate();
    }

    fn settled(&mut self, below: &mut Children<'_>) -> Result<bool, QueryError> {
        Ok(self.state.is_exhausted()
            || self.intervals(below, self.operands.first_index)? != IntervalState::False)
    }
}

impl Operator for Containment {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Containment
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
            let next = match below.next_document(self.operands.first)? {
                Some(first) => self.align(below, first)?,
                None => None,
            };
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
        let next = match below.skip_to(self.operands.first, target)? {
            Some(first) => self.align(below, first)?,
            None => None,
        };
        self.moved(next);
        if self.settled(below)? {
            return Ok(next);
        }
        self.next_document(below)
    }

    fn may_have_next(&self, below: ChildView<'_>) -> bool {
        !self.state.is_exhausted() && below.may_have_next(self.operands.first)
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        let operands = self.operands;
        self.slots.resolve(below, index, |below, own| {
            let first = below.intervals(operands.first, operands.first_index)?;
            if first == IntervalState::False {
                return Ok(Resolution::False);
            }
            Ok(match below.intervals(operands.second, operands.second_index)? {
                IntervalState::False => Resolution::False,
                IntervalState::True => Resolution::delegate(operands.first, first),
                IntervalState::Ready if first == IntervalState::True => Resolution::False,
                IntervalState::Ready => Resolution::own(own.reset(operands, below)?),
            })
        })
    }

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        below.reset_intervals(self.operands.first, self.operands.first_index)?;
        below.reset_intervals(self.operands.second, self.operands.second_index)?;
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
            .next_interval(below, index, |below, own| own.next(operands, below))
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        let first = self.operands.first;
        self.slots
            .extent(below, index, |below, _| below.extent(first, index))
    }

    fn true_path_children(
        &mut self,
        _below: &mut Children<'_>,
    ) -> Result<SmallVec<[NodeId; 4]>, QueryError> {
        Ok(SmallVec::from_slice(&[self.operands.first]))
    }
}

#[derive(Debug, Default)]
struct ContainmentIntervals {
    last_second: Option<Interval>,
    /// The first result, computed by `reset`.
    pending: Option<Interval>,
}

impl ContainmentIntervals {
    fn reset(
        &mut self,
        operands: Operands,
        below: &mut Children<'_>,
    ) -> Result<IntervalState, QueryError> {
        self.pending = None;
        self.last_second = below.next_interval(operands.second, operands.second_index)?;
        self.pending = self.next(operands, below)?;
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
    ) -> Result<Option<Interval>, QueryError> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        while let Some(interval) = below.next_interval(operands.first, operands.first_index)? {
            let left = i64::from(interval.left) - operands.left_margin;
            let right = i64::from(interval.right) + operands.right_margin;
            // Second intervals starting before the widened first interval can
            // never be contained by a later first interval either.
            loop {
                let Some(second) = self.last_second else {
                    return Ok(None);
                };
                if i64::from(second.left) >= left {
                    break;
                }
                self.last_second =
                    below.next_interval(operands.second, operands.second_index)?;
            }
            if let Some(second) = self.last_second
                && i64::from(second.right) <= right
            {
                return Ok(Some(interval));
            }
        }
        Ok(None)
    }
}
