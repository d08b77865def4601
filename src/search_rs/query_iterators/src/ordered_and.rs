/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Ordered conjunction, and the document-level machinery it shares with phrases.

use smallvec::SmallVec;

use crate::and::{Leapfrog, count_sentinels, union_indices};
use crate::slots::{IndexSlots, Resolution};
use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, Position, QueryError};

/// Sentinel extreme larger than any position, with room for the offsets
/// subtracted from it.
const INFINITY: i64 = i64::MAX / 4;

/// An interval with signed extremes, so that unset entries can sit at minus infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub(crate) left: i64,
    pub(crate) right: i64,
}

impl Span {
    pub(crate) const MINUS_INFINITY: Self = Self {
        left: -INFINITY,
        right: -INFINITY,
    };
}

impl From<Interval> for Span {
    fn from(interval: Interval) -> Self {
        Self {
            left: i64::from(interval.left),
            right: i64::from(interval.right),
        }
    }
}

/// Builds a result interval from non-negative span extremes.
pub(crate) fn interval(left: i64, right: i64) -> Interval {
    debug_assert!(0 <= left && left <= right);
    Interval::new(left as Position, right as Position)
}

/// The per-document interval state of a positional conjunction.
pub(crate) trait SequenceIntervals: Default {
    const KIND: OperatorKind;

    /// Start over on the current document. Operands are all resolved, and at least
    /// one of them is neither `True` nor `False`.
    fn reset(
        &mut self,
        children: &[NodeId],
        gaps: &[u32],
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError>;

    fn next(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError>;

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32;
}

/// A conjunction over a single index that only accepts documents whose operand
/// intervals line up in query order.
///
/// Documents are aligned like a plain conjunction; a document is then kept only
/// if its interval stream is not `False`.
pub(crate) struct Sequence<S> {
    children: Vec<NodeId>,
    /// Gap before each operand; empty when the operator ignores gaps.
    gaps: Vec<u32>,
    leapfrog: Leapfrog,
    index: IndexId,
    indices: IndexSet,
    state: DocumentState,
    slots: IndexSlots<S>,
}

pub(crate) type OrderedAnd = Sequence<OrderedIntervals>;

impl<S: SequenceIntervals> Sequence<S> {
    pub(crate) fn new(
        children: Vec<NodeId>,
        gaps: Vec<u32>,
        below: ChildView<'_>,
        number_of_documents: u64,
    ) -> Result<Self, QueryError> {
        let indices = union_indices(&children, below);
        let index = indices
            .sole()
            .ok_or(QueryError::MultipleIndices { operator: S::KIND })?;
        let state = if children.iter().all(|&child| below.may_have_next(child)) {
            DocumentState::Unstarted
        } else {
            DocumentState::Exhausted
        };
        Ok(Self {
            leapfrog: Leapfrog::new(&children, below, number_of_documents),
            slots: IndexSlots::new(&indices),
            children,
            gaps,
            index,
            indices,
            state,
        })
    }

    fn moved(&mut self, next: Option<DocId>) {
        self.state = DocumentState::after(next);
        self.slots.invalidate();
    }

    /// Whether the current document, if any, has a non-`False` interval stream.
    fn settled(&mut self, below: &mut Children<'_>) -> Result<bool, QueryError> {
        Ok(self.state.is_exhausted()
            || self.intervals(below, self.index)? != IntervalState::False)
    }
}

impl<S: SequenceIntervals> Operator for Sequence<S> {
    fn kind(&self) -> OperatorKind {
        S::KIND
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
            let next = self.leapfrog.next(below)?;
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
        let next = self.leapfrog.skip_to(below, target)?;
        self.moved(next);
        if self.settled(below)? {
            return Ok(next);
        }
        self.next_document(below)
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        let children = &self.children;
        let gaps = &self.gaps;
        self.slots.resolve(below, index, |below, own| {
            let (trues, falses) = count_sentinels(children, below, index)?;
            Ok(if falses == children.len() {
                Resolution::False
            } else if trues + falses == children.len() {
                Resolution::True
            } else {
                Resolution::own(own.reset(children, gaps, below, index)?)
            })
        })
    }

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        for &child in &self.children {
            below.reset_intervals(child, index)?;
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
        self.slots
            .next_interval(below, index, |below, own| own.next(below, index))
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        self.slots
            .extent(below, index, |below, own| own.extent(below, index))
    }
}

/// Minimal intervals made of one interval per operand, in query order and pairwise
/// disjoint.
///
/// # Algorithm Overview
///
/// `curr[i]` is the current interval of the `i`-th operand with intervals. Operand
/// `i` is advanced until it starts after `curr[i - 1]` ends; once all are in order,
/// `curr[0].left..curr[m - 1].right` is a candidate. The first operand then moves
/// on, and the candidate is confirmed as soon as realignment can no longer fit a
/// shorter chain before the candidate's last interval. Intervals are only ever
/// advanced, so each is read once.
#[derive(Debug, Default)]
pub(crate) struct OrderedIntervals {
    real: SmallVec<[NodeId; 4]>,
    curr: SmallVec<[Span; 4]>,
    /// First operand that may be out of order with its predecessor.
    to_be_aligned: usize,
    end_of_process: bool,
    /// A confirmed interval not yet handed out.
    pending: Option<(i64, i64)>,
}

impl OrderedIntervals {
    fn fetch(
        &mut self,
        i: usize,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<bool, QueryError> {
        match below.next_interval(self.real[i], index)? {
            Some(interval) => {
                self.curr[i] = interval.into();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn advance(&mut self, below: &mut Children<'_>, index: IndexId) -> Result<(), QueryError> {
        let m = self.real.len() as i64;
        let mut next_left = INFINITY;
        let mut next_right = INFINITY;
        let mut left_of_last = INFINITY - 1;
        let mut i = self.to_be_aligned;

        loop {
            loop {
                // No chain fitting before the candidate's last interval is left.
                if self.curr[i - 1].right >= left_of_last - (m - i as i64 - 1) {
                    self.to_be_aligned = i;
                    self.pending = Some((next_left, next_right));
                    return Ok(());
                }
                if i as i64 == m || self.curr[i].left > self.curr[i - 1].right {
                    break;
                }
                loop {
                    let saturated = self.curr[i].right >= left_of_last - (m - i as i64 - 2);
                    if saturated || !self.fetch(i, below, index)? {
                        self.to_be_aligned = i;
                        self.end_of_process = !saturated;
                        self.pending = (next_left != INFINITY).then_some((next_left, next_right));
                        return Ok(());
                    }
                    if self.curr[i].left > self.curr[i - 1].right {
                        break;
                    }
                }
                i += 1;
            }

            next_left = self.curr[0].left;
            next_right = self.curr[self.curr.len() - 1].right;
            left_of_last = self.curr[self.curr.len() - 1].left;
            i = 1;
            if !self.fetch(0, below, index)? {
                self.end_of_process = true;
                self.pending = Some((next_left, next_right));
                return Ok(());
            }
        }
    }
}

impl SequenceIntervals for OrderedIntervals {
    const KIND: OperatorKind = OperatorKind::OrderedAnd;

    fn reset(
        &mut self,
        children: &[NodeId],
        _gaps: &[u32],
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.real.clear();
        self.curr.clear();
        for &child in children {
            match below.intervals(child, index)? {
                IntervalState::True => {}
                IntervalState::False => return Ok(IntervalState::False),
                IntervalState::Ready => {
                    self.real.push(child);
                    self.curr.push(Span::MINUS_INFINITY);
                }
            }
        }
        if self.real.is_empty() {
            return Ok(IntervalState::True);
        }

        self.to_be_aligned = 1;
        self.end_of_process = false;
        self.pending = None;
        if !self.fetch(0, below, index)? {
            return Ok(IntervalState::False);
        }
        self.advance(below, index)?;
        Ok(if self.pending.is_some() {
            IntervalState::Ready
        } else {
            IntervalState::False
        })
    }

    fn next(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        if self.pending.is_none() {
            if self.end_of_process {
                return Ok(None);
            }
            self.advance(below, index)?;
        }
        Ok(self.pending.take().map(|(left, right)| interval(left, right)))
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        self.real
            .iter()
            .map(|&child| below.extent(child, index))
            .sum()
    }
}
