/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Phrases: operands whose intervals follow each other at fixed distances.

use smallvec::SmallVec;

use crate::ordered_and::{Sequence, SequenceIntervals, Span, interval};
use crate::tree::{ChildView, Children, NodeId, OperatorKind};
use crate::{IndexId, Interval, IntervalState, QueryError};

pub(crate) type Consecutive = Sequence<ConsecutiveIntervals>;

/// Intervals made of one interval per operand, each starting exactly
/// `gap + 1` positions after the previous one ends.
///
/// Operands that are `True` contribute no interval; their gap is carried over to
/// the next operand with intervals. The gap of the first operand is a margin kept
/// free before the result, so results are widened to the left by it.
#[derive(Debug, Default)]
pub(crate) struct ConsecutiveIntervals {
    real: SmallVec<[NodeId; 4]>,
    /// `actual_gaps[i]` is the required distance between `curr[i - 1].right` and
    /// `curr[i].left`; `actual_gaps[0]` is the leading margin.
    actual_gaps: SmallVec<[i64; 4]>,
    curr: SmallVec<[Span; 4]>,
    end_of_process: bool,
    /// `reset` already aligned the first result.
    first_ready: bool,
}

impl ConsecutiveIntervals {
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
            None => {
                self.end_of_process = true;
                Ok(false)
            }
        }
    }

    /// Move the operands forward until they line up, starting from `curr[0]`.
    fn align(&mut self, below: &mut Children<'_>, index: IndexId) -> Result<bool, QueryError> {
        let m = self.real.len();
        let mut k = 0;
        while k < m {
            k = 1;
            while k < m {
                let target = self.curr[k - 1].right + self.actual_gaps[k];
                while self.curr[k].left < target {
                    if !self.fetch(k, below, index)? {
                        return Ok(false);
                    }
                }
                if self.curr[k].left > target {
                    if !self.fetch(0, below, index)? {
                        return Ok(false);
                    }
                    break;
                }
                k += 1;
            }
        }
        Ok(true)
    }
}

impl SequenceIntervals for ConsecutiveIntervals {
    const KIND: OperatorKind = OperatorKind::Consecutive;

    fn reset(
        &mut self,
        children: &[NodeId],
        gaps: &[u32],
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.real.clear();
        self.curr.clear();
        self.actual_gaps.clear();
        self.actual_gaps.push(-1);
        for (&child, &gap) in children.iter().zip(gaps) {
            let last = self.actual_gaps.len() - 1;
            self.actual_gaps[last] += i64::from(gap);
            match below.intervals(child, index)? {
                IntervalState::True => {}
                IntervalState::False => return Ok(IntervalState::False),
                IntervalState::Ready => {
                    self.actual_gaps[last] += 1;
                    self.real.push(child);
                    self.curr.push(Span::MINUS_INFINITY);
                    self.actual_gaps.push(0);
                }
            }
        }
        if self.real.is_empty() {
            return Ok(IntervalState::True);
        }

        self.end_of_process = false;
        self.first_ready = false;
        // The first operand must leave room for the leading margin.
        loop {
            if !self.fetch(0, below, index)? {
                return Ok(IntervalState::False);
            }
            if self.curr[0].left >= self.actual_gaps[0] {
                break;
            }
        }
        self.first_ready = self.align(below, index)?;
        Ok(if self.first_ready {
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
        if self.first_ready {
            self.first_ready = false;
        } else if self.end_of_process
            || !self.fetch(0, below, index)?
            || !self.align(below, index)?
        {
            return Ok(None);
        }
        let last = self.curr[self.curr.len() - 1];
        Ok(Some(interval(self.curr[0].left - self.actual_gaps[0], last.right)))
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        if self.real.is_empty() {
            return 0;
        }
        let spread: i64 = self
            .real
            .iter()
            .zip(&self.actual_gaps)
            .map(|(&child, &gap)| i64::from(below.extent(child, index)) + gap)
            .sum();
        let extent = spread - self.real.len() as i64 + 1;
        u32::try_from(extent.max(0)).unwrap_or(u32::MAX)
    }
}
