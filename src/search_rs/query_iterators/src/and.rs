/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Conjunction.
//!
//! The document-level alignment here is shared by every conjunctive operator
//! (ordered and consecutive included); [`AndIntervals`] computes the minimal
//! intervals covering one interval of each operand.

use std::cmp::Reverse;

use tracing::debug;

use crate::interval::StartsFirst;
use crate::slots::{IndexSlots, Resolution};
use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::util::SemiIndirectHeap;
use crate::{
    DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, Position, QueryError,
    UnconditionalSkip,
};

/// Leapfrog alignment of conjunctive operands.
///
/// # Algorithm Overview
///
/// Operands are ordered once: payload-filtered leaves first, then composites, then
/// leaves by decreasing frequency. The last operand, the rarest, drives the
/// iteration. To align on a candidate:
///
/// 1. Skip every plain operand, last to first, to the candidate. An operand that
///    lands beyond it makes the landing document the new candidate, and the pass
///    restarts.
/// 2. Position each payload-filtered operand with an unconditional skip. A rejected
///    document moves the candidate just past it; a later document becomes the new
///    candidate. Either way the pass restarts.
/// 3. When every operand agrees the candidate is a match.
#[derive(Debug)]
pub(crate) struct Leapfrog {
    order: Vec<NodeId>,
    /// `order[..predicates]` are the payload-filtered operands.
    predicates: usize,
    number_of_documents: u64,
}

impl Leapfrog {
    pub(crate) fn new(children: &[NodeId], below: ChildView<'_>, number_of_documents: u64) -> Self {
        let mut order = children.to_vec();
        order.sort_by_key(|&child| {
            if below.is_payload_filtered(child) {
                (0, Reverse(0))
            } else {
                match below.frequency(child) {
                    None => (1, Reverse(0)),
                    Some(frequency) => (2, Reverse(frequency)),
                }
            }
        });
        let predicates = order
            .iter()
            .take_while(|&&child| below.is_payload_filtered(child))
            .count();
        Self {
            order,
            predicates,
            number_of_documents,
        }
    }

    /// The operand driving the iteration.
    pub(crate) fn driver(&self) -> NodeId {
        self.order[self.order.len() - 1]
    }

    /// The first document at or beyond `candidate` on which all operands agree.
    pub(crate) fn align(
        &self,
        below: &mut Children<'_>,
        mut candidate: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        'restart: loop {
            for &child in self.order[self.predicates..].iter().rev() {
                match below.skip_to(child, candidate)? {
                    None => return Ok(None),
                    Some(doc) if doc != candidate => {
                        candidate = doc;
                        continue 'restart;
                    }
                    Some(_) => {}
                }
            }
            for &child in self.order[..self.predicates].iter().rev() {
                match below.skip_unconditionally_to(child, candidate)? {
                    UnconditionalSkip::Exhausted => return Ok(None),
                    UnconditionalSkip::Accepted(doc) if doc == candidate => {}
                    UnconditionalSkip::Accepted(doc) => {
                        candidate = doc;
                        continue 'restart;
                    }
                    UnconditionalSkip::Rejected(doc) => {
                        candidate = doc + 1;
                        if candidate >= self.number_of_documents {
                            return Ok(None);
                        }
                        continue 'restart;
                    }
                }
            }
            return Ok(Some(candidate));
        }
    }

    /// Advance the driver and align.
    pub(crate) fn next(&self, below: &mut Children<'_>) -> Result<Option<DocId>, QueryError> {
        match below.next_document(self.driver())? {
            Some(doc) => self.align(below, doc),
            None => Ok(None),
        }
    }

    /// Skip the driver to `target` and align.
    pub(crate) fn skip_to(
        &self,
        below: &mut Children<'_>,
        target: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        match below.skip_to(self.driver(), target)? {
            Some(doc) => self.align(below, doc),
            None => Ok(None),
        }
    }
}

/// Counts how many of `children` are `True` and how many are `False` on `index`.
pub(crate) fn count_sentinels(
    children: &[NodeId],
    below: &mut Children<'_>,
    index: IndexId,
) -> Result<(usize, usize), QueryError> {
    let mut sentinels = (0, 0);
    for &child in children {
        match below.intervals(child, index)? {
            IntervalState::True => sentinels.0 += 1,
            IntervalState::False => sentinels.1 += 1,
            IntervalState::Ready => {}
        }
    }
    Ok(sentinels)
}

/// Union of the indices of `children`.
pub(crate) fn union_indices(children: &[NodeId], below: ChildView<'_>) -> IndexSet {
    let mut indices = IndexSet::new();
    for &child in children {
        indices.extend_from(below.indices(child));
    }
    indices
}

/// Documents on which every operand matches.
pub(crate) struct And {
    children: Vec<NodeId>,
    leapfrog: Leapfrog,
    indices: IndexSet,
    state: DocumentState,
    slots: IndexSlots<AndIntervals>,
}

impl And {
    pub(crate) fn new(children: Vec<NodeId>, below: ChildView<'_>, number_of_documents: u64) -> Self {
        let leapfrog = Leapfrog::new(&children, below, number_of_documents);
        let indices = union_indices(&children, below);
        // An operand known to be empty empties the conjunction.
        let state = if children.iter().all(|&child| below.may_have_next(child)) {
            DocumentState::Unstarted
        } else {
            debug!(operands = children.len(), "conjunction has an empty operand");
            DocumentState::Exhausted
        };
        Self {
            slots: IndexSlots::new(&indices),
            children,
            leapfrog,
            indices,
            state,
        }
    }

    fn moved(&mut self, next: Option<DocId>) -> Option<DocId> {
        self.state = DocumentState::after(next);
        self.slots.invalidate();
        next
    }
}

impl Operator for And {
    fn kind(&self) -> OperatorKind {
        OperatorKind::And
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
        let next = self.leapfrog.next(below)?;
        Ok(self.moved(next))
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
        Ok(self.moved(next))
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        let children = &self.children;
        self.slots.resolve(below, index, |below, own| {
            let (trues, falses) = count_sentinels(children, below, index)?;
            Ok(if falses == children.len() {
                Resolution::False
            } else if trues + falses == children.len() {
                Resolution::True
            } else {
                Resolution::own(own.reset(children, below, index)?)
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
        let children = &self.children;
        self.slots
            .next_interval(below, index, |below, own| own.next(children, below, index))
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        let children = &self.children;
        self.slots.extent(below, index, |below, _| {
            children
                .iter()
                .map(|&child| below.extent(child, index))
                .max()
                .unwrap_or(0)
        })
    }
}

/// Minimal intervals containing one interval of every operand.
///
/// # Algorithm Overview
///
/// A heap orders the operands' current intervals by left extreme (longer first on
/// ties) while `max_right` tracks the largest right extreme among them. The span
/// from the top's left to `max_right` covers one interval of each operand. Advancing
/// the top can only shrink the span when its right extreme is below `max_right`, so
/// the top is advanced until that stops being true or the top runs out; the last
/// span seen is the next minimal interval.
#[derive(Debug, Default)]
pub(crate) struct AndIntervals {
    heap: SemiIndirectHeap<StartsFirst>,
    max_right: Position,
    last_left: Option<Position>,
    end_of_process: bool,
}

impl AndIntervals {
    fn reset(
        &mut self,
        children: &[NodeId],
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.heap
            .reset(children.len(), StartsFirst(Interval::singleton(0)));
        self.max_right = 0;
        self.last_left = None;
        self.end_of_process = false;

        for (slot, &child) in children.iter().enumerate() {
            if below.intervals(child, index)? != IntervalState::Ready {
                continue;
            }
            let Some(interval) = below.next_interval(child, index)? else {
                return Ok(IntervalState::False);
            };
            self.max_right = self.max_right.max(interval.right);
            self.heap.set_key(slot, StartsFirst(interval));
            self.heap.push(slot);
        }

        Ok(if self.heap.is_empty() {
            IntervalState::True
        } else {
            IntervalState::Ready
        })
    }

    fn next(
        &mut self,
        children: &[NodeId],
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        if self.end_of_process {
            return Ok(None);
        }

        // Intervals starting where the previous result started cannot be minimal.
        loop {
            let Some(top) = self.heap.peek() else {
                return Ok(None);
            };
            if Some(self.heap.key(top).0.left) != self.last_left {
                break;
            }
            match below.next_interval(children[top], index)? {
                None => {
                    self.end_of_process = true;
                    return Ok(None);
                }
                Some(interval) => {
                    self.max_right = self.max_right.max(interval.right);
                    self.heap.replace_root_key(StartsFirst(interval));
                }
            }
        }

        let (mut next_left, mut next_right);
        loop {
            let Some(top) = self.heap.peek() else {
                return Ok(None);
            };
            let current = self.heap.key(top).0;
            next_left = current.left;
            next_right = self.max_right;
            if current.right == self.max_right {
                break;
            }
            match below.next_interval(children[top], index)? {
                None => {
                    self.end_of_process = true;
                    break;
                }
                Some(interval) => {
                    self.max_right = self.max_right.max(interval.right);
                    self.heap.replace_root_key(StartsFirst(interval));
                }
            }
            if self.max_right != next_right {
                break;
            }
        }

        self.last_left = Some(next_left);
        Ok(Some(Interval::new(next_left, next_right)))
    }
}
