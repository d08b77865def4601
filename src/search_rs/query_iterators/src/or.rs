/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Disjunction.

use smallvec::SmallVec;

use crate::interval::EndsFirst;
use crate::slots::{IndexSlots, Resolution};
use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::util::SemiIndirectHeap;
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, Position, QueryError};

/// Heap key of an exhausted operand.
const END_OF_LIST: DocId = DocId::MAX;

/// Documents on which at least one operand matches.
///
/// # Algorithm Overview
///
/// A heap orders the operands by current document. Moving forward advances every
/// operand sitting on the current document, so each document is reported once.
/// The operands on the current document form the *front*; it is computed on
/// demand and cached until the next move.
pub(crate) struct Or {
    children: Vec<NodeId>,
    heap: SemiIndirectHeap<DocId>,
    /// Heap slots on the current document, valid while `front_valid`.
    front: Vec<usize>,
    front_valid: bool,
    indices: IndexSet,
    state: DocumentState,
    slots: IndexSlots<OrIntervals>,
}

impl Or {
    pub(crate) fn new(children: Vec<NodeId>, below: ChildView<'_>) -> Self {
        let mut heap = SemiIndirectHeap::new(vec![0; children.len()]);
        for (slot, &child) in children.iter().enumerate() {
            if below.may_have_next(child) {
                heap.push(slot);
            }
        }
        // Keep one operand around so the heap is never empty.
        if heap.is_empty() {
            heap.push(0);
        }
        let indices = crate::and::union_indices(&children, below);
        Self {
            slots: IndexSlots::new(&indices),
            front: Vec::with_capacity(children.len()),
            front_valid: false,
            children,
            heap,
            indices,
            state: DocumentState::Unstarted,
        }
    }

    fn moved(&mut self) -> Option<DocId> {
        let next = self.heap.peek_key().filter(|&doc| doc != END_OF_LIST);
        self.state = DocumentState::after(next);
        self.front_valid = false;
        self.slots.invalidate();
        next
    }

    fn refresh_front(&mut self) {
        if !self.front_valid {
            self.heap.front(&mut self.front);
            self.front_valid = true;
        }
    }
}

impl Operator for Or {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Or
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
        match self.state {
            DocumentState::Exhausted => return Ok(None),
            DocumentState::Unstarted => {
                for at in 0..self.heap.len() {
                    let slot = self.heap.slots()[at];
                    let doc = below.next_document(self.children[slot])?;
                    self.heap.set_key(slot, doc.unwrap_or(END_OF_LIST));
                }
                self.heap.rebuild();
            }
            DocumentState::Positioned(current) => {
                while let Some(top) = self.heap.peek() {
                    if self.heap.key(top) != current {
                        break;
                    }
                    let doc = below.next_document(self.children[top])?;
                    self.heap.replace_root_key(doc.unwrap_or(END_OF_LIST));
                }
            }
        }
        Ok(self.moved())
    }

    fn skip_to(
        &mut self,
        below: &mut Children<'_>,
        target: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        if self.state.reached(target) {
            return Ok(self.state.document());
        }
        for at in 0..self.heap.len() {
            let slot = self.heap.slots()[at];
            let doc = below.skip_to(self.children[slot], target)?;
            self.heap.set_key(slot, doc.unwrap_or(END_OF_LIST));
        }
        self.heap.rebuild();
        Ok(self.moved())
    }

    fn may_have_next(&self, below: ChildView<'_>) -> bool {
        match self.state {
            DocumentState::Unstarted => self
                .children
                .iter()
                .any(|&child| below.may_have_next(child)),
            DocumentState::Positioned(_) => true,
            DocumentState::Exhausted => false,
        }
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        self.refresh_front();
        let children = &self.children;
        let front = &self.front;
        self.slots.resolve(below, index, |below, own| {
            let (mut trues, mut falses, mut sole) = (0, 0, None);
            for &slot in front {
                match below.intervals(children[slot], index)? {
                    IntervalState::True => trues += 1,
                    IntervalState::False => falses += 1,
                    IntervalState::Ready => sole = Some(children[slot]),
                }
            }
            let size = front.len();
            Ok(if falses == size {
                Resolution::False
            } else if trues + falses == size {
                Resolution::True
            } else if trues + falses + 1 < size {
                Resolution::own(own.reset(children, front, below, index)?)
            } else {
                // Exactly one operand has intervals: its stream is the answer.
                sole.map_or(Resolution::False, Resolution::Delegate)
            })
        })
    }

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.state.positioned()?;
        self.refresh_front();
        for &slot in &self.front {
            below.reset_intervals(self.children[slot], index)?;
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
        self.slots.extent(below, index, |below, own| {
            own.real
                .iter()
                .map(|&slot| below.extent(children[slot], index))
                .min()
                .unwrap_or(0)
        })
    }

    fn true_path_children(
        &mut self,
        _below: &mut Children<'_>,
    ) -> Result<SmallVec<[NodeId; 4]>, QueryError> {
        self.state.positioned()?;
        self.refresh_front();
        Ok(self.front.iter().map(|&slot| self.children[slot]).collect())
    }
}

/// Antichain union of the front operands' intervals.
///
/// Intervals are merged by right extreme (shorter first on ties); an interval is
/// emitted only if it starts after the last emitted one, which drops every interval
/// containing an earlier result.
#[derive(Debug, Default)]
pub(crate) struct OrIntervals {
    heap: SemiIndirectHeap<EndsFirst>,
    /// Slots that had intervals at reset.
    real: SmallVec<[usize; 4]>,
    last_left: Option<Position>,
}

impl OrIntervals {
    fn reset(
        &mut self,
        children: &[NodeId],
        front: &[usize],
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.heap
            .reset(children.len(), EndsFirst(Interval::singleton(0)));
        self.real.clear();
        self.last_left = None;

        for &slot in front {
            let child = children[slot];
            if below.intervals(child, index)? != IntervalState::Ready {
                continue;
            }
            if let Some(interval) = below.next_interval(child, index)? {
                self.heap.set_key(slot, EndsFirst(interval));
                self.heap.push(slot);
                self.real.push(slot);
            }
        }

        Ok(if self.heap.is_empty() {
            IntervalState::False
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
        loop {
            let Some(top) = self.heap.peek() else {
                return Ok(None);
            };
            let current = self.heap.key(top).0;
            if self.last_left.is_none_or(|left| current.left > left) {
                self.last_left = Some(current.left);
                return Ok(Some(current));
            }
            match below.next_interval(children[top], index)? {
                Some(interval) => self.heap.replace_root_key(EndsFirst(interval)),
                None => {
                    self.heap.pop();
                }
            }
        }
    }
}
