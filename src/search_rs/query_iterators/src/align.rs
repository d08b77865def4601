/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Alignment of two single-index operands over different views of the same text.

use smallvec::SmallVec;

use crate::slots::{IndexSlots, Resolution};
use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, QueryError};

#[derive(Debug, Clone, Copy)]
struct Operands {
    first: NodeId,
    second: NodeId,
    first_index: IndexId,
    second_index: IndexId,
}

/// Intervals returned by both operands, each on its own index.
///
/// This is meaningful when the two indices describe the same positions, e.g. the
/// words of a text and their part-of-speech tags. The result spans the index of
/// `first`; documents where no interval is shared are skipped.
pub(crate) struct Align {
    children: [NodeId; 2],
    operands: Operands,
    indices: IndexSet,
    state: DocumentState,
    slots: IndexSlots<AlignIntervals>,
}

impl Align {
    pub(crate) fn new(first: NodeId, second: NodeId, below: ChildView<'_>) -> Result<Self, QueryError> {
        let single = |child| {
            below.indices(child).sole().ok_or(QueryError::MultipleIndices {
                operator: OperatorKind::Align,
            })
        };
        let operands = Operands {
            first,
            second,
            first_index: single(first)?,
            second_index: single(second)?,
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

    /// Settle on the first document at or beyond `first` where both operands
    /// match and share an interval.
    fn align(
        &mut self,
        below: &mut Children<'_>,
        first: Option<DocId>,
    ) -> Result<Option<DocId>, QueryError> {
        let Some(mut first) = first else {
            return self.exhaust();
        };
        let mut second = None;
        loop {
            match second {
                Some(doc) if first < doc => match below.skip_to(self.operands.first, doc)? {
                    Some(doc) => first = doc,
                    None => return self.exhaust(),
                },
                Some(doc) if doc == first => {
                    self.state = DocumentState::Positioned(first);
                    self.slots.invalidate();
                    if self.intervals(below, self.operands.first_index)? != IntervalState::False {
                        return Ok(Some(first));
                    }
                    match below.next_document(self.operands.first)? {
                        Some(doc) => first = doc,
                        None => return self.exhaust(),
                    }
                }
                _ => match below.skip_to(self.operands.second, first)? {
                    Some(doc) => second = Some(doc),
                    None => return self.exhaust(),
                },
            }
        }
    }

    fn exhaust(&mut self) -> Result<Option<DocId>, QueryError> {
        self.state = DocumentState::Exhausted;
        self.slots.invalidate();
        Ok(None)
    }
}

impl Operator for Align {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Align
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
        let first = below.next_document(self.operands.first)?;
        self.align(below, first)
    }

    fn skip_to(
        &mut self,
        below: &mut Children<'_>,
        target: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        if self.state.reached(target) {
            return Ok(self.state.document());
        }
        let first = below.skip_to(self.operands.first, target)?;
        self.align(below, first)
    }

    fn may_have_next(&self, below: ChildView<'_>) -> bool {
        !self.state.is_exhausted()
            && below.may_have_next(self.operands.first)
            && below.may_have_next(self.operands.second)
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
            let second = below.intervals(operands.second, operands.second_index)?;
            Ok(match (first, second) {
                (_, IntervalState::False) => Resolution::False,
                (IntervalState::True, IntervalState::True) => Resolution::True,
                (_, IntervalState::True) => Resolution::False,
                (IntervalState::True | IntervalState::False, IntervalState::Ready) => {
                    Resolution::False
                }
                (IntervalState::Ready, IntervalState::Ready) => {
                    Resolution::own(own.reset(operands, below)?)
                }
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
struct AlignIntervals {
    pending: Option<Interval>,
}

impl AlignIntervals {
    fn reset(
        &mut self,
        operands: Operands,
        below: &mut Children<'_>,
    ) -> Result<IntervalState, QueryError> {
        self.pending = None;
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
        let Some(mut first) = below.next_interval(operands.first, operands.first_index)? else {
            return Ok(None);
        };
        let Some(mut second) = below.next_interval(operands.second, operands.second_index)? else {
            return Ok(None);
        };
        while first != second {
            if first.left <= second.left {
                match below.next_interval(operands.first, operands.first_index)? {
                    Some(interval) => first = interval,
                    None => return Ok(None),
                }
            } else {
                match below.next_interval(operands.second, operands.second_index)? {
                    Some(interval) => second = interval,
                    None => return Ok(None),
                }
            }
        }
        Ok(Some(first))
    }
}
