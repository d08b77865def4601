/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Per-index interval state of composite nodes.
//!
//! A composite resolves its interval stream lazily, once per document and index,
//! to one of four outcomes. The operator-specific state `S` is allocated once when
//! the node is built and reset in place on every resolution, so moving from one
//! document to the next never allocates.

use smallvec::SmallVec;

use crate::tree::{ChildView, Children, NodeId};
use crate::{IndexId, IndexSet, Interval, IntervalState, QueryError};

/// How a node's intervals were resolved for the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    True,
    False,
    /// The stream is the child's stream, unchanged.
    Delegate(NodeId),
    /// The stream is computed by the node's own state.
    Own,
}

impl Resolution {
    /// The resolution matching what an own-state `reset` reported.
    pub(crate) fn own(reset: IntervalState) -> Self {
        match reset {
            IntervalState::Ready => Self::Own,
            IntervalState::True => Self::True,
            IntervalState::False => Self::False,
        }
    }

    /// Delegate to `child`, unless its state is a sentinel.
    pub(crate) fn delegate(child: NodeId, state: IntervalState) -> Self {
        match state {
            IntervalState::Ready => Self::Delegate(child),
            IntervalState::True => Self::True,
            IntervalState::False => Self::False,
        }
    }

    fn state(self, below: &mut Children<'_>, index: IndexId) -> Result<IntervalState, QueryError> {
        Ok(match self {
            Self::True => IntervalState::True,
            Self::False => IntervalState::False,
            Self::Own => IntervalState::Ready,
            Self::Delegate(child) => below.intervals(child, index)?,
        })
    }
}

#[derive(Debug)]
struct Slot<S> {
    index: IndexId,
    resolution: Option<Resolution>,
    state: S,
}

/// One slot per index a node spans.
#[derive(Debug)]
pub(crate) struct IndexSlots<S> {
    slots: SmallVec<[Slot<S>; 1]>,
}

impl<S: Default> IndexSlots<S> {
    pub(crate) fn new(indices: &IndexSet) -> Self {
        Self {
            slots: indices
                .iter()
                .map(|index| Slot {
                    index,
                    resolution: None,
                    state: S::default(),
                })
                .collect(),
        }
    }
}

impl<S> IndexSlots<S> {
    /// Forget every resolution; called whenever the node moves.
    pub(crate) fn invalidate(&mut self) {
        for slot in &mut self.slots {
            slot.resolution = None;
        }
    }

    /// Forget the resolution for `index` only.
    pub(crate) fn unresolve(&mut self, index: IndexId) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.index == index) {
            slot.resolution = None;
        }
    }

    /// The cached state for `index`, running `select` on the first request.
    ///
    /// Indices the node does not span are `False`.
    pub(crate) fn resolve<F>(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
        select: F,
    ) -> Result<IntervalState, QueryError>
    where
        F: FnOnce(&mut Children<'_>, &mut S) -> Result<Resolution, QueryError>,
    {
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.index == index) else {
            return Ok(IntervalState::False);
        };
        let resolution = match slot.resolution {
            Some(resolution) => resolution,
            None => {
                let resolution = select(below, &mut slot.state)?;
                slot.resolution = Some(resolution);
                resolution
            }
        };
        resolution.state(below, index)
    }

    /// The next interval of a resolved stream.
    pub(crate) fn next_interval<F>(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
        own: F,
    ) -> Result<Option<Interval>, QueryError>
    where
        F: FnOnce(&mut Children<'_>, &mut S) -> Result<Option<Interval>, QueryError>,
    {
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.index == index) else {
            return Ok(None);
        };
        match slot.resolution {
            Some(Resolution::Own) => own(below, &mut slot.state),
            Some(Resolution::Delegate(child)) => below.next_interval(child, index),
            Some(Resolution::True | Resolution::False) | None => Ok(None),
        }
    }

    /// The extent of a resolved stream; sentinels and unresolved streams give 0.
    pub(crate) fn extent<F>(&self, below: ChildView<'_>, index: IndexId, own: F) -> u32
    where
        F: FnOnce(ChildView<'_>, &S) -> u32,
    {
        let Some(slot) = self.slots.iter().find(|slot| slot.index == index) else {
            return 0;
        };
        match slot.resolution {
            Some(Resolution::Own) => own(below, &slot.state),
            Some(Resolution::Delegate(child)) => below.extent(child, index),
            Some(Resolution::True | Resolution::False) | None => 0,
        }
    }
}
