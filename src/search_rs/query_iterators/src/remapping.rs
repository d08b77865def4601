/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Index renaming.

use smallvec::SmallVec;

use crate::tree::{ChildView, Children, NodeId, Operator, OperatorKind};
use crate::{DocId, DocumentState, IndexId, IndexSet, Interval, IntervalState, QueryError};

/// The operand, with some of its indices exposed under other identities.
///
/// Documents and intervals are the operand's; only the index an interval stream
/// is requested for is translated.
pub(crate) struct Remapping {
    children: [NodeId; 1],
    /// `(exposed, operand)` pairs for the renamed indices.
    renamed: SmallVec<[(IndexId, IndexId); 2]>,
    indices: IndexSet,
    state: DocumentState,
}

impl Remapping {
    /// `map` holds `(from, to)` pairs: the operand's index `from` is exposed as `to`.
    pub(crate) fn new(
        child: NodeId,
        map: &[(IndexId, IndexId)],
        below: ChildView<'_>,
    ) -> Result<Self, QueryError> {
        let inner = below.indices(child);
        let mut renamed = SmallVec::<[(IndexId, IndexId); 2]>::new();
        for &(from, to) in map {
            let clash = inner.contains(to) || renamed.iter().any(|&(exposed, _)| exposed == to);
            let known = inner.contains(from) && renamed.iter().all(|&(_, source)| source != from);
            if clash || !known {
                return Err(QueryError::InvalidRemapping { from, to });
            }
            renamed.push((to, from));
        }
        let indices = inner
            .iter()
            .map(|index| {
                renamed
                    .iter()
                    .find(|&&(_, source)| source == index)
                    .map_or(index, |&(exposed, _)| exposed)
            })
            .collect();
        Ok(Self {
            children: [child],
            renamed,
            indices,
            state: DocumentState::Unstarted,
        })
    }

    fn child(&self) -> NodeId {
        self.children[0]
    }

    /// The operand index behind the exposed `index`, if this node spans it.
    fn source(&self, index: IndexId) -> Option<IndexId> {
        if !self.indices.contains(index) {
            return None;
        }
        Some(
            self.renamed
                .iter()
                .find(|&&(exposed, _)| exposed == index)
                .map_or(index, |&(_, source)| source),
        )
    }
}

impl Operator for Remapping {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Remapping
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
        let next = below.next_document(self.child())?;
        self.state = DocumentState::after(next);
        Ok(next)
    }

    fn skip_to(
        &mut self,
        below: &mut Children<'_>,
        target: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        let next = below.skip_to(self.child(), target)?;
        self.state = DocumentState::after(next);
        Ok(next)
    }

    fn may_have_next(&self, below: ChildView<'_>) -> bool {
        below.may_have_next(self.child())
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        match self.source(index) {
            Some(source) => below.intervals(self.child(), source),
            None => {
                self.state.positioned()?;
                Ok(IntervalState::False)
            }
        }
    }

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        match self.source(index) {
            Some(source) => below.reset_intervals(self.child(), source),
            None => self.intervals(below, index),
        }
    }

    fn next_interval(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        match self.source(index) {
            Some(source) => below.next_interval(self.child(), source),
            None => self.intervals(below, index).map(|_| None),
        }
    }

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32 {
        self.source(index)
            .map_or(0, |source| below.extent(self.child(), source))
    }
}
