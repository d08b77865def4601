/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Intervals and the lazy interval protocol.
//!
//! An [`Interval`] is a closed range of positions witnessing a match. Per document
//! and index, a [`DocumentIterator`] produces an antichain of intervals in increasing
//! order, or one of the two sentinels: `True` (the document matches without a
//! specific witness) and `False` (no witness at all). The sentinels are variants of
//! [`IntervalIteratorResult`], so they are compared by tag and never materialised as
//! an empty antichain.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use crate::{DocumentIterator, IndexId, IntervalState, Position, QueryError};

/// A closed range of positions `[left, right]`, with `left <= right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub left: Position,
    pub right: Position,
}

impl Interval {
    pub fn new(left: Position, right: Position) -> Self {
        debug_assert!(left <= right, "interval [{left}..{right}] is reversed");
        Self { left, right }
    }

    /// The interval made of a single position.
    pub const fn singleton(position: Position) -> Self {
        Self {
            left: position,
            right: position,
        }
    }

    /// Number of positions covered.
    pub const fn length(&self) -> u32 {
        self.right - self.left + 1
    }

    /// Whether `other` lies within this interval.
    pub const fn contains(&self, other: &Interval) -> bool {
        self.left <= other.left && other.right <= self.right
    }

    pub const fn contains_position(&self, position: Position) -> bool {
        self.left <= position && position <= self.right
    }

    /// Order by left extreme, and on ties put the longer interval first.
    pub fn starts_before_or_prolongs(&self, other: &Interval) -> Ordering {
        self.left
            .cmp(&other.left)
            .then_with(|| other.right.cmp(&self.right))
    }

    /// Order by right extreme, and on ties put the shorter interval first.
    pub fn ends_before_or_is_suffix(&self, other: &Interval) -> Ordering {
        self.right
            .cmp(&other.right)
            .then_with(|| other.left.cmp(&self.left))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.left == self.right {
            write!(f, "[{}]", self.left)
        } else {
            write!(f, "[{}..{}]", self.left, self.right)
        }
    }
}

/// Heap key ordering intervals by [`Interval::starts_before_or_prolongs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartsFirst(pub Interval);

impl Ord for StartsFirst {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.starts_before_or_prolongs(&other.0)
    }
}

impl PartialOrd for StartsFirst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Heap key ordering intervals by [`Interval::ends_before_or_is_suffix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndsFirst(pub Interval);

impl Ord for EndsFirst {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.ends_before_or_is_suffix(&other.0)
    }
}

impl PartialOrd for EndsFirst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The interval stream of one iterator on one index for the current document.
pub trait IntervalIterator {
    /// Restart the enumeration, returning [`IntervalState::False`] if nothing is left.
    fn reset(&mut self) -> Result<IntervalState, QueryError>;

    /// The next interval, in increasing order.
    fn next_interval(&mut self) -> Result<Option<Interval>, QueryError>;

    /// A lower bound on the length of any interval this stream produces.
    fn extent(&self) -> u32;
}

/// What an iterator offers for an index on its current document.
pub enum IntervalIteratorResult<'a, I: ?Sized> {
    True,
    False,
    Iterator(Intervals<'a, I>),
}

impl<'a, I: DocumentIterator + ?Sized> IntervalIteratorResult<'a, I> {
    pub fn is_true(&self) -> bool {
        matches!(self, Self::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Self::False)
    }

    pub fn into_intervals(self) -> Option<Intervals<'a, I>> {
        match self {
            Self::Iterator(intervals) => Some(intervals),
            Self::True | Self::False => None,
        }
    }
}

impl<I: ?Sized> fmt::Debug for IntervalIteratorResult<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => f.write_str("True"),
            Self::False => f.write_str("False"),
            Self::Iterator(intervals) => write!(f, "Iterator({})", intervals.index),
        }
    }
}

/// A borrowed handle on the intervals an iterator produces for one index.
pub struct Intervals<'a, I: ?Sized> {
    owner: &'a mut I,
    index: IndexId,
}

impl<I: ?Sized> Intervals<'_, I> {
    pub fn index(&self) -> IndexId {
        self.index
    }
}

impl<I: DocumentIterator + ?Sized> IntervalIterator for Intervals<'_, I> {
    fn reset(&mut self) -> Result<IntervalState, QueryError> {
        self.owner.reset_intervals(self.index)
    }

    fn next_interval(&mut self) -> Result<Option<Interval>, QueryError> {
        self.owner.next_interval(self.index)
    }

    fn extent(&self) -> u32 {
        self.owner.extent(self.index)
    }
}

impl<I: DocumentIterator + ?Sized> Iterator for Intervals<'_, I> {
    type Item = Result<Interval, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.owner.next_interval(self.index).transpose()
    }
}

/// Typed interval access on top of [`DocumentIterator`].
pub trait DocumentIteratorExt: DocumentIterator {
    /// The intervals for `index` on the current document.
    fn interval_iterator(
        &mut self,
        index: IndexId,
    ) -> Result<IntervalIteratorResult<'_, Self>, QueryError> {
        Ok(match self.intervals(index)? {
            IntervalState::True => IntervalIteratorResult::True,
            IntervalState::False => IntervalIteratorResult::False,
            IntervalState::Ready => {
                IntervalIteratorResult::Iterator(Intervals { owner: self, index })
            }
        })
    }

    /// The intervals of the only index this iterator spans.
    fn sole_interval_iterator(&mut self) -> Result<IntervalIteratorResult<'_, Self>, QueryError> {
        let index = self.indices().sole().ok_or(QueryError::NoSoleIndex)?;
        self.interval_iterator(index)
    }

    /// The interval state of every index this iterator spans.
    fn interval_states(&mut self) -> Result<SmallVec<[(IndexId, IntervalState); 2]>, QueryError> {
        let indices = self.indices().clone();
        indices
            .iter()
            .map(|index| Ok((index, self.intervals(index)?)))
            .collect()
    }
}

impl<T: DocumentIterator + ?Sized> DocumentIteratorExt for T {}
