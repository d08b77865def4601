/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Walking document iterators.
//!
//! Scorers and query analysis walk an iterator tree with a
//! [`DocumentIteratorVisitor`]. A walk either enters every operand
//! ([`Traversal::All`]) or only those that witness the match on the current
//! document ([`Traversal::TruePaths`]): the front of a union, the minuend of a
//! difference, and never the operand of a negation.

use std::ops::ControlFlow;

use crate::{DocumentIterator, IndexId, OperatorKind, QueryError};

/// Which operands a walk enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    #[default]
    All,
    /// Only operands positioned on, and contributing to, the current document.
    TruePaths,
}

/// What a visitor learns about a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafInfo<'a> {
    pub index: IndexId,
    pub term: Option<&'a str>,
    pub term_number: Option<u64>,
    pub frequency: Option<u64>,
    /// Occurrences in the current document, when positioned on one.
    pub count: Option<u32>,
    pub weight: f64,
}

/// Callbacks of a depth-first walk. Returning [`ControlFlow::Break`] aborts it.
pub trait DocumentIteratorVisitor {
    /// Entering an operator.
    fn visit_pre(&mut self, _kind: OperatorKind, _weight: f64) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_leaf(&mut self, leaf: &LeafInfo<'_>) -> ControlFlow<()>;

    /// Leaving an operator.
    fn visit_post(&mut self, _kind: OperatorKind) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Collects the distinct `(index, term)` pairs of a query, in visit order.
///
/// The offset of a pair in [`TermCollector::terms`] is the slot a
/// [`CounterCollector`] reports its count in.
#[derive(Debug, Clone, Default)]
pub struct TermCollector {
    terms: Vec<(IndexId, String)>,
    leaves: usize,
}

impl TermCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `iterator` entirely and collect its terms.
    pub fn collect(iterator: &mut dyn DocumentIterator) -> Result<Self, QueryError> {
        let mut collector = Self::new();
        // Collectors never break, so the walk always completes.
        let _ = iterator.accept(&mut collector, Traversal::All)?;
        Ok(collector)
    }

    pub fn terms(&self) -> &[(IndexId, String)] {
        &self.terms
    }

    /// Number of leaves visited, counting repeated terms once per leaf.
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    /// Offset of `term` on `index`.
    pub fn offset(&self, index: IndexId, term: &str) -> Option<usize> {
        self.terms
            .iter()
            .position(|(i, t)| *i == index && t == term)
    }
}

impl DocumentIteratorVisitor for TermCollector {
    fn visit_leaf(&mut self, leaf: &LeafInfo<'_>) -> ControlFlow<()> {
        self.leaves += 1;
        if let Some(term) = leaf.term
            && self.offset(leaf.index, term).is_none()
        {
            self.terms.push((leaf.index, term.to_owned()));
        }
        ControlFlow::Continue(())
    }
}

/// Per-term occurrence counts of the leaves on true paths, for the current document.
#[derive(Debug, Clone)]
pub struct CounterCollector {
    terms: TermCollector,
    counts: Vec<u32>,
    weights: Vec<f64>,
}

impl CounterCollector {
    pub fn new(terms: TermCollector) -> Self {
        let slots = terms.terms().len();
        Self {
            terms,
            counts: vec![0; slots],
            weights: vec![0.0; slots],
        }
    }

    /// Gather the counts for the document `iterator` is positioned on.
    ///
    /// Terms that do not witness the match count zero.
    pub fn collect(&mut self, iterator: &mut dyn DocumentIterator) -> Result<&[u32], QueryError> {
        iterator.state().positioned()?;
        self.counts.fill(0);
        self.weights.fill(0.0);
        let _ = iterator.accept(&mut *self, Traversal::TruePaths)?;
        Ok(&self.counts)
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// The largest weight seen for each term during the last collection.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn terms(&self) -> &TermCollector {
        &self.terms
    }
}

impl DocumentIteratorVisitor for CounterCollector {
    fn visit_leaf(&mut self, leaf: &LeafInfo<'_>) -> ControlFlow<()> {
        let slot = leaf
            .term
            .and_then(|term| self.terms.offset(leaf.index, term));
        if let Some(slot) = slot {
            self.counts[slot] = self.counts[slot].max(leaf.count.unwrap_or(0));
            self.weights[slot] = self.weights[slot].max(leaf.weight);
        }
        ControlFlow::Continue(())
    }
}
