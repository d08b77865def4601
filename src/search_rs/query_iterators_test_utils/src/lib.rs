/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Test utilities for query_iterators.
//!
//! Posting sources backed by plain vectors, a source that fails on demand, and
//! helpers that drain iterators into vectors so tests can compare whole streams.

use std::io;

use query_iterators::{
    DocId, DocumentIterator, DocumentIteratorExt, IndexId, Interval, IntervalIteratorResult,
    Payload, Position, PostingSource, QueryError, TermIterator,
};
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One posting of a [`VecPostings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecPosting {
    pub document: DocId,
    pub positions: Vec<Position>,
    pub payload: Option<Payload>,
}

impl VecPosting {
    pub fn new(document: DocId, positions: impl Into<Vec<Position>>) -> Self {
        Self {
            document,
            positions: positions.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// A posting list held in a vector.
///
/// Documents must be strictly increasing, and so must positions within a posting.
#[derive(Debug, Clone)]
pub struct VecPostings {
    index: IndexId,
    term: String,
    has_positions: bool,
    postings: Vec<VecPosting>,
    /// `None` before the first read, `postings.len()` once exhausted.
    cursor: Option<usize>,
    position: usize,
}

impl VecPostings {
    pub fn new(index: IndexId, term: impl Into<String>, postings: Vec<VecPosting>) -> Self {
        debug_assert!(postings.is_sorted_by(|a, b| a.document < b.document));
        Self {
            index,
            term: term.into(),
            has_positions: true,
            postings,
            cursor: None,
            position: 0,
        }
    }

    /// Postings with the given positions, one document per entry.
    pub fn with_positions(
        index: IndexId,
        term: impl Into<String>,
        postings: &[(DocId, &[Position])],
    ) -> Self {
        let postings = postings
            .iter()
            .map(|&(document, positions)| VecPosting::new(document, positions))
            .collect();
        Self::new(index, term, postings)
    }

    /// Postings without positions on the given documents.
    pub fn documents(index: IndexId, term: impl Into<String>, documents: &[DocId]) -> Self {
        let postings = documents
            .iter()
            .map(|&document| VecPosting::new(document, Vec::new()))
            .collect();
        Self {
            has_positions: false,
            ..Self::new(index, term, postings)
        }
    }

    /// A term leaf reading these postings.
    pub fn into_iterator(self) -> TermIterator<Self> {
        TermIterator::new(self)
    }

    fn current(&self) -> Option<&VecPosting> {
        self.cursor.and_then(|cursor| self.postings.get(cursor))
    }

    fn move_to(&mut self, cursor: usize) -> Option<DocId> {
        self.cursor = Some(cursor);
        self.position = 0;
        self.current().map(|posting| posting.document)
    }
}

impl PostingSource for VecPostings {
    fn index(&self) -> IndexId {
        self.index
    }

    fn term(&self) -> &str {
        &self.term
    }

    fn frequency(&self) -> u64 {
        self.postings.len() as u64
    }

    fn has_positions(&self) -> bool {
        self.has_positions
    }

    fn document(&self) -> Option<DocId> {
        self.current().map(|posting| posting.document)
    }

    fn may_have_next(&self) -> bool {
        match self.cursor {
            None => !self.postings.is_empty(),
            Some(cursor) => cursor + 1 < self.postings.len(),
        }
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        let next = match self.cursor {
            None => 0,
            Some(cursor) => (cursor + 1).min(self.postings.len()),
        };
        Ok(self.move_to(next))
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        if let Some(current) = self.document()
            && current >= target
        {
            return Ok(Some(current));
        }
        let start = self.cursor.unwrap_or(0);
        let offset = self.postings[start.min(self.postings.len())..]
            .partition_point(|posting| posting.document < target);
        Ok(self.move_to(start + offset))
    }

    fn count(&self) -> u32 {
        self.current()
            .map_or(0, |posting| posting.positions.len() as u32)
    }

    fn next_position(&mut self) -> Result<Option<Position>, QueryError> {
        let position = self
            .current()
            .and_then(|posting| posting.positions.get(self.position).copied());
        if position.is_some() {
            self.position += 1;
        }
        Ok(position)
    }

    fn payload(&self) -> Option<Payload> {
        self.current().and_then(|posting| posting.payload)
    }
}

/// A posting source that fails with an I/O error once `reads` positioning calls
/// have succeeded.
#[derive(Debug)]
pub struct FailingPostings<S> {
    inner: S,
    reads: usize,
}

impl<S: PostingSource> FailingPostings<S> {
    pub fn new(inner: S, reads: usize) -> Self {
        Self { inner, reads }
    }

    fn read(&mut self) -> Result<(), QueryError> {
        if self.reads == 0 {
            return Err(io::Error::other("injected read failure").into());
        }
        self.reads -= 1;
        Ok(())
    }
}

impl<S: PostingSource> PostingSource for FailingPostings<S> {
    fn index(&self) -> IndexId {
        self.inner.index()
    }

    fn term(&self) -> &str {
        self.inner.term()
    }

    fn frequency(&self) -> u64 {
        self.inner.frequency()
    }

    fn has_positions(&self) -> bool {
        self.inner.has_positions()
    }

    fn document(&self) -> Option<DocId> {
        self.inner.document()
    }

    fn may_have_next(&self) -> bool {
        self.inner.may_have_next()
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        self.read()?;
        self.inner.next_document()
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        self.read()?;
        self.inner.skip_to(target)
    }

    fn count(&self) -> u32 {
        self.inner.count()
    }

    fn next_position(&mut self) -> Result<Option<Position>, QueryError> {
        self.inner.next_position()
    }

    fn payload(&self) -> Option<Payload> {
        self.inner.payload()
    }
}

/// Every remaining document of `iterator`.
pub fn collect_documents<I>(iterator: &mut I) -> Result<Vec<DocId>, QueryError>
where
    I: DocumentIterator + ?Sized,
{
    let mut documents = Vec::new();
    while let Some(doc) = iterator.next_document()? {
        documents.push(doc);
    }
    Ok(documents)
}

/// What an iterator offers as a witness on one document and index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Witness {
    True,
    False,
    Intervals(Vec<Interval>),
}

/// The witness of the current document on `index`.
pub fn witness<I>(iterator: &mut I, index: IndexId) -> Result<Witness, QueryError>
where
    I: DocumentIterator,
{
    Ok(match iterator.interval_iterator(index)? {
        IntervalIteratorResult::True => Witness::True,
        IntervalIteratorResult::False => Witness::False,
        IntervalIteratorResult::Iterator(intervals) => {
            Witness::Intervals(intervals.collect::<Result<_, _>>()?)
        }
    })
}

/// Every remaining document of `iterator` with its witness on `index`.
pub fn collect_intervals<I>(
    iterator: &mut I,
    index: IndexId,
) -> Result<Vec<(DocId, Witness)>, QueryError>
where
    I: DocumentIterator,
{
    let mut documents = Vec::new();
    while let Some(doc) = iterator.next_document()? {
        documents.push((doc, witness(iterator, index)?));
    }
    Ok(documents)
}

/// Shorthand for a list of intervals.
pub fn intervals(pairs: &[(Position, Position)]) -> Witness {
    Witness::Intervals(
        pairs
            .iter()
            .map(|&(left, right)| Interval::new(left, right))
            .collect(),
    )
}
