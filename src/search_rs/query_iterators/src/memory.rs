/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! An in-memory inverted index.
//!
//! [`MemoryIndex`] tokenises documents on whitespace, lower-cases the tokens and keeps
//! one posting list per term. It is the reference [`PostingSource`] provider used by
//! clusters built in memory and by tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    DocId, IndexId, IndexInfo, Payload, Position, PostingSource, QueryError, TermIterator,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Posting {
    document: DocId,
    positions: Vec<Position>,
    payload: Option<Payload>,
}

/// Builds a [`MemoryIndex`] one document at a time.
#[derive(Debug)]
pub struct MemoryIndexBuilder {
    info: IndexInfo,
    documents: u64,
    postings: BTreeMap<String, Vec<Posting>>,
}

impl MemoryIndexBuilder {
    /// Postings will carry positions unless told otherwise.
    pub fn without_positions(mut self) -> Self {
        self.info.has_positions = false;
        self
    }

    /// Append a document.
    pub fn document(self, text: &str) -> Self {
        self.add(text, None, |_| true)
    }

    /// Append a document, indexing only the tokens `keep` accepts.
    ///
    /// Dropped tokens still take up their position, so the kept postings line up
    /// with those of an index holding the whole document.
    pub fn document_where(self, text: &str, keep: impl Fn(&str) -> bool) -> Self {
        self.add(text, None, keep)
    }

    /// Append a document whose postings carry `payload`.
    pub fn document_with_payload(mut self, text: &str, payload: Payload) -> Self {
        self.info.has_payloads = true;
        self.add(text, Some(payload), |_| true)
    }

    fn add(mut self, text: &str, payload: Option<Payload>, keep: impl Fn(&str) -> bool) -> Self {
        let document = self.documents;
        self.documents += 1;
        for (position, token) in text.split_whitespace().enumerate() {
            let token = token.to_lowercase();
            if !keep(&token) {
                continue;
            }
            let postings = self.postings.entry(token).or_default();
            let position = position as Position;
            match postings.last_mut() {
                Some(last) if last.document == document => last.positions.push(position),
                _ => postings.push(Posting {
                    document,
                    positions: vec![position],
                    payload,
                }),
            }
        }
        self
    }

    pub fn build(self) -> MemoryIndex {
        debug!(
            index = %self.info.id,
            name = self.info.name,
            documents = self.documents,
            terms = self.postings.len(),
            "built memory index"
        );
        MemoryIndex {
            info: self.info,
            documents: self.documents,
            terms: self
                .postings
                .into_iter()
                .map(|(term, postings)| (term, Arc::from(postings)))
                .collect(),
        }
    }
}

/// An immutable in-memory index. Cloning shares the posting lists.
#[derive(Debug, Clone)]
pub struct MemoryIndex {
    info: IndexInfo,
    documents: u64,
    terms: BTreeMap<String, Arc<[Posting]>>,
}

impl MemoryIndex {
    pub fn builder(id: IndexId, name: impl Into<String>) -> MemoryIndexBuilder {
        MemoryIndexBuilder {
            info: IndexInfo::new(id, name),
            documents: 0,
            postings: BTreeMap::new(),
        }
    }

    /// Index `documents` in order, with positions.
    pub fn from_documents<'a>(
        id: IndexId,
        name: impl Into<String>,
        documents: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        documents
            .into_iter()
            .fold(Self::builder(id, name), MemoryIndexBuilder::document)
            .build()
    }

    pub fn info(&self) -> &IndexInfo {
        &self.info
    }

    pub fn id(&self) -> IndexId {
        self.info.id
    }

    pub fn number_of_documents(&self) -> u64 {
        self.documents
    }

    pub fn number_of_terms(&self) -> usize {
        self.terms.len()
    }

    /// The lexicon ordinal of `term`.
    pub fn term_number(&self, term: &str) -> Option<u64> {
        let term = term.to_lowercase();
        self.terms.keys().position(|t| *t == term).map(|n| n as u64)
    }

    /// The term with lexicon ordinal `number`.
    pub fn term(&self, number: u64) -> Option<&str> {
        let number = usize::try_from(number).ok()?;
        self.terms.keys().nth(number).map(String::as_str)
    }

    /// The lexicon in order, each term with its number of occurrences (postings,
    /// for an index without positions).
    pub fn terms(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        let has_positions = self.info.has_positions;
        self.terms.iter().map(move |(term, postings)| {
            let occurrences = if has_positions {
                postings.iter().map(|posting| posting.positions.len() as u64).sum()
            } else {
                postings.len() as u64
            };
            (term.as_str(), occurrences)
        })
    }

    /// The postings of `term`; empty when the term does not occur.
    pub fn postings(&self, term: &str) -> MemoryPostings {
        let term = term.to_lowercase();
        let postings = self
            .terms
            .get(&term)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()));
        MemoryPostings {
            index: self.info.id,
            has_positions: self.info.has_positions,
            term_number: self.terms.keys().position(|t| *t == term).map(|n| n as u64),
            term,
            postings,
            cursor: None,
            position: 0,
        }
    }

    /// A leaf iterator over the postings of `term`.
    pub fn documents(&self, term: &str) -> TermIterator<MemoryPostings> {
        TermIterator::new(self.postings(term))
    }
}

/// A cursor over one posting list of a [`MemoryIndex`].
#[derive(Debug, Clone)]
pub struct MemoryPostings {
    index: IndexId,
    has_positions: bool,
    term: String,
    term_number: Option<u64>,
    postings: Arc<[Posting]>,
    /// Offset of the current posting; `postings.len()` once exhausted.
    cursor: Option<usize>,
    /// Next position to read within the current posting.
    position: usize,
}

impl MemoryPostings {
    fn current(&self) -> Option<&Posting> {
        self.cursor.and_then(|cursor| self.postings.get(cursor))
    }

    fn move_to(&mut self, cursor: usize) -> Option<DocId> {
        self.cursor = Some(cursor);
        self.position = 0;
        self.current().map(|posting| posting.document)
    }
}

impl PostingSource for MemoryPostings {
    fn index(&self) -> IndexId {
        self.index
    }

    fn term(&self) -> &str {
        &self.term
    }

    fn term_number(&self) -> Option<u64> {
        self.term_number
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
        let start = match self.cursor {
            None => 0,
            Some(cursor) => {
                match self.postings.get(cursor) {
                    Some(posting) if posting.document >= target => return Ok(Some(posting.document)),
                    Some(_) => cursor,
                    None => return Ok(None),
                }
            }
        };
        let offset = self.postings[start..].partition_point(|posting| posting.document < target);
        Ok(self.move_to(start + offset))
    }

    fn count(&self) -> u32 {
        self.current().map_or(0, |posting| posting.positions.len() as u32)
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
