/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The contract leaves consume from the index reader layer.

use crate::{DocId, IndexId, Position, QueryError};

/// A document payload, as stored by payload-carrying indices.
pub type Payload = i64;

/// The postings of one term in one index.
///
/// Document pointers are strictly increasing and positions within a document are
/// strictly increasing. Read failures surface as [`QueryError::Io`]; sources
/// retry internally if they want to, callers never do.
pub trait PostingSource {
    /// The index serving these postings.
    fn index(&self) -> IndexId;

    /// The term, for diagnostics and visitors.
    fn term(&self) -> &str;

    /// The term's ordinal in the index lexicon, if the source knows it.
    fn term_number(&self) -> Option<u64> {
        None
    }

    /// Number of documents in the posting list.
    fn frequency(&self) -> u64;

    /// Whether postings carry positions.
    fn has_positions(&self) -> bool;

    /// The current document, `None` before the first read or after the last.
    fn document(&self) -> Option<DocId>;

    /// `false` only if no further document can be read.
    fn may_have_next(&self) -> bool;

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError>;

    /// Move to the first posting at or beyond `target`; a no-op if already there.
    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError>;

    /// Number of positions in the current document.
    fn count(&self) -> u32;

    /// The next position in the current document.
    fn next_position(&mut self) -> Result<Option<Position>, QueryError>;

    /// The payload of the current posting.
    fn payload(&self) -> Option<Payload>;

    /// Return the source to its pool.
    fn dispose(&mut self) -> Result<(), QueryError> {
        Ok(())
    }
}
