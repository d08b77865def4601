/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use std::io;

use query_iterators::{DocId, QueryError};
use thiserror::Error;

#[derive(Debug, Error)]
/// A failure while assembling or addressing a cluster.
pub enum ClusterError {
    /// Cutpoints that do not describe a partition.
    #[error("invalid cutpoints: {0}")]
    InvalidCutpoints(&'static str),
    /// More local indices were requested than there are items to spread over them.
    #[error("{indices} local indices requested for {items} items")]
    TooManyLocalIndices { indices: usize, items: u64 },
    /// A local index the strategy does not know about.
    #[error("local index {shard} is out of range ({shards} local indices)")]
    ShardOutOfRange { shard: usize, shards: usize },
    /// Concatenated shards must come in increasing local-index order.
    #[error("local indices must be strictly increasing")]
    UnorderedShards,
    /// The same local index was given twice.
    #[error("local index {0} given more than once")]
    DuplicateShard(usize),
    /// Concatenation needs shards whose pointer ranges follow one another.
    #[error("concatenated clusters need a contiguous strategy")]
    NotContiguous,
    /// The collection does not match the strategy it is partitioned with.
    #[error("{documents} documents given to a strategy over {expected}")]
    DocumentCountMismatch { documents: u64, expected: u64 },
    /// A global pointer or term number outside the partitioned range.
    #[error("pointer {pointer} is out of range (limit {limit})")]
    PointerOutOfRange { pointer: DocId, limit: DocId },
}

/// Pointer lookups keep their meaning across the iterator boundary; assembly
/// errors surface as invalid input.
impl From<ClusterError> for QueryError {
    fn from(error: ClusterError) -> Self {
        match error {
            ClusterError::PointerOutOfRange { pointer, limit } => {
                QueryError::PointerOutOfRange { pointer, limit }
            }
            other => QueryError::Io(io::Error::new(io::ErrorKind::InvalidInput, other)),
        }
    }
}
