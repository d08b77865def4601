/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Indices split over several local indices, queried as one.
//!
//! A documental cluster splits the collection: every local index holds some of
//! the documents, and a [`DocumentalClusteringStrategy`] maps its local pointers
//! back to global ones. Term queries fan in over the local indices, either by
//! [`ConcatenatedCluster`] when their pointer ranges follow one another, or by
//! [`MergedCluster`] when they interleave. A lexical cluster splits the lexicon
//! instead, so a term query is routed to the single local index owning the term.

use query_iterators::{DocumentIterator, IndexSet};

mod cluster;
mod concatenated;
mod error;
mod lexical;
mod merged;
pub mod strategy;

pub use cluster::{ClusterMode, DocumentalCluster};
pub use concatenated::ConcatenatedCluster;
pub use error::ClusterError;
pub use lexical::{ContiguousLexicalStrategy, LexicalCluster};
pub use merged::MergedCluster;
pub use strategy::{
    ContiguousDocumentalStrategy, DocumentalClusteringStrategy, DocumentalPartitioningStrategy,
    DocumentalStrategy, IdentityDocumentalStrategy, InterleavedDocumentalStrategy,
};

fn shard_indices<I: DocumentIterator>(shards: &[(usize, I)]) -> IndexSet {
    let mut indices = IndexSet::new();
    for (_, iterator) in shards {
        indices.extend_from(iterator.indices());
    }
    indices
}

/// Total postings over the shards, when every shard knows its own.
fn frequency_sum<I: DocumentIterator>(shards: &[(usize, I)]) -> Option<u64> {
    shards.iter().map(|(_, iterator)| iterator.frequency()).sum()
}
