/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Documentally partitioned indices.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use query_iterators::{DocumentIterator, FalseIterator, IndexId, IndexInfo, MemoryIndex};

use crate::strategy::{
    DocumentalClusteringStrategy, DocumentalPartitioningStrategy, DocumentalStrategy,
};
use crate::{ClusterError, ConcatenatedCluster, MergedCluster};

/// How the shards of a [`DocumentalCluster`] are fanned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    /// Read shards one after the other. Needs a contiguous strategy.
    Concatenated,
    /// Merge shards by global pointer. Works with any strategy.
    #[default]
    Merged,
}

/// An index whose documents are split over local indices.
///
/// # Example
///
/// ```
/// use index_cluster::{ClusterMode, ContiguousDocumentalStrategy, DocumentalCluster};
/// use query_iterators::IndexId;
///
/// let strategy = ContiguousDocumentalStrategy::uniform(2, 4).unwrap();
/// let cluster = DocumentalCluster::new(
///     IndexId(0),
///     "text",
///     strategy.into(),
///     ClusterMode::Concatenated,
///     ["a b", "b", "a", "a"],
/// )
/// .unwrap();
/// let mut b = cluster.documents("b").unwrap();
/// assert_eq!(b.skip_to(2).unwrap(), None);
/// ```
#[derive(Debug, Clone)]
pub struct DocumentalCluster {
    info: IndexInfo,
    strategy: DocumentalStrategy,
    mode: ClusterMode,
    shards: Vec<MemoryIndex>,
}

impl DocumentalCluster {
    /// Split `documents` over the local indices `strategy` assigns them to.
    pub fn new<'a>(
        id: IndexId,
        name: impl Into<String>,
        strategy: DocumentalStrategy,
        mode: ClusterMode,
        documents: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ClusterError> {
        if mode == ClusterMode::Concatenated && strategy.as_contiguous().is_none() {
            return Err(ClusterError::NotContiguous);
        }
        let info = IndexInfo::new(id, name);
        let documents: Vec<&str> = documents.into_iter().collect();
        let expected = strategy.number_of_documents();
        if documents.len() as u64 != expected {
            return Err(ClusterError::DocumentCountMismatch {
                documents: documents.len() as u64,
                expected,
            });
        }

        let mut local: Vec<Vec<&str>> = vec![Vec::new(); strategy.number_of_local_indices()];
        for (global, text) in documents.into_iter().enumerate() {
            // Documents reach each shard in local pointer order.
            local[strategy.local_index(global as u64)?].push(text);
        }
        let shards: Vec<MemoryIndex> = local
            .into_iter()
            .map(|texts| MemoryIndex::from_documents(id, info.name.clone(), texts))
            .collect();
        debug!(
            index = %id,
            shards = shards.len(),
            ?mode,
            documents = expected,
            "built documental cluster"
        );
        Ok(Self {
            info,
            strategy,
            mode,
            shards,
        })
    }

    pub fn info(&self) -> &IndexInfo {
        &self.info
    }

    pub fn strategy(&self) -> &DocumentalStrategy {
        &self.strategy
    }

    pub fn mode(&self) -> ClusterMode {
        self.mode
    }

    pub fn shards(&self) -> &[MemoryIndex] {
        &self.shards
    }

    pub fn number_of_documents(&self) -> u64 {
        self.strategy.number_of_documents()
    }

    /// The documents of `term` over the whole cluster.
    ///
    /// Only the shards where `term` occurs take part; with none, the iterator is
    /// empty.
    pub fn documents(&self, term: &str) -> Result<Box<dyn DocumentIterator>, ClusterError> {
        let shards: Vec<_> = self
            .shards
            .iter()
            .enumerate()
            .map(|(shard, index)| (shard, index.documents(term)))
            .filter(|(_, iterator)| iterator.may_have_next())
            .collect();
        if shards.is_empty() {
            warn!(index = %self.info.id, term, "no local index contains the term");
            return Ok(Box::new(FalseIterator::new(self.info.id)));
        }
        debug!(term, shards = shards.len(), mode = ?self.mode, "reading term from cluster");
        let iterator: Box<dyn DocumentIterator> = match (self.mode, &self.strategy) {
            (ClusterMode::Concatenated, DocumentalStrategy::Contiguous(strategy)) => {
                Box::new(ConcatenatedCluster::new(strategy.clone(), shards)?)
            }
            (ClusterMode::Concatenated, DocumentalStrategy::Interleaved(_)) => {
                return Err(ClusterError::NotContiguous);
            }
            (ClusterMode::Merged, strategy) => Box::new(MergedCluster::new(strategy.clone(), shards)?),
        };
        Ok(iterator)
    }
}
