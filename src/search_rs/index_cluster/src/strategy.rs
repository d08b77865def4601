/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Documental strategies: how global document pointers map onto local indices.
//!
//! A [`DocumentalClusteringStrategy`] is all a fan-in iterator needs: it turns
//! the local pointers a shard returns into global pointers, and tells a shard
//! where to skip to when the caller asks for a global pointer. A
//! [`DocumentalPartitioningStrategy`] can also go the other way, which is what
//! splitting a collection and locating the owning shard need.

use serde::{Deserialize, Serialize};

use query_iterators::DocId;

use crate::ClusterError;

/// Maps local pointers of each local index back into the global pointer space.
pub trait DocumentalClusteringStrategy {
    fn number_of_local_indices(&self) -> usize;

    /// Size of the global pointer space.
    fn number_of_documents(&self) -> u64;

    /// Number of documents held by `local_index`.
    fn local_documents(&self, local_index: usize) -> u64;

    /// The global pointer of `local_pointer` in `local_index`.
    fn global_pointer(&self, local_index: usize, local_pointer: DocId) -> DocId;

    /// The smallest local pointer of `local_index` whose global pointer is at
    /// least `global_pointer`.
    ///
    /// The result may be past the end of the local index, in which case the local
    /// index holds nothing at or beyond `global_pointer`.
    fn local_skip_target(&self, local_index: usize, global_pointer: DocId) -> DocId;
}

/// A clustering strategy that also assigns every global pointer to one local index.
///
/// For every valid `d`, `global_pointer(local_index(d), local_pointer(d)) == d`.
pub trait DocumentalPartitioningStrategy: DocumentalClusteringStrategy {
    fn local_index(&self, global_pointer: DocId) -> Result<usize, ClusterError>;

    fn local_pointer(&self, global_pointer: DocId) -> Result<DocId, ClusterError>;
}

/// Local index `i` holds the global pointers in `[cutpoints[i], cutpoints[i + 1])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ContiguousRepr")]
pub struct ContiguousDocumentalStrategy {
    cutpoints: Vec<DocId>,
}

#[derive(Deserialize)]
struct ContiguousRepr {
    cutpoints: Vec<DocId>,
}

impl TryFrom<ContiguousRepr> for ContiguousDocumentalStrategy {
    type Error = ClusterError;

    fn try_from(repr: ContiguousRepr) -> Result<Self, Self::Error> {
        Self::new(repr.cutpoints)
    }
}

impl ContiguousDocumentalStrategy {
    /// `cutpoints` must start at 0 and never decrease; the last one is the number
    /// of documents.
    pub fn new(cutpoints: Vec<DocId>) -> Result<Self, ClusterError> {
        validate_cutpoints(&cutpoints)?;
        Ok(Self { cutpoints })
    }

    /// Split `number_of_documents` into `number_of_local_indices` ranges of equal
    /// size, the last one taking the remainder.
    pub fn uniform(
        number_of_local_indices: usize,
        number_of_documents: u64,
    ) -> Result<Self, ClusterError> {
        if number_of_local_indices == 0 {
            return Err(ClusterError::InvalidCutpoints("no local indices"));
        }
        if number_of_local_indices as u64 > number_of_documents {
            return Err(ClusterError::TooManyLocalIndices {
                indices: number_of_local_indices,
                items: number_of_documents,
            });
        }
        let size = number_of_documents / number_of_local_indices as u64;
        let cutpoints = (0..number_of_local_indices as u64)
            .map(|i| i * size)
            .chain([number_of_documents])
            .collect();
        Ok(Self { cutpoints })
    }

    pub fn cutpoints(&self) -> &[DocId] {
        &self.cutpoints
    }

    /// The global pointer range of `local_index`.
    pub fn range(&self, local_index: usize) -> Result<std::ops::Range<DocId>, ClusterError> {
        match self.cutpoints.get(local_index..).and_then(|rest| rest.get(..2)) {
            Some(&[start, end]) => Ok(start..end),
            _ => Err(ClusterError::ShardOutOfRange {
                shard: local_index,
                shards: self.number_of_local_indices(),
            }),
        }
    }

    fn limit(&self) -> DocId {
        self.cutpoints[self.cutpoints.len() - 1]
    }
}

/// Cutpoints start at 0, never decrease and delimit at least one range.
pub(crate) fn validate_cutpoints(cutpoints: &[u64]) -> Result<(), ClusterError> {
    match cutpoints {
        [] => Err(ClusterError::InvalidCutpoints("empty cutpoint array")),
        [_] => Err(ClusterError::InvalidCutpoints("no local indices")),
        [first, ..] if *first != 0 => {
            Err(ClusterError::InvalidCutpoints("the first cutpoint must be 0"))
        }
        _ if cutpoints.windows(2).any(|pair| pair[0] > pair[1]) => {
            Err(ClusterError::InvalidCutpoints("cutpoints must not decrease"))
        }
        _ => Ok(()),
    }
}

impl DocumentalClusteringStrategy for ContiguousDocumentalStrategy {
    fn number_of_local_indices(&self) -> usize {
        self.cutpoints.len() - 1
    }

    fn number_of_documents(&self) -> u64 {
        self.limit()
    }

    fn local_documents(&self, local_index: usize) -> u64 {
        self.cutpoints[local_index + 1] - self.cutpoints[local_index]
    }

    fn global_pointer(&self, local_index: usize, local_pointer: DocId) -> DocId {
        local_pointer + self.cutpoints[local_index]
    }

    fn local_skip_target(&self, local_index: usize, global_pointer: DocId) -> DocId {
        global_pointer.saturating_sub(self.cutpoints[local_index])
    }
}

impl DocumentalPartitioningStrategy for ContiguousDocumentalStrategy {
    fn local_index(&self, global_pointer: DocId) -> Result<usize, ClusterError> {
        let limit = self.limit();
        if global_pointer >= limit {
            return Err(ClusterError::PointerOutOfRange {
                pointer: global_pointer,
                limit,
            });
        }
        // Last range starting at or before the pointer; empty ranges are skipped.
        let k = self.number_of_local_indices();
        Ok(self.cutpoints[..k].partition_point(|&cut| cut <= global_pointer) - 1)
    }

    fn local_pointer(&self, global_pointer: DocId) -> Result<DocId, ClusterError> {
        let local_index = self.local_index(global_pointer)?;
        Ok(global_pointer - self.cutpoints[local_index])
    }
}

/// Global pointer `d` lives in local index `d % k` at local pointer `d / k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "InterleavedRepr")]
pub struct InterleavedDocumentalStrategy {
    local_indices: usize,
    documents: u64,
}

#[derive(Deserialize)]
struct InterleavedRepr {
    local_indices: usize,
    documents: u64,
}

impl TryFrom<InterleavedRepr> for InterleavedDocumentalStrategy {
    type Error = ClusterError;

    fn try_from(repr: InterleavedRepr) -> Result<Self, Self::Error> {
        Self::new(repr.local_indices, repr.documents)
    }
}

impl InterleavedDocumentalStrategy {
    pub fn new(local_indices: usize, documents: u64) -> Result<Self, ClusterError> {
        if local_indices == 0 {
            return Err(ClusterError::InvalidCutpoints("no local indices"));
        }
        if local_indices as u64 > documents {
            return Err(ClusterError::TooManyLocalIndices {
                indices: local_indices,
                items: documents,
            });
        }
        Ok(Self {
            local_indices,
            documents,
        })
    }

    fn k(&self) -> u64 {
        self.local_indices as u64
    }
}

impl DocumentalClusteringStrategy for InterleavedDocumentalStrategy {
    fn number_of_local_indices(&self) -> usize {
        self.local_indices
    }

    fn number_of_documents(&self) -> u64 {
        self.documents
    }

    fn local_documents(&self, local_index: usize) -> u64 {
        let k = self.k();
        self.documents / k + u64::from((local_index as u64) < self.documents % k)
    }

    fn global_pointer(&self, local_index: usize, local_pointer: DocId) -> DocId {
        local_pointer * self.k() + local_index as u64
    }

    fn local_skip_target(&self, local_index: usize, global_pointer: DocId) -> DocId {
        global_pointer
            .saturating_sub(local_index as u64)
            .div_ceil(self.k())
    }
}

impl DocumentalPartitioningStrategy for InterleavedDocumentalStrategy {
    fn local_index(&self, global_pointer: DocId) -> Result<usize, ClusterError> {
        self.check(global_pointer)?;
        Ok((global_pointer % self.k()) as usize)
    }

    fn local_pointer(&self, global_pointer: DocId) -> Result<DocId, ClusterError> {
        self.check(global_pointer)?;
        Ok(global_pointer / self.k())
    }
}

impl InterleavedDocumentalStrategy {
    fn check(&self, global_pointer: DocId) -> Result<(), ClusterError> {
        if global_pointer >= self.documents {
            return Err(ClusterError::PointerOutOfRange {
                pointer: global_pointer,
                limit: self.documents,
            });
        }
        Ok(())
    }
}

/// Every local index shares the global pointer space.
///
/// Used when the local indices hold disjoint sets of documents that were already
/// numbered globally, so pointers need no translation. It cannot partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDocumentalStrategy {
    local_indices: usize,
    documents: u64,
}

impl IdentityDocumentalStrategy {
    pub fn new(local_indices: usize, documents: u64) -> Self {
        Self {
            local_indices,
            documents,
        }
    }
}

impl DocumentalClusteringStrategy for IdentityDocumentalStrategy {
    fn number_of_local_indices(&self) -> usize {
        self.local_indices
    }

    fn number_of_documents(&self) -> u64 {
        self.documents
    }

    fn local_documents(&self, _local_index: usize) -> u64 {
        self.documents
    }

    fn global_pointer(&self, _local_index: usize, local_pointer: DocId) -> DocId {
        local_pointer
    }

    fn local_skip_target(&self, _local_index: usize, global_pointer: DocId) -> DocId {
        global_pointer
    }
}

/// The partitioning strategies a [`crate::DocumentalCluster`] can be built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentalStrategy {
    Contiguous(ContiguousDocumentalStrategy),
    Interleaved(InterleavedDocumentalStrategy),
}

impl DocumentalStrategy {
    /// The contiguous strategy, if this is one.
    pub fn as_contiguous(&self) -> Option<&ContiguousDocumentalStrategy> {
        match self {
            Self::Contiguous(strategy) => Some(strategy),
            Self::Interleaved(_) => None,
        }
    }

    fn inner(&self) -> &dyn DocumentalPartitioningStrategy {
        match self {
            Self::Contiguous(strategy) => strategy,
            Self::Interleaved(strategy) => strategy,
        }
    }
}

impl From<ContiguousDocumentalStrategy> for DocumentalStrategy {
    fn from(strategy: ContiguousDocumentalStrategy) -> Self {
        Self::Contiguous(strategy)
    }
}

impl From<InterleavedDocumentalStrategy> for DocumentalStrategy {
    fn from(strategy: InterleavedDocumentalStrategy) -> Self {
        Self::Interleaved(strategy)
    }
}

impl DocumentalClusteringStrategy for DocumentalStrategy {
    fn number_of_local_indices(&self) -> usize {
        self.inner().number_of_local_indices()
    }

    fn number_of_documents(&self) -> u64 {
        self.inner().number_of_documents()
    }

    fn local_documents(&self, local_index: usize) -> u64 {
        self.inner().local_documents(local_index)
    }

    fn global_pointer(&self, local_index: usize, local_pointer: DocId) -> DocId {
        self.inner().global_pointer(local_index, local_pointer)
    }

    fn local_skip_target(&self, local_index: usize, global_pointer: DocId) -> DocId {
        self.inner().local_skip_target(local_index, global_pointer)
    }
}

impl DocumentalPartitioningStrategy for DocumentalStrategy {
    fn local_index(&self, global_pointer: DocId) -> Result<usize, ClusterError> {
        self.inner().local_index(global_pointer)
    }

    fn local_pointer(&self, global_pointer: DocId) -> Result<DocId, ClusterError> {
        self.inner().local_pointer(global_pointer)
    }
}
