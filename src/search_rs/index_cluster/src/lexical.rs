/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Lexical partitioning: every term lives in exactly one local index.

use serde::{Deserialize, Serialize};
use tracing::debug;

use query_iterators::{
    DocumentIterator, FalseIterator, IndexId, IndexInfo, MemoryIndex, TermIterator,
};

use crate::ClusterError;
use crate::strategy::validate_cutpoints;

/// Local index `i` holds the terms numbered in `[cutpoints[i], cutpoints[i + 1])`,
/// which are the terms lexicographically in `[cutpoint_terms[i], cutpoint_terms[i + 1])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LexicalRepr")]
pub struct ContiguousLexicalStrategy {
    cutpoints: Vec<u64>,
    /// First term of each local index; the last local index is unbounded above.
    cutpoint_terms: Vec<String>,
}

#[derive(Deserialize)]
struct LexicalRepr {
    cutpoints: Vec<u64>,
    cutpoint_terms: Vec<String>,
}

impl TryFrom<LexicalRepr> for ContiguousLexicalStrategy {
    type Error = ClusterError;

    fn try_from(repr: LexicalRepr) -> Result<Self, Self::Error> {
        Self::new(repr.cutpoints, repr.cutpoint_terms)
    }
}

impl ContiguousLexicalStrategy {
    /// `cutpoint_terms` holds the first term of each local index, so it is one
    /// shorter than `cutpoints`.
    pub fn new(cutpoints: Vec<u64>, cutpoint_terms: Vec<String>) -> Result<Self, ClusterError> {
        validate_cutpoints(&cutpoints)?;
        if cutpoint_terms.len() + 1 != cutpoints.len() {
            return Err(ClusterError::InvalidCutpoints(
                "one cutpoint term is needed per local index",
            ));
        }
        if cutpoint_terms.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(ClusterError::InvalidCutpoints("cutpoint terms must not decrease"));
        }
        Ok(Self {
            cutpoints,
            cutpoint_terms,
        })
    }

    /// Split the lexicon of `index` into `number_of_local_indices` runs of terms
    /// with roughly the same number of occurrences.
    pub fn uniform(number_of_local_indices: usize, index: &MemoryIndex) -> Result<Self, ClusterError> {
        let terms: Vec<(&str, u64)> = index.terms().collect();
        if number_of_local_indices == 0 {
            return Err(ClusterError::InvalidCutpoints("no local indices"));
        }
        if number_of_local_indices > terms.len() {
            return Err(ClusterError::TooManyLocalIndices {
                indices: number_of_local_indices,
                items: terms.len() as u64,
            });
        }

        let total: u64 = terms.iter().map(|(_, occurrences)| occurrences).sum();
        // Shrink the block size until enough blocks come out.
        let mut divisor = number_of_local_indices as u64;
        loop {
            let block = total / divisor;
            let mut cutpoints = vec![0];
            let mut count = 0;
            for (number, (_, occurrences)) in terms.iter().enumerate() {
                count += occurrences;
                let next = number as u64 + 1;
                let last = next == terms.len() as u64;
                if last || (count >= block && cutpoints.len() < number_of_local_indices) {
                    cutpoints.push(next);
                    count = 0;
                }
            }
            if cutpoints.len() > number_of_local_indices {
                let cutpoint_terms = cutpoints[..number_of_local_indices]
                    .iter()
                    .map(|&cut| terms[cut as usize].0.to_owned())
                    .collect();
                debug!(?cutpoints, "computed lexical cutpoints");
                return Self::new(cutpoints, cutpoint_terms);
            }
            divisor += 1;
        }
    }

    pub fn number_of_local_indices(&self) -> usize {
        self.cutpoints.len() - 1
    }

    pub fn number_of_terms(&self) -> u64 {
        self.cutpoints[self.cutpoints.len() - 1]
    }

    /// The local index owning `term`, if any does.
    pub fn local_index(&self, term: &str) -> Option<usize> {
        self.cutpoint_terms
            .partition_point(|cut| cut.as_str() <= term)
            .checked_sub(1)
    }

    /// The local index owning the term numbered `global_number`.
    pub fn local_index_of_number(&self, global_number: u64) -> Result<usize, ClusterError> {
        let limit = self.number_of_terms();
        if global_number >= limit {
            return Err(ClusterError::PointerOutOfRange {
                pointer: global_number,
                limit,
            });
        }
        let k = self.number_of_local_indices();
        Ok(self.cutpoints[..k].partition_point(|&cut| cut <= global_number) - 1)
    }

    pub fn local_number(&self, global_number: u64) -> Result<u64, ClusterError> {
        let local_index = self.local_index_of_number(global_number)?;
        Ok(global_number - self.cutpoints[local_index])
    }

    pub fn global_number(&self, local_index: usize, local_number: u64) -> u64 {
        local_number + self.cutpoints[local_index]
    }
}

/// An index split by term; a term query goes to the single local index owning it.
#[derive(Debug, Clone)]
pub struct LexicalCluster {
    info: IndexInfo,
    strategy: ContiguousLexicalStrategy,
    shards: Vec<MemoryIndex>,
}

impl LexicalCluster {
    /// Index `documents`, sending each term to the local index `strategy` assigns
    /// it to. Terms no local index owns are dropped.
    pub fn new<'a>(
        id: IndexId,
        name: impl Into<String>,
        strategy: ContiguousLexicalStrategy,
        documents: impl IntoIterator<Item = &'a str> + Clone,
    ) -> Self {
        let info = IndexInfo::new(id, name);
        let shards: Vec<MemoryIndex> = (0..strategy.number_of_local_indices())
            .map(|shard| {
                documents
                    .clone()
                    .into_iter()
                    .fold(MemoryIndex::builder(id, info.name.clone()), |builder, text| {
                        builder.document_where(text, |term| strategy.local_index(term) == Some(shard))
                    })
                    .build()
            })
            .collect();
        debug!(
            index = %id,
            shards = shards.len(),
            terms = strategy.number_of_terms(),
            "built lexical cluster"
        );
        Self {
            info,
            strategy,
            shards,
        }
    }

    pub fn info(&self) -> &IndexInfo {
        &self.info
    }

    pub fn strategy(&self) -> &ContiguousLexicalStrategy {
        &self.strategy
    }

    pub fn shards(&self) -> &[MemoryIndex] {
        &self.shards
    }

    pub fn number_of_documents(&self) -> u64 {
        self.shards.first().map_or(0, MemoryIndex::number_of_documents)
    }

    /// The global number of `term`.
    pub fn term_number(&self, term: &str) -> Option<u64> {
        let shard = self.strategy.local_index(&term.to_lowercase())?;
        let local = self.shards[shard].term_number(term)?;
        Some(self.strategy.global_number(shard, local))
    }

    /// The documents of `term`, read from the local index owning it.
    pub fn documents(&self, term: &str) -> Box<dyn DocumentIterator> {
        match self.strategy.local_index(&term.to_lowercase()) {
            Some(shard) => Box::new(self.shards[shard].documents(term)),
            None => Box::new(FalseIterator::new(self.info.id)),
        }
    }

    /// The documents of the term numbered `global_number`.
    pub fn documents_by_number(
        &self,
        global_number: u64,
    ) -> Result<Box<dyn DocumentIterator>, ClusterError> {
        let shard = self.strategy.local_index_of_number(global_number)?;
        let local = self.strategy.local_number(global_number)?;
        Ok(match self.shards[shard].term(local) {
            Some(term) => Box::new(TermIterator::new(self.shards[shard].postings(term))),
            None => Box::new(FalseIterator::new(self.info.id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use query_iterators::Interval;
    use query_iterators_test_utils::collect_documents;

    const DOCUMENTS: [&str; 4] = ["apple banana", "cherry apple", "date", "banana date elder"];

    fn strategy() -> ContiguousLexicalStrategy {
        ContiguousLexicalStrategy::new(vec![0, 2, 5], vec!["apple".into(), "cherry".into()])
            .unwrap()
    }

    #[test]
    fn test_terms_route_to_their_shard() {
        let strategy = strategy();
        assert_eq!(strategy.local_index("apple"), Some(0));
        assert_eq!(strategy.local_index("banana"), Some(0));
        assert_eq!(strategy.local_index("cherry"), Some(1));
        assert_eq!(strategy.local_index("zebra"), Some(1));
        assert_eq!(strategy.local_index("aardvark"), None);
        assert_eq!(strategy.local_index_of_number(3).unwrap(), 1);
        assert_eq!(strategy.local_number(3).unwrap(), 1);
        assert_eq!(strategy.global_number(1, 1), 3);
    }

    #[test]
    fn test_mismatched_terms_are_rejected() {
        assert!(ContiguousLexicalStrategy::new(vec![0, 2, 5], vec!["a".into()]).is_err());
        assert!(
            ContiguousLexicalStrategy::new(vec![0, 2, 5], vec!["b".into(), "a".into()]).is_err()
        );
    }

    #[test]
    fn test_cluster_answers_like_a_single_index() {
        let cluster = LexicalCluster::new(IndexId(0), "text", strategy(), DOCUMENTS);
        let whole = MemoryIndex::from_documents(IndexId(0), "text", DOCUMENTS);
        for term in ["apple", "banana", "cherry", "date", "elder", "fig"] {
            assert_eq!(
                collect_documents(&mut cluster.documents(term)).unwrap(),
                collect_documents(&mut whole.documents(term)).unwrap(),
                "{term}"
            );
        }
        assert_eq!(cluster.shards()[0].number_of_terms(), 2);
        assert_eq!(cluster.shards()[1].number_of_terms(), 3);
        assert_eq!(cluster.term_number("date"), whole.term_number("date"));
    }

    #[test]
    fn test_positions_survive_the_split() {
        let cluster = LexicalCluster::new(IndexId(0), "text", strategy(), DOCUMENTS);
        let mut elder = cluster.documents("elder");
        assert_eq!(elder.next_document().unwrap(), Some(3));
        assert_eq!(
            elder.next_interval(IndexId(0)).unwrap(),
            Some(Interval::singleton(2))
        );
    }

    #[test]
    fn test_documents_by_number() {
        let cluster = LexicalCluster::new(IndexId(0), "text", strategy(), DOCUMENTS);
        // Global lexicon: apple, banana, cherry, date, elder.
        let mut date = cluster.documents_by_number(3).unwrap();
        assert_eq!(collect_documents(&mut date).unwrap(), vec![2, 3]);
        assert!(cluster.documents_by_number(5).is_err());
    }

    #[test]
    fn test_uniform_balances_occurrences() {
        let index = MemoryIndex::from_documents(IndexId(0), "text", DOCUMENTS);
        let strategy = ContiguousLexicalStrategy::uniform(2, &index).unwrap();
        assert_eq!(strategy.number_of_local_indices(), 2);
        assert_eq!(strategy.number_of_terms(), 5);
        assert_eq!(strategy.local_index("apple"), Some(0));
        // apple and banana hold 4 of the 8 occurrences.
        assert_eq!(strategy.local_index("cherry"), Some(1));
    }

    #[test]
    fn test_serde_round_trip() {
        let strategy = strategy();
        let json = serde_json::to_string(&strategy).unwrap();
        let back: ContiguousLexicalStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, strategy);
    }
}
