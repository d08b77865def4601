/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

use index_cluster::{
    ClusterMode, ContiguousDocumentalStrategy, DocumentalCluster, DocumentalStrategy,
    InterleavedDocumentalStrategy,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use query_iterators::{DocId, DocumentIterator, IndexId, MemoryIndex};
use query_iterators_test_utils::{collect_documents, collect_intervals, init_tracing};
use rstest::rstest;

#[rstest]
fn term_in_one_shard_skips_to_the_end(
    #[values(ClusterMode::Merged, ClusterMode::Concatenated)] mode: ClusterMode,
) {
    init_tracing();
    let strategy = ContiguousDocumentalStrategy::uniform(2, 4).unwrap();
    let cluster = DocumentalCluster::new(
        IndexId(0),
        "text",
        strategy.into(),
        mode,
        ["A B", "B", "A", "A"],
    )
    .unwrap();
    let mut b = cluster.documents("b").unwrap();
    assert_eq!(b.skip_to(2).unwrap(), None);
    assert_eq!(b.next_document().unwrap(), None);
}

fn clusters(documents: &[String], shards: usize) -> Vec<DocumentalCluster> {
    let n = documents.len() as u64;
    let configurations: [(DocumentalStrategy, ClusterMode); 3] = [
        (
            ContiguousDocumentalStrategy::uniform(shards, n).unwrap().into(),
            ClusterMode::Concatenated,
        ),
        (
            ContiguousDocumentalStrategy::uniform(shards, n).unwrap().into(),
            ClusterMode::Merged,
        ),
        (
            InterleavedDocumentalStrategy::new(shards, n).unwrap().into(),
            ClusterMode::Merged,
        ),
    ];
    configurations
        .into_iter()
        .map(|(strategy, mode)| {
            DocumentalCluster::new(
                IndexId(0),
                "text",
                strategy,
                mode,
                documents.iter().map(String::as_str),
            )
            .unwrap()
        })
        .collect()
}

fn corpus() -> impl Strategy<Value = Vec<String>> {
    let word = prop::sample::select(vec!["a", "b", "c", "d"]);
    let document = prop::collection::vec(word, 0..5).prop_map(|words| words.join(" "));
    prop::collection::vec(document, 4..24)
}

/// Follows `skips`, reading one document after each.
fn walk(iterator: &mut dyn DocumentIterator, skips: &[DocId]) -> Vec<Option<DocId>> {
    let mut seen = Vec::new();
    for &target in skips {
        seen.push(iterator.skip_to(target).unwrap());
        seen.push(iterator.next_document().unwrap());
    }
    seen
}

proptest! {
    #[test]
    fn clusters_answer_like_the_whole_index(
        documents in corpus(),
        shards in 1usize..4,
        term in prop::sample::select(vec!["a", "b", "c", "d", "e"]),
    ) {
        let whole = MemoryIndex::from_documents(
            IndexId(0),
            "text",
            documents.iter().map(String::as_str),
        );
        let expected = collect_intervals(&mut whole.documents(term), IndexId(0)).unwrap();
        for cluster in clusters(&documents, shards) {
            let mut iterator = cluster.documents(term).unwrap();
            let actual = collect_intervals(&mut iterator, IndexId(0)).unwrap();
            prop_assert_eq!(&actual, &expected, "{:?}", cluster.mode());
        }
    }

    #[test]
    fn cluster_skips_like_the_whole_index(
        documents in corpus(),
        shards in 1usize..4,
        mut skips in prop::collection::vec(0u64..30, 1..6),
        term in prop::sample::select(vec!["a", "b", "c"]),
    ) {
        skips.sort_unstable();
        let whole = MemoryIndex::from_documents(
            IndexId(0),
            "text",
            documents.iter().map(String::as_str),
        );
        let expected = walk(&mut whole.documents(term), &skips);
        for cluster in clusters(&documents, shards) {
            let mut iterator = cluster.documents(term).unwrap();
            prop_assert_eq!(walk(&mut *iterator, &skips), expected.clone());
        }
    }
}

#[test]
fn cluster_frequency_sums_the_shards() {
    let documents: Vec<String> = ["a", "a b", "b", "a", "c a"].map(String::from).to_vec();
    for cluster in clusters(&documents, 2) {
        let iterator = cluster.documents("a").unwrap();
        assert_eq!(iterator.frequency(), Some(4));
        let mut iterator = cluster.documents("a").unwrap();
        assert_eq!(collect_documents(&mut iterator).unwrap(), vec![0, 1, 3, 4]);
    }
}

#[test]
fn cluster_configuration_round_trips_through_json() {
    let strategy: DocumentalStrategy = ContiguousDocumentalStrategy::new(vec![0, 2, 5]).unwrap().into();
    let json = serde_json::to_string(&(&strategy, ClusterMode::Concatenated)).unwrap();
    let (back, mode): (DocumentalStrategy, ClusterMode) = serde_json::from_str(&json).unwrap();
    assert_eq!(back, strategy);
    assert_eq!(mode, ClusterMode::Concatenated);
}
