/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Cluster iterators as leaves of composite queries.

use index_cluster::{
    ClusterMode, ContiguousDocumentalStrategy, ContiguousLexicalStrategy, DocumentalCluster,
    InterleavedDocumentalStrategy, LexicalCluster,
};
use pretty_assertions::assert_eq;
use query_iterators::{
    CounterCollector, DocumentIterator, IndexId, MemoryIndex, QueryBuilder, TermCollector,
};
use query_iterators_test_utils::{collect_intervals, init_tracing, intervals};
use rstest::rstest;

const DOCUMENTS: [&str; 6] = [
    "new york city",
    "york new",
    "the new york times",
    "old york",
    "new jersey",
    "new new york",
];

fn cluster(mode: ClusterMode, interleaved: bool) -> DocumentalCluster {
    let strategy = if interleaved {
        InterleavedDocumentalStrategy::new(3, 6).unwrap().into()
    } else {
        ContiguousDocumentalStrategy::uniform(3, 6).unwrap().into()
    };
    DocumentalCluster::new(IndexId(0), "text", strategy, mode, DOCUMENTS).unwrap()
}

#[rstest]
#[case::concatenated(ClusterMode::Concatenated, false)]
#[case::merged_contiguous(ClusterMode::Merged, false)]
#[case::merged_interleaved(ClusterMode::Merged, true)]
fn phrase_over_a_cluster(#[case] mode: ClusterMode, #[case] interleaved: bool) {
    init_tracing();
    let cluster = cluster(mode, interleaved);
    let mut builder = QueryBuilder::new(cluster.number_of_documents());
    let new = builder.leaf(cluster.documents("new").unwrap());
    let york = builder.leaf(cluster.documents("york").unwrap());
    let root = builder.consecutive([new, york]).unwrap();
    let mut tree = builder.build(root).unwrap();

    assert_eq!(
        collect_intervals(&mut tree, IndexId(0)).unwrap(),
        vec![
            (0, intervals(&[(0, 1)])),
            (2, intervals(&[(1, 2)])),
            (5, intervals(&[(1, 2)])),
        ]
    );
}

#[test]
fn conjunction_over_a_cluster_matches_the_whole_index() {
    let whole = MemoryIndex::from_documents(IndexId(0), "text", DOCUMENTS);
    let cluster = cluster(ClusterMode::Merged, true);

    let mut expected = {
        let mut builder = QueryBuilder::new(6);
        let new = builder.leaf(whole.documents("new"));
        let york = builder.leaf(whole.documents("york"));
        let root = builder.and([new, york]).unwrap();
        builder.build(root).unwrap()
    };
    let mut actual = {
        let mut builder = QueryBuilder::new(6);
        let new = builder.leaf(cluster.documents("new").unwrap());
        let york = builder.leaf(cluster.documents("york").unwrap());
        let root = builder.and([new, york]).unwrap();
        builder.build(root).unwrap()
    };
    assert_eq!(
        collect_intervals(&mut actual, IndexId(0)).unwrap(),
        collect_intervals(&mut expected, IndexId(0)).unwrap()
    );
}

#[test]
fn visitors_reach_the_holding_shard() {
    let cluster = cluster(ClusterMode::Concatenated, false);
    let mut builder = QueryBuilder::new(6);
    let new = builder.leaf(cluster.documents("new").unwrap());
    let york = builder.leaf(cluster.documents("york").unwrap());
    let root = builder.or([new, york]).unwrap();
    let mut tree = builder.build(root).unwrap();

    let terms = TermCollector::collect(&mut tree).unwrap();
    assert_eq!(terms.offset(IndexId(0), "york"), Some(1));
    let mut counters = CounterCollector::new(terms);
    assert_eq!(tree.skip_to(5).unwrap(), Some(5));
    assert_eq!(counters.collect(&mut tree).unwrap(), [2, 1]);
    assert_eq!(tree.skip_to(1).unwrap(), Some(5));
    assert_eq!(tree.next_document().unwrap(), None);
}

#[test]
fn lexical_cluster_leaves_combine_across_shards() {
    let whole = MemoryIndex::from_documents(IndexId(0), "text", DOCUMENTS);
    let strategy = ContiguousLexicalStrategy::uniform(2, &whole).unwrap();
    let cluster = LexicalCluster::new(IndexId(0), "text", strategy, DOCUMENTS);
    // "new" and "york" may live in different shards; positions still line up.
    let mut builder = QueryBuilder::new(cluster.number_of_documents());
    let new = builder.leaf(cluster.documents("new"));
    let york = builder.leaf(cluster.documents("york"));
    let root = builder.consecutive([new, york]).unwrap();
    let mut tree = builder.build(root).unwrap();
    let documents: Vec<_> = collect_intervals(&mut tree, IndexId(0))
        .unwrap()
        .into_iter()
        .map(|(doc, _)| doc)
        .collect();
    assert_eq!(documents, vec![0, 2, 5]);
}
