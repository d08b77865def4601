/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Interval semantics of the positional operators.

use pretty_assertions::assert_eq;
use query_iterators::{
    DocId, DocumentIterator, DocumentIteratorExt, IndexId, IntervalIterator, MemoryIndex, NodeId,
    QueryBuilder, QueryError, QueryTree,
};
use query_iterators_test_utils::{Witness, collect_intervals, init_tracing, intervals, witness};
use rstest::rstest;

const TEXT: IndexId = IndexId(0);
const TAGS: IndexId = IndexId(1);

/// Build a tree over `documents` with `query`, which gets a leaf factory.
fn tree(
    documents: &[&str],
    query: impl FnOnce(&mut QueryBuilder, &dyn Fn(&mut QueryBuilder, &str) -> NodeId) -> NodeId,
) -> QueryTree {
    init_tracing();
    let index = MemoryIndex::from_documents(TEXT, "text", documents.iter().copied());
    let mut builder = QueryBuilder::new(index.number_of_documents());
    let term = |builder: &mut QueryBuilder, term: &str| builder.leaf(index.documents(term));
    let root = query(&mut builder, &term);
    builder.build(root).unwrap()
}

#[rstest]
#[case::adjacent(&["a b c"], &[(0, vec![(0, 1)])])]
#[case::not_adjacent(&["a c b", "b a"], &[])]
#[case::repeated(&["a b a b", "b a b"], &[(0, vec![(0, 1), (2, 3)]), (1, vec![(1, 2)])])]
fn phrase(#[case] documents: &[&str], #[case] expected: &[(DocId, Vec<(u32, u32)>)]) {
    let mut tree = tree(documents, |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        builder.consecutive([a, b]).unwrap()
    });
    let expected: Vec<(DocId, Witness)> = expected
        .iter()
        .map(|(doc, pairs)| (*doc, intervals(pairs)))
        .collect();
    assert_eq!(collect_intervals(&mut tree, TEXT).unwrap(), expected);
}

#[test]
fn phrase_with_gap() {
    let mut tree = tree(&["a b c", "a c", "c a x c"], |builder, term| {
        let a = term(builder, "a");
        let c = term(builder, "c");
        builder.consecutive_with_gaps([a, c], vec![0, 1]).unwrap()
    });
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [(0, intervals(&[(0, 2)])), (2, intervals(&[(1, 3)]))]
    );
}

#[test]
fn ordered_and_keeps_minimal_intervals() {
    let mut tree = tree(&["a x b", "b a", "a b a b", "a a b"], |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        builder.ordered_and([a, b]).unwrap()
    });
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [
            (0, intervals(&[(0, 2)])),
            (2, intervals(&[(0, 1), (2, 3)])),
            (3, intervals(&[(1, 2)])),
        ]
    );
}

#[test]
fn conjunction_intervals_are_minimal() {
    let mut tree = tree(&["a b", "b x a", "a x x b a"], |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        builder.and([a, b]).unwrap()
    });
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [
            (0, intervals(&[(0, 1)])),
            (1, intervals(&[(0, 2)])),
            (2, intervals(&[(0, 3), (3, 4)])),
        ]
    );
}

#[test]
fn disjunction_intervals_form_an_antichain() {
    let mut tree = tree(&["a b", "c", "b"], |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        let phrase = builder.consecutive([a, b]).unwrap();
        let b_again = term(builder, "b");
        builder.or([phrase, b_again]).unwrap()
    });
    // The phrase contains the lone "b", so only the latter is minimal.
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [(0, intervals(&[(1, 1)])), (2, intervals(&[(0, 0)]))]
    );
}

/// `first`: "a" ... "c" in order; `second`: "b".
fn ordered_ac_and_b(
    builder: &mut QueryBuilder,
    term: &dyn Fn(&mut QueryBuilder, &str) -> NodeId,
) -> (NodeId, NodeId) {
    let a = term(builder, "a");
    let c = term(builder, "c");
    let first = builder.ordered_and([a, c]).unwrap();
    let second = term(builder, "b");
    (first, second)
}

const CONTAINMENT_DOCUMENTS: [&str; 3] = ["a b c", "a c b", "a c"];

#[test]
fn containment_keeps_enclosing_intervals() {
    let mut tree = tree(&CONTAINMENT_DOCUMENTS, |builder, term| {
        let (first, second) = ordered_ac_and_b(builder, term);
        builder.containment(first, second, 0, 0).unwrap()
    });
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [(0, intervals(&[(0, 2)]))]
    );
}

#[test]
fn containment_margins_widen_the_container() {
    let mut tree = tree(&CONTAINMENT_DOCUMENTS, |builder, term| {
        let (first, second) = ordered_ac_and_b(builder, term);
        builder.containment(first, second, 0, 1).unwrap()
    });
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [(0, intervals(&[(0, 2)])), (1, intervals(&[(0, 1)]))]
    );
}

#[test]
fn difference_drops_enclosing_intervals() {
    let mut tree = tree(&CONTAINMENT_DOCUMENTS, |builder, term| {
        let (first, second) = ordered_ac_and_b(builder, term);
        builder.difference(first, second, 0, 0).unwrap()
    });
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [(1, intervals(&[(0, 1)])), (2, intervals(&[(0, 1)]))]
    );
}

#[test]
fn containment_and_difference_split_the_minuend() {
    let documents = ["a b c a c", "a c b a b c", "b a c", "a c"];
    let run = |contain: bool| {
        let mut tree = tree(&documents, |builder, term| {
            let (first, second) = ordered_ac_and_b(builder, term);
            if contain {
                builder.containment(first, second, 0, 0).unwrap()
            } else {
                builder.difference(first, second, 0, 0).unwrap()
            }
        });
        collect_intervals(&mut tree, TEXT).unwrap()
    };
    let minuend = {
        let mut tree = tree(&documents, |builder, term| {
            let a = term(builder, "a");
            let c = term(builder, "c");
            builder.ordered_and([a, c]).unwrap()
        });
        collect_intervals(&mut tree, TEXT).unwrap()
    };
    let (contained, rest) = (run(true), run(false));

    for (doc, all) in minuend {
        let Witness::Intervals(all) = all else {
            panic!("minuend has intervals on every document");
        };
        let part = |results: &[(DocId, Witness)]| match results.iter().find(|(d, _)| *d == doc) {
            Some((_, Witness::Intervals(found))) => found.clone(),
            _ => Vec::new(),
        };
        let mut joined = part(&contained);
        joined.extend(part(&rest));
        joined.sort_by_key(|interval| (interval.left, interval.right));
        assert_eq!(joined, all, "document {doc}");
    }
}

#[test]
fn align_keeps_shared_intervals() {
    let text = MemoryIndex::from_documents(TEXT, "text", ["a b", "b a", "a a"]);
    let tags = MemoryIndex::from_documents(TAGS, "tags", ["x y", "x y", "y x"]);
    let mut builder = QueryBuilder::new(3);
    let a = builder.leaf(text.documents("a"));
    let x = builder.leaf(tags.documents("x"));
    let root = builder.align(a, x).unwrap();
    let mut tree = builder.build(root).unwrap();

    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [(0, intervals(&[(0, 0)])), (2, intervals(&[(1, 1)]))]
    );
}

#[test]
fn low_pass_drops_long_intervals() {
    let mut tree = tree(&["a b", "a x x b", "b a"], |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        let both = builder.and([a, b]).unwrap();
        builder.low_pass(both, 2).unwrap()
    });
    assert_eq!(
        collect_intervals(&mut tree, TEXT).unwrap(),
        [(0, intervals(&[(0, 1)])), (2, intervals(&[(0, 1)]))]
    );
}

#[test]
fn remapping_renames_the_index() {
    let index = MemoryIndex::from_documents(TEXT, "text", ["a", "b a"]);
    let mut builder = QueryBuilder::new(2);
    let a = builder.leaf(index.documents("a"));
    let root = builder.remap(a, &[(TEXT, TAGS)]).unwrap();
    let mut tree = builder.build(root).unwrap();

    assert_eq!(tree.indices().sole(), Some(TAGS));
    assert_eq!(tree.next_document().unwrap(), Some(0));
    assert_eq!(witness(&mut tree, TAGS).unwrap(), intervals(&[(0, 0)]));
    assert_eq!(witness(&mut tree, TEXT).unwrap(), Witness::False);
    assert_eq!(tree.next_document().unwrap(), Some(1));
    assert_eq!(witness(&mut tree, TAGS).unwrap(), intervals(&[(1, 1)]));
}

#[test]
fn remapping_rejects_unknown_or_clashing_indices() {
    let text = MemoryIndex::from_documents(TEXT, "text", ["a"]);
    let tags = MemoryIndex::from_documents(TAGS, "tags", ["x"]);
    let mut builder = QueryBuilder::new(1);
    let a = builder.leaf(text.documents("a"));
    assert!(matches!(
        builder.remap(a, &[(TAGS, IndexId(2))]),
        Err(QueryError::InvalidRemapping { from: TAGS, .. })
    ));

    let x = builder.leaf(tags.documents("x"));
    let both = builder.and([a, x]).unwrap();
    assert!(matches!(
        builder.remap(both, &[(TEXT, TAGS)]),
        Err(QueryError::InvalidRemapping { from: TEXT, to: TAGS })
    ));
}

#[test]
fn reset_replays_the_intervals() {
    let mut tree = tree(&["a b a b"], |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        builder.ordered_and([a, b]).unwrap()
    });
    assert_eq!(tree.next_document().unwrap(), Some(0));
    let first = witness(&mut tree, TEXT).unwrap();
    let mut replay = tree.interval_iterator(TEXT).unwrap().into_intervals().unwrap();
    replay.reset().unwrap();
    let again: Vec<_> = replay.collect::<Result<_, _>>().unwrap();
    assert_eq!(Witness::Intervals(again), first);
}

#[rstest]
#[case::conjunction(OperatorCase::And)]
#[case::ordered(OperatorCase::Ordered)]
#[case::phrase(OperatorCase::Phrase)]
#[case::low_pass(OperatorCase::LowPass)]
fn extent_bounds_every_interval(#[case] case: OperatorCase) {
    let mut tree = tree(&["a b c a", "c b a x a b", "b a c"], |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        match case {
            OperatorCase::And => builder.and([a, b]).unwrap(),
            OperatorCase::Ordered => builder.ordered_and([a, b]).unwrap(),
            OperatorCase::Phrase => builder.consecutive([a, b]).unwrap(),
            OperatorCase::LowPass => {
                let both = builder.and([a, b]).unwrap();
                builder.low_pass(both, 3).unwrap()
            }
        }
    });
    while let Some(doc) = tree.next_document().unwrap() {
        let Witness::Intervals(found) = witness(&mut tree, TEXT).unwrap() else {
            panic!("document {doc} has no intervals");
        };
        let extent = tree.extent(TEXT);
        assert!(extent > 0);
        for interval in found {
            assert!(extent <= interval.length(), "{interval} in document {doc}");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OperatorCase {
    And,
    Ordered,
    Phrase,
    LowPass,
}

#[test]
fn intervals_need_a_current_document() {
    let mut tree = tree(&["a b"], |builder, term| {
        let a = term(builder, "a");
        let b = term(builder, "b");
        builder.and([a, b]).unwrap()
    });
    assert!(matches!(tree.intervals(TEXT), Err(QueryError::NotPositioned)));
    assert_eq!(tree.next_document().unwrap(), Some(0));
    assert_eq!(tree.next_document().unwrap(), None);
    assert!(matches!(tree.intervals(TEXT), Err(QueryError::NotPositioned)));
}
