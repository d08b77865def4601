/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Set semantics of the boolean operators, checked against `BTreeSet` models.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use query_iterators::{DocId, DocumentIterator, IndexId, NodeId, QueryBuilder, QueryTree};
use query_iterators_test_utils::{VecPostings, collect_documents, init_tracing};
use rstest::rstest;

const TEXT: IndexId = IndexId(0);
const DOCUMENTS: u64 = 64;

fn leaves(builder: &mut QueryBuilder, sets: &[BTreeSet<DocId>]) -> Vec<NodeId> {
    sets.iter()
        .enumerate()
        .map(|(i, set)| {
            let documents: Vec<DocId> = set.iter().copied().collect();
            builder.leaf(VecPostings::documents(TEXT, format!("t{i}"), &documents).into_iterator())
        })
        .collect()
}

fn and_tree(sets: &[BTreeSet<DocId>]) -> QueryTree {
    let mut builder = QueryBuilder::new(DOCUMENTS);
    let children = leaves(&mut builder, sets);
    let root = builder.and(children).unwrap();
    builder.build(root).unwrap()
}

fn or_tree(sets: &[BTreeSet<DocId>]) -> QueryTree {
    let mut builder = QueryBuilder::new(DOCUMENTS);
    let children = leaves(&mut builder, sets);
    let root = builder.or(children).unwrap();
    builder.build(root).unwrap()
}

fn intersection(sets: &[BTreeSet<DocId>]) -> BTreeSet<DocId> {
    sets.iter()
        .skip(1)
        .fold(sets[0].clone(), |acc, set| &acc & set)
}

fn union(sets: &[BTreeSet<DocId>]) -> BTreeSet<DocId> {
    sets.iter().flatten().copied().collect()
}

fn postings() -> impl Strategy<Value = BTreeSet<DocId>> {
    prop::collection::btree_set(0..DOCUMENTS, 0..24)
}

/// Skip to each target in turn, checking the result against the model.
fn check_skips(tree: &mut QueryTree, model: &BTreeSet<DocId>, targets: &[DocId]) {
    let mut current = None;
    for &target in targets {
        let expected = match current {
            Some(doc) if doc >= target => Some(doc),
            _ => model.range(target..).next().copied(),
        };
        let actual = tree.skip_to(target).unwrap();
        assert_eq!(actual, expected, "skip_to({target}) from {current:?}");
        if actual.is_none() {
            return;
        }
        current = actual;
    }
}

proptest! {
    #[test]
    fn and_is_intersection(sets in prop::collection::vec(postings(), 2..5)) {
        let mut tree = and_tree(&sets);
        let expected: Vec<DocId> = intersection(&sets).into_iter().collect();
        prop_assert_eq!(collect_documents(&mut tree).unwrap(), expected);
    }

    #[test]
    fn or_is_union(sets in prop::collection::vec(postings(), 2..5)) {
        let mut tree = or_tree(&sets);
        let expected: Vec<DocId> = union(&sets).into_iter().collect();
        prop_assert_eq!(collect_documents(&mut tree).unwrap(), expected);
    }

    #[test]
    fn not_is_complement(set in postings()) {
        let mut builder = QueryBuilder::new(DOCUMENTS);
        let child = leaves(&mut builder, std::slice::from_ref(&set))[0];
        let root = builder.not(child).unwrap();
        let mut tree = builder.build(root).unwrap();
        let expected: Vec<DocId> = (0..DOCUMENTS).filter(|doc| !set.contains(doc)).collect();
        prop_assert_eq!(collect_documents(&mut tree).unwrap(), expected);
    }

    #[test]
    fn and_not_is_difference(included in postings(), excluded in postings()) {
        let mut builder = QueryBuilder::new(DOCUMENTS);
        let children = leaves(&mut builder, &[included.clone(), excluded.clone()]);
        let negated = builder.not(children[1]).unwrap();
        let root = builder.and([children[0], negated]).unwrap();
        let mut tree = builder.build(root).unwrap();
        let expected: Vec<DocId> = included.difference(&excluded).copied().collect();
        prop_assert_eq!(collect_documents(&mut tree).unwrap(), expected);
    }

    #[test]
    fn and_skips_like_the_model(
        sets in prop::collection::vec(postings(), 2..4),
        targets in prop::collection::vec(0..DOCUMENTS + 4, 1..10),
    ) {
        let mut targets = targets;
        targets.sort_unstable();
        check_skips(&mut and_tree(&sets), &intersection(&sets), &targets);
    }

    #[test]
    fn or_skips_like_the_model(
        sets in prop::collection::vec(postings(), 2..4),
        targets in prop::collection::vec(0..DOCUMENTS + 4, 1..10),
    ) {
        let mut targets = targets;
        targets.sort_unstable();
        check_skips(&mut or_tree(&sets), &union(&sets), &targets);
    }
}

#[test]
fn skip_to_does_not_move_back() {
    init_tracing();
    let sets = [
        BTreeSet::from([1, 5, 9, 12]),
        BTreeSet::from([0, 5, 9, 13]),
    ];
    let mut tree = and_tree(&sets);
    assert_eq!(tree.skip_to(6).unwrap(), Some(9));
    assert_eq!(tree.skip_to(2).unwrap(), Some(9));
    assert_eq!(tree.skip_to(9).unwrap(), Some(9));
    assert_eq!(tree.next_document().unwrap(), None);
    assert_eq!(tree.skip_to(40).unwrap(), None);
    assert_eq!(tree.next_document().unwrap(), None);
}

#[rstest]
#[case::empty_operand(&[&[][..], &[1, 2, 3][..]], &[])]
#[case::disjoint(&[&[0, 2, 4][..], &[1, 3, 5][..]], &[])]
#[case::nested(&[&[0, 1, 2, 3][..], &[1, 2][..], &[2][..]], &[2])]
fn conjunction_cases(#[case] postings: &[&[DocId]], #[case] expected: &[DocId]) {
    let sets: Vec<BTreeSet<DocId>> = postings
        .iter()
        .map(|docs| docs.iter().copied().collect())
        .collect();
    let mut tree = and_tree(&sets);
    assert_eq!(collect_documents(&mut tree).unwrap(), expected);
}

#[test]
fn conjunction_with_an_empty_operand_is_exhausted_up_front() {
    let sets = [BTreeSet::new(), BTreeSet::from([1, 2])];
    let tree = and_tree(&sets);
    assert!(!tree.may_have_next());
}

#[test]
fn leaf_reports_posting_frequency() {
    let mut builder = QueryBuilder::new(DOCUMENTS);
    let leaf = builder.leaf(VecPostings::documents(TEXT, "t", &[1, 4, 9]).into_iterator());
    let tree = builder.build(leaf).unwrap();
    assert_eq!(tree.frequency(), Some(3));
}
