/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Visitor walks, true paths and payload filtering.

use std::ops::ControlFlow;

use pretty_assertions::assert_eq;
use query_iterators::{
    CounterCollector, DocumentIterator, DocumentIteratorVisitor, IndexId, LeafInfo, MemoryIndex,
    OperatorKind, PayloadPredicate, QueryBuilder, TermCollector, Traversal,
};
use query_iterators_test_utils::{collect_documents, init_tracing};

const TEXT: IndexId = IndexId(0);

#[test]
fn counters_follow_true_paths() {
    init_tracing();
    let index = MemoryIndex::from_documents(TEXT, "text", ["a b a", "b", "c"]);
    let mut builder = QueryBuilder::new(index.number_of_documents());
    let a = builder.leaf(index.documents("a"));
    let b = builder.leaf(index.documents("b"));
    let both = builder.and([a, b]).unwrap();
    let b_again = builder.leaf(index.documents("b"));
    let root = builder.or([both, b_again]).unwrap();
    let mut tree = builder.build(root).unwrap();

    let terms = TermCollector::collect(&mut tree).unwrap();
    assert_eq!(
        terms.terms(),
        [(TEXT, "a".to_owned()), (TEXT, "b".to_owned())]
    );
    assert_eq!(terms.leaves(), 3);

    let mut counters = CounterCollector::new(terms);
    assert_eq!(tree.next_document().unwrap(), Some(0));
    assert_eq!(counters.collect(&mut tree).unwrap(), [2, 1]);
    assert_eq!(tree.next_document().unwrap(), Some(1));
    assert_eq!(counters.collect(&mut tree).unwrap(), [0, 1]);
}

#[test]
fn negated_operands_are_not_on_true_paths() {
    let index = MemoryIndex::from_documents(TEXT, "text", ["a", "a c", "c a a"]);
    let mut builder = QueryBuilder::new(index.number_of_documents());
    let a = builder.leaf(index.documents("a"));
    let c = builder.leaf(index.documents("c"));
    let not_c = builder.not(c).unwrap();
    let root = builder.and([a, not_c]).unwrap();
    let mut tree = builder.build(root).unwrap();

    let terms = TermCollector::collect(&mut tree).unwrap();
    assert_eq!(terms.offset(TEXT, "c"), Some(1));
    let mut counters = CounterCollector::new(terms);
    assert_eq!(tree.next_document().unwrap(), Some(0));
    assert_eq!(counters.collect(&mut tree).unwrap(), [1, 0]);
    assert_eq!(tree.next_document().unwrap(), None);
}

#[test]
fn counters_need_a_current_document() {
    let index = MemoryIndex::from_documents(TEXT, "text", ["a"]);
    let mut builder = QueryBuilder::new(1);
    let a = builder.leaf(index.documents("a"));
    let mut tree = builder.build(a).unwrap();
    let mut counters = CounterCollector::new(TermCollector::collect(&mut tree).unwrap());
    assert!(counters.collect(&mut tree).is_err());
}

#[test]
fn node_weights_scale_leaf_weights() {
    let index = MemoryIndex::from_documents(TEXT, "text", ["a b"]);
    let mut builder = QueryBuilder::new(1);
    let a = builder.leaf(index.documents("a").with_weight(1.5));
    let b = builder.leaf(index.documents("b"));
    builder.weight(a, 2.0).unwrap();
    let root = builder.and([a, b]).unwrap();
    let mut tree = builder.build(root).unwrap();

    let mut counters = CounterCollector::new(TermCollector::collect(&mut tree).unwrap());
    assert_eq!(tree.next_document().unwrap(), Some(0));
    counters.collect(&mut tree).unwrap();
    assert_eq!(counters.weights(), [3.0, 1.0]);
}

/// Records the walk and stops at the first leaf.
#[derive(Default)]
struct FirstLeaf {
    operators: Vec<OperatorKind>,
    term: Option<String>,
}

impl DocumentIteratorVisitor for FirstLeaf {
    fn visit_pre(&mut self, kind: OperatorKind, _weight: f64) -> ControlFlow<()> {
        self.operators.push(kind);
        ControlFlow::Continue(())
    }

    fn visit_leaf(&mut self, leaf: &LeafInfo<'_>) -> ControlFlow<()> {
        self.term = leaf.term.map(str::to_owned);
        ControlFlow::Break(())
    }
}

#[test]
fn visitors_can_stop_the_walk() {
    let index = MemoryIndex::from_documents(TEXT, "text", ["a b"]);
    let mut builder = QueryBuilder::new(1);
    let a = builder.leaf(index.documents("a"));
    let b = builder.leaf(index.documents("b"));
    let phrase = builder.consecutive([a, b]).unwrap();
    let c = builder.leaf(index.documents("c"));
    let root = builder.or([phrase, c]).unwrap();
    let mut tree = builder.build(root).unwrap();

    let mut visitor = FirstLeaf::default();
    let flow = tree.accept(&mut visitor, Traversal::All).unwrap();
    assert!(flow.is_break());
    assert_eq!(visitor.operators, [OperatorKind::Or, OperatorKind::Consecutive]);
    assert_eq!(visitor.term.as_deref(), Some("a"));
}

#[test]
fn payload_predicates_filter_conjunctions() {
    let index = MemoryIndex::builder(TEXT, "text")
        .document_with_payload("a b", 1)
        .document_with_payload("a b", 5)
        .document_with_payload("a", 3)
        .document_with_payload("a b", 8)
        .build();
    let mut builder = QueryBuilder::new(index.number_of_documents());
    let heavy = builder.leaf(PayloadPredicate::new(index.documents("a"), |payload| payload > 2));
    let b = builder.leaf(index.documents("b"));
    let root = builder.and([heavy, b]).unwrap();
    let mut tree = builder.build(root).unwrap();

    assert_eq!(collect_documents(&mut tree).unwrap(), [1, 3]);
}

#[test]
fn payload_predicate_alone_skips_rejected_documents() {
    let index = MemoryIndex::builder(TEXT, "text")
        .document_with_payload("a", 1)
        .document_with_payload("a", 5)
        .document_with_payload("a", 3)
        .build();
    let mut heavy = PayloadPredicate::new(index.documents("a"), |payload| payload >= 3);
    assert_eq!(heavy.skip_to(0).unwrap(), Some(1));
    assert_eq!(heavy.next_document().unwrap(), Some(2));
    assert_eq!(heavy.next_document().unwrap(), None);
}
