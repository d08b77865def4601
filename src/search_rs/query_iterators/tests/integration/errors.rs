/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Posting-source failures surface unchanged through every operator.

use query_iterators::{DocId, IndexId, NodeId, QueryBuilder, QueryError, TermIterator};
use query_iterators_test_utils::{FailingPostings, VecPostings, collect_documents};
use rstest::rstest;

const TEXT: IndexId = IndexId(0);

fn positions(documents: &[DocId]) -> VecPostings {
    let postings: Vec<(DocId, &[u32])> = documents.iter().map(|&doc| (doc, &[0u32][..])).collect();
    VecPostings::with_positions(TEXT, "t", &postings)
}

#[rstest]
#[case::and(OperatorCase::And)]
#[case::or(OperatorCase::Or)]
#[case::not(OperatorCase::Not)]
#[case::ordered(OperatorCase::Ordered)]
#[case::low_pass(OperatorCase::LowPass)]
fn read_failures_propagate(#[case] case: OperatorCase) {
    let documents: Vec<DocId> = (0..20).collect();
    let mut builder = QueryBuilder::new(20);
    let failing = builder.leaf(TermIterator::new(FailingPostings::new(positions(&documents), 3)));
    let healthy = builder.leaf(positions(&documents).into_iterator());
    let root: NodeId = match case {
        OperatorCase::And => builder.and([failing, healthy]).unwrap(),
        OperatorCase::Or => builder.or([failing, healthy]).unwrap(),
        OperatorCase::Not => {
            let negated = builder.not(failing).unwrap();
            builder.or([negated, healthy]).unwrap()
        }
        OperatorCase::Ordered => builder.ordered_and([healthy, failing]).unwrap(),
        OperatorCase::LowPass => {
            let both = builder.and([failing, healthy]).unwrap();
            builder.low_pass(both, 1).unwrap()
        }
    };
    let mut tree = builder.build(root).unwrap();

    let error = collect_documents(&mut tree).unwrap_err();
    assert!(matches!(error, QueryError::Io(_)), "{error}");
}

#[derive(Debug, Clone, Copy)]
enum OperatorCase {
    And,
    Or,
    Not,
    Ordered,
    LowPass,
}
