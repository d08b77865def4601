/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The arena-backed query tree.
//!
//! Nodes live in a flat vector and refer to their operands by [`NodeId`]. Operands
//! are always created before the operator that uses them, so every child sits at a
//! smaller offset than its parent. Dispatching to a node therefore splits the arena
//! at the node's offset: the node gets mutable access to the prefix holding its
//! whole subtree, and nothing else.

use std::fmt;
use std::ops::ControlFlow;

use smallvec::SmallVec;

use crate::align::Align;
use crate::and::And;
use crate::consecutive::Consecutive;
use crate::containment::Containment;
use crate::difference::Difference;
use crate::low_pass::LowPass;
use crate::not::Not;
use crate::or::Or;
use crate::ordered_and::OrderedAnd;
use crate::remapping::Remapping;
use crate::{
    DocId, DocumentIterator, DocumentIteratorVisitor, DocumentState, IndexId, IndexSet, Interval,
    IntervalState, LeafInfo, QueryError, Traversal, UnconditionalSkip,
};

/// Handle on a node of a [`QueryBuilder`](crate::QueryBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The operator a node applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Leaf,
    And,
    Or,
    Not,
    OrderedAnd,
    Consecutive,
    Containment,
    Difference,
    Align,
    LowPass,
    Remapping,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Leaf => "LEAF",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::OrderedAnd => "ORDERED_AND",
            Self::Consecutive => "CONSECUTIVE",
            Self::Containment => "CONTAINMENT",
            Self::Difference => "DIFFERENCE",
            Self::Align => "ALIGN",
            Self::LowPass => "LOW_PASS",
            Self::Remapping => "REMAPPING",
        })
    }
}

/// The behaviour every node provides, given access to the nodes below it.
pub(crate) trait Operator {
    fn kind(&self) -> OperatorKind;

    /// Operands, in query order.
    fn children(&self) -> &[NodeId];

    fn state(&self) -> DocumentState;

    fn indices(&self) -> &IndexSet;

    fn next_document(&mut self, below: &mut Children<'_>) -> Result<Option<DocId>, QueryError>;

    fn skip_to(
        &mut self,
        below: &mut Children<'_>,
        target: DocId,
    ) -> Result<Option<DocId>, QueryError>;

    fn skip_unconditionally_to(
        &mut self,
        below: &mut Children<'_>,
        target: DocId,
    ) -> Result<UnconditionalSkip, QueryError> {
        Ok(match self.skip_to(below, target)? {
            Some(doc) => UnconditionalSkip::Accepted(doc),
            None => UnconditionalSkip::Exhausted,
        })
    }

    fn is_payload_filtered(&self) -> bool {
        false
    }

    fn may_have_next(&self, _below: ChildView<'_>) -> bool {
        !self.state().is_exhausted()
    }

    fn frequency(&self) -> Option<u64> {
        None
    }

    fn intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError>;

    fn reset_intervals(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError>;

    fn next_interval(
        &mut self,
        below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError>;

    fn extent(&self, below: ChildView<'_>, index: IndexId) -> u32;

    /// Operands positioned on the current document that witness the match.
    fn true_path_children(
        &mut self,
        _below: &mut Children<'_>,
    ) -> Result<SmallVec<[NodeId; 4]>, QueryError> {
        Ok(self.children().into())
    }

    fn dispose(&mut self, below: &mut Children<'_>) -> Result<(), QueryError> {
        for &child in self.children() {
            below.dispose(child)?;
        }
        Ok(())
    }
}

/// A node wrapping an external [`DocumentIterator`].
pub(crate) struct Leaf {
    pub(crate) iterator: Box<dyn DocumentIterator>,
}

impl Operator for Leaf {
    fn kind(&self) -> OperatorKind {
        OperatorKind::Leaf
    }

    fn children(&self) -> &[NodeId] {
        &[]
    }

    fn state(&self) -> DocumentState {
        self.iterator.state()
    }

    fn indices(&self) -> &IndexSet {
        self.iterator.indices()
    }

    fn next_document(&mut self, _below: &mut Children<'_>) -> Result<Option<DocId>, QueryError> {
        self.iterator.next_document()
    }

    fn skip_to(
        &mut self,
        _below: &mut Children<'_>,
        target: DocId,
    ) -> Result<Option<DocId>, QueryError> {
        self.iterator.skip_to(target)
    }

    fn skip_unconditionally_to(
        &mut self,
        _below: &mut Children<'_>,
        target: DocId,
    ) -> Result<UnconditionalSkip, QueryError> {
        self.iterator.skip_unconditionally_to(target)
    }

    fn is_payload_filtered(&self) -> bool {
        self.iterator.is_payload_filtered()
    }

    fn may_have_next(&self, _below: ChildView<'_>) -> bool {
        self.iterator.may_have_next()
    }

    fn frequency(&self) -> Option<u64> {
        self.iterator.frequency()
    }

    fn intervals(
        &mut self,
        _below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.iterator.intervals(index)
    }

    fn reset_intervals(
        &mut self,
        _below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        self.iterator.reset_intervals(index)
    }

    fn next_interval(
        &mut self,
        _below: &mut Children<'_>,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        self.iterator.next_interval(index)
    }

    fn extent(&self, _below: ChildView<'_>, index: IndexId) -> u32 {
        self.iterator.extent(index)
    }

    fn dispose(&mut self, _below: &mut Children<'_>) -> Result<(), QueryError> {
        self.iterator.dispose()
    }
}

pub(crate) enum Node {
    Leaf(Leaf),
    And(And),
    Or(Or),
    Not(Not),
    OrderedAnd(OrderedAnd),
    Consecutive(Consecutive),
    Containment(Containment),
    Difference(Difference),
    Align(Align),
    LowPass(LowPass),
    Remapping(Remapping),
}

impl Node {
    pub(crate) fn operator(&self) -> &dyn Operator {
        match self {
            Self::Leaf(op) => op,
            Self::And(op) => op,
            Self::Or(op) => op,
            Self::Not(op) => op,
            Self::OrderedAnd(op) => op,
            Self::Consecutive(op) => op,
            Self::Containment(op) => op,
            Self::Difference(op) => op,
            Self::Align(op) => op,
            Self::LowPass(op) => op,
            Self::Remapping(op) => op,
        }
    }

    pub(crate) fn operator_mut(&mut self) -> &mut dyn Operator {
        match self {
            Self::Leaf(op) => op,
            Self::And(op) => op,
            Self::Or(op) => op,
            Self::Not(op) => op,
            Self::OrderedAnd(op) => op,
            Self::Consecutive(op) => op,
            Self::Containment(op) => op,
            Self::Difference(op) => op,
            Self::Align(op) => op,
            Self::LowPass(op) => op,
            Self::Remapping(op) => op,
        }
    }
}

/// Mutable access to the nodes below an operator.
pub(crate) struct Children<'a> {
    nodes: &'a mut [Node],
}

impl<'a> Children<'a> {
    pub(crate) fn new(nodes: &'a mut [Node]) -> Self {
        Self { nodes }
    }

    fn split(&mut self, id: NodeId) -> (&mut dyn Operator, Children<'_>) {
        let (below, rest) = self.nodes.split_at_mut(id.0);
        (rest[0].operator_mut(), Children { nodes: below })
    }

    pub(crate) fn next_document(&mut self, id: NodeId) -> Result<Option<DocId>, QueryError> {
        let (node, mut below) = self.split(id);
        node.next_document(&mut below)
    }

    pub(crate) fn skip_to(&mut self, id: NodeId, target: DocId) -> Result<Option<DocId>, QueryError> {
        let (node, mut below) = self.split(id);
        node.skip_to(&mut below, target)
    }

    pub(crate) fn skip_unconditionally_to(
        &mut self,
        id: NodeId,
        target: DocId,
    ) -> Result<UnconditionalSkip, QueryError> {
        let (node, mut below) = self.split(id);
        node.skip_unconditionally_to(&mut below, target)
    }

    pub(crate) fn intervals(
        &mut self,
        id: NodeId,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        let (node, mut below) = self.split(id);
        node.intervals(&mut below, index)
    }

    pub(crate) fn reset_intervals(
        &mut self,
        id: NodeId,
        index: IndexId,
    ) -> Result<IntervalState, QueryError> {
        let (node, mut below) = self.split(id);
        node.reset_intervals(&mut below, index)
    }

    pub(crate) fn next_interval(
        &mut self,
        id: NodeId,
        index: IndexId,
    ) -> Result<Option<Interval>, QueryError> {
        let (node, mut below) = self.split(id);
        node.next_interval(&mut below, index)
    }

    pub(crate) fn dispose(&mut self, id: NodeId) -> Result<(), QueryError> {
        let (node, mut below) = self.split(id);
        node.dispose(&mut below)
    }
}

/// Shared access to the nodes below an operator.
#[derive(Clone, Copy)]
pub(crate) struct ChildView<'a> {
    nodes: &'a [Node],
}

impl<'a> ChildView<'a> {
    pub(crate) fn new(nodes: &'a [Node]) -> Self {
        Self { nodes }
    }

    fn split(self, id: NodeId) -> (&'a dyn Operator, ChildView<'a>) {
        let (below, rest) = self.nodes.split_at(id.0);
        (rest[0].operator(), ChildView { nodes: below })
    }

    pub(crate) fn may_have_next(self, id: NodeId) -> bool {
        let (node, below) = self.split(id);
        node.may_have_next(below)
    }

    pub(crate) fn frequency(self, id: NodeId) -> Option<u64> {
        self.split(id).0.frequency()
    }

    pub(crate) fn is_payload_filtered(self, id: NodeId) -> bool {
        self.split(id).0.is_payload_filtered()
    }

    pub(crate) fn indices(self, id: NodeId) -> &'a IndexSet {
        self.split(id).0.indices()
    }

    pub(crate) fn extent(self, id: NodeId, index: IndexId) -> u32 {
        let (node, below) = self.split(id);
        node.extent(below, index)
    }
}

/// A built query: an arena of nodes evaluated from its root.
pub struct QueryTree {
    nodes: Vec<Node>,
    weights: Vec<f64>,
    root: NodeId,
}

impl QueryTree {
    pub(crate) fn new(nodes: Vec<Node>, weights: Vec<f64>, root: NodeId) -> Self {
        debug_assert_eq!(root.0 + 1, nodes.len());
        Self {
            nodes,
            weights,
            root,
        }
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The operator applied at the root.
    pub fn root_kind(&self) -> OperatorKind {
        self.root_view().0.kind()
    }

    fn root_view(&self) -> (&dyn Operator, ChildView<'_>) {
        let (below, rest) = self.nodes.split_at(self.root.0);
        (rest[0].operator(), ChildView::new(below))
    }

    fn root_mut(&mut self) -> (&mut dyn Operator, Children<'_>) {
        let (below, rest) = self.nodes.split_at_mut(self.root.0);
        (rest[0].operator_mut(), Children::new(below))
    }
}

impl fmt::Debug for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTree")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root_kind())
            .finish()
    }
}

impl DocumentIterator for QueryTree {
    fn state(&self) -> DocumentState {
        self.root_view().0.state()
    }

    fn next_document(&mut self) -> Result<Option<DocId>, QueryError> {
        let (root, mut below) = self.root_mut();
        root.next_document(&mut below)
    }

    fn skip_to(&mut self, target: DocId) -> Result<Option<DocId>, QueryError> {
        let (root, mut below) = self.root_mut();
        root.skip_to(&mut below, target)
    }

    fn skip_unconditionally_to(&mut self, target: DocId) -> Result<UnconditionalSkip, QueryError> {
        let (root, mut below) = self.root_mut();
        root.skip_unconditionally_to(&mut below, target)
    }

    fn is_payload_filtered(&self) -> bool {
        self.root_view().0.is_payload_filtered()
    }

    fn may_have_next(&self) -> bool {
        let (root, below) = self.root_view();
        root.may_have_next(below)
    }

    fn frequency(&self) -> Option<u64> {
        self.root_view().0.frequency()
    }

    fn indices(&self) -> &IndexSet {
        self.root_view().0.indices()
    }

    fn weight(&self) -> f64 {
        let scale = match &self.nodes[self.root.0] {
            Node::Leaf(leaf) => leaf.iterator.weight(),
            _ => 1.0,
        };
        self.weights[self.root.0] * scale
    }

    fn intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        let (root, mut below) = self.root_mut();
        root.intervals(&mut below, index)
    }

    fn reset_intervals(&mut self, index: IndexId) -> Result<IntervalState, QueryError> {
        let (root, mut below) = self.root_mut();
        root.reset_intervals(&mut below, index)
    }

    fn next_interval(&mut self, index: IndexId) -> Result<Option<Interval>, QueryError> {
        let (root, mut below) = self.root_mut();
        root.next_interval(&mut below, index)
    }

    fn extent(&self, index: IndexId) -> u32 {
        let (root, below) = self.root_view();
        root.extent(below, index)
    }

    fn accept(
        &mut self,
        visitor: &mut dyn DocumentIteratorVisitor,
        traversal: Traversal,
    ) -> Result<ControlFlow<()>, QueryError> {
        traverse(&mut self.nodes, &self.weights, self.root, visitor, traversal)
    }

    fn dispose(&mut self) -> Result<(), QueryError> {
        let (root, mut below) = self.root_mut();
        root.dispose(&mut below)
    }
}

/// Depth-first walk of the subtree rooted at `id`.
///
/// With [`Traversal::TruePaths`] the walk only enters operands that witness the
/// match on the current document.
fn traverse(
    nodes: &mut [Node],
    weights: &[f64],
    id: NodeId,
    visitor: &mut dyn DocumentIteratorVisitor,
    traversal: Traversal,
) -> Result<ControlFlow<()>, QueryError> {
    let (below, rest) = nodes.split_at_mut(id.0);
    let weight = weights[id.0];
    let operator = match &mut rest[0] {
        Node::Leaf(leaf) => {
            let mut scaled = ScaledWeights {
                inner: visitor,
                factor: weight,
            };
            return leaf.iterator.accept(&mut scaled, traversal);
        }
        node => node.operator_mut(),
    };

    let kind = operator.kind();
    if visitor.visit_pre(kind, weight).is_break() {
        return Ok(ControlFlow::Break(()));
    }
    let children = match traversal {
        Traversal::All => SmallVec::from(operator.children()),
        Traversal::TruePaths => operator.true_path_children(&mut Children::new(&mut *below))?,
    };
    for child in children {
        if traverse(below, weights, child, visitor, traversal)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
    Ok(visitor.visit_post(kind))
}

/// Applies the weight a builder gave a leaf node on top of the leaf's own.
struct ScaledWeights<'v> {
    inner: &'v mut dyn DocumentIteratorVisitor,
    factor: f64,
}

impl DocumentIteratorVisitor for ScaledWeights<'_> {
    fn visit_pre(&mut self, kind: OperatorKind, weight: f64) -> ControlFlow<()> {
        self.inner.visit_pre(kind, weight)
    }

    fn visit_leaf(&mut self, leaf: &LeafInfo<'_>) -> ControlFlow<()> {
        let scaled = LeafInfo {
            weight: leaf.weight * self.factor,
            ..leaf.clone()
        };
        self.inner.visit_leaf(&scaled)
    }

    fn visit_post(&mut self, kind: OperatorKind) -> ControlFlow<()> {
        self.inner.visit_post(kind)
    }
}
