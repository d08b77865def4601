/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Assembly of query trees.
//!
//! Nodes are added bottom-up: every operator takes [`NodeId`]s handed out by
//! earlier calls, so a node is always created after its operands. Structural
//! problems (unknown or shared operands, operators that need a single index, bad
//! gap arrays) are reported when the operator is added; [`QueryBuilder::build`]
//! finally checks that every node hangs below the chosen root.

use tracing::debug;

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
use crate::tree::{ChildView, Leaf, Node, NodeId, OperatorKind, QueryTree};
use crate::{DocumentIterator, FalseIterator, IndexId, QueryError, TrueIterator};

/// Incremental builder of a [`QueryTree`].
///
/// ```
/// use query_iterators::{DocumentIterator, IndexId, MemoryIndex, QueryBuilder};
///
/// let index = MemoryIndex::from_documents(IndexId(0), "text", ["a b c", "b c", "c a b"]);
/// let mut builder = QueryBuilder::new(index.number_of_documents());
/// let a = builder.leaf(index.documents("a"));
/// let b = builder.leaf(index.documents("b"));
/// let phrase = builder.consecutive([a, b]).unwrap();
/// let mut tree = builder.build(phrase).unwrap();
///
/// assert_eq!(tree.next_document().unwrap(), Some(0));
/// assert_eq!(tree.next_document().unwrap(), Some(2));
/// assert_eq!(tree.next_document().unwrap(), None);
/// ```
pub struct QueryBuilder {
    nodes: Vec<Node>,
    weights: Vec<f64>,
    has_parent: Vec<bool>,
    number_of_documents: u64,
    default_index: Option<IndexId>,
}

impl QueryBuilder {
    /// A builder for queries over a collection of `number_of_documents` documents.
    pub fn new(number_of_documents: u64) -> Self {
        Self {
            nodes: Vec::new(),
            weights: Vec::new(),
            has_parent: Vec::new(),
            number_of_documents,
            default_index: None,
        }
    }

    /// The index that operand-less conjunctions and disjunctions reduce to
    /// `TRUE` or `FALSE` on. Without one, they are an error.
    pub fn with_default_index(mut self, index: IndexId) -> Self {
        self.default_index = Some(index);
        self
    }

    pub fn number_of_documents(&self) -> u64 {
        self.number_of_documents
    }

    /// Number of nodes added so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a leaf evaluating `iterator`.
    pub fn leaf<I>(&mut self, iterator: I) -> NodeId
    where
        I: DocumentIterator + 'static,
    {
        self.push(Node::Leaf(Leaf {
            iterator: Box::new(iterator),
        }))
    }

    /// A leaf matching every document, with `True` intervals on `index`.
    pub fn always_true(&mut self, index: IndexId) -> NodeId {
        let number_of_documents = self.number_of_documents;
        self.leaf(TrueIterator::new(index, number_of_documents))
    }

    /// A leaf matching no document.
    pub fn always_false(&mut self, index: IndexId) -> NodeId {
        self.leaf(FalseIterator::new(index))
    }

    /// Documents matching every operand.
    pub fn and(&mut self, children: impl IntoIterator<Item = NodeId>) -> Result<NodeId, QueryError> {
        let children = self.operands(children)?;
        match children.len() {
            0 => self.empty(OperatorKind::And, true),
            1 => Ok(self.reduced(OperatorKind::And, children[0])),
            _ => {
                let node = And::new(children.clone(), self.view(), self.number_of_documents);
                Ok(self.adopt(&children, Node::And(node)))
            }
        }
    }

    /// Documents matching at least one operand.
    pub fn or(&mut self, children: impl IntoIterator<Item = NodeId>) -> Result<NodeId, QueryError> {
        let children = self.operands(children)?;
        match children.len() {
            0 => self.empty(OperatorKind::Or, false),
            1 => Ok(self.reduced(OperatorKind::Or, children[0])),
            _ => {
                let node = Or::new(children.clone(), self.view());
                Ok(self.adopt(&children, Node::Or(node)))
            }
        }
    }

    /// Documents not matching `child`.
    pub fn not(&mut self, child: NodeId) -> Result<NodeId, QueryError> {
        self.operands([child])?;
        let node = Not::new(child, self.view(), self.number_of_documents);
        Ok(self.adopt(&[child], Node::Not(node)))
    }

    /// Documents where the operands occur in order, on a single index.
    pub fn ordered_and(
        &mut self,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Result<NodeId, QueryError> {
        let children = self.operands(children)?;
        match children.len() {
            0 => Err(QueryError::EmptyOperands {
                operator: OperatorKind::OrderedAnd,
            }),
            1 => Ok(self.reduced(OperatorKind::OrderedAnd, children[0])),
            _ => {
                let node = OrderedAnd::new(
                    children.clone(),
                    Vec::new(),
                    self.view(),
                    self.number_of_documents,
                )?;
                Ok(self.adopt(&children, Node::OrderedAnd(node)))
            }
        }
    }

    /// Documents where the operands occur one right after the other: a phrase.
    pub fn consecutive(
        &mut self,
        children: impl IntoIterator<Item = NodeId>,
    ) -> Result<NodeId, QueryError> {
        let children: Vec<NodeId> = children.into_iter().collect();
        let gaps = vec![0; children.len()];
        self.consecutive_with_gaps(children, gaps)
    }

    /// A phrase in which operand `i` must start `gaps[i] + 1` positions after operand
    /// `i - 1` ends. `gaps[0]` is a margin required before the first operand, and
    /// is included in the resulting intervals.
    pub fn consecutive_with_gaps(
        &mut self,
        children: impl IntoIterator<Item = NodeId>,
        gaps: Vec<u32>,
    ) -> Result<NodeId, QueryError> {
        let children: Vec<NodeId> = children.into_iter().collect();
        if gaps.len() != children.len() {
            return Err(QueryError::GapCountMismatch {
                gaps: gaps.len(),
                operands: children.len(),
            });
        }
        let children = self.operands(children)?;
        match children.len() {
            0 => Err(QueryError::EmptyOperands {
                operator: OperatorKind::Consecutive,
            }),
            1 if gaps[0] == 0 => Ok(self.reduced(OperatorKind::Consecutive, children[0])),
            _ => {
                let node =
                    Consecutive::new(children.clone(), gaps, self.view(), self.number_of_documents)?;
                Ok(self.adopt(&children, Node::Consecutive(node)))
            }
        }
    }

    /// Intervals of `first` that, widened by the margins, contain an interval of
    /// `second`.
    pub fn containment(
        &mut self,
        first: NodeId,
        second: NodeId,
        left_margin: u32,
        right_margin: u32,
    ) -> Result<NodeId, QueryError> {
        self.operands([first, second])?;
        let node = Containment::new(first, second, left_margin, right_margin, self.view())?;
        Ok(self.adopt(&[first, second], Node::Containment(node)))
    }

    /// Intervals of `minuend` that, widened by the margins, contain no interval of
    /// `subtrahend`.
    pub fn difference(
        &mut self,
        minuend: NodeId,
        subtrahend: NodeId,
        left_margin: u32,
        right_margin: u32,
    ) -> Result<NodeId, QueryError> {
        self.operands([minuend, subtrahend])?;
        let node = Difference::new(minuend, subtrahend, left_margin, right_margin, self.view());
        Ok(self.adopt(&[minuend, subtrahend], Node::Difference(node)))
    }

    /// Intervals shared by two operands on different indices.
    pub fn align(&mut self, first: NodeId, second: NodeId) -> Result<NodeId, QueryError> {
        self.operands([first, second])?;
        let node = Align::new(first, second, self.view())?;
        Ok(self.adopt(&[first, second], Node::Align(node)))
    }

    /// Intervals of `child` no longer than `threshold`.
    pub fn low_pass(&mut self, child: NodeId, threshold: u32) -> Result<NodeId, QueryError> {
        self.operands([child])?;
        let node = LowPass::new(child, threshold, self.view());
        Ok(self.adopt(&[child], Node::LowPass(node)))
    }

    /// `child`, with each index `from` of `map` exposed as `to`.
    pub fn remap(
        &mut self,
        child: NodeId,
        map: &[(IndexId, IndexId)],
    ) -> Result<NodeId, QueryError> {
        self.operands([child])?;
        let node = Remapping::new(child, map, self.view())?;
        Ok(self.adopt(&[child], Node::Remapping(node)))
    }

    /// Set the weight scorers see for `node`; nodes start at 1.
    pub fn weight(&mut self, node: NodeId, weight: f64) -> Result<(), QueryError> {
        self.check(node)?;
        self.weights[node.index()] = weight;
        Ok(())
    }

    /// The tree rooted at `root`. Every other node must be an operand of some
    /// operator below `root`.
    pub fn build(self, root: NodeId) -> Result<QueryTree, QueryError> {
        self.check(root)?;
        if let Some(detached) = (0..self.nodes.len())
            .find(|&id| id != root.index() && !self.has_parent[id])
        {
            return Err(QueryError::DetachedNode(NodeId(detached)));
        }
        // Parents come after their operands, so the only node without a parent
        // is the last one added.
        debug!(
            nodes = self.nodes.len(),
            root = %self.nodes[root.index()].operator().kind(),
            "query tree built"
        );
        Ok(QueryTree::new(self.nodes, self.weights, root))
    }

    fn view(&self) -> ChildView<'_> {
        ChildView::new(&self.nodes)
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        let operator = node.operator();
        debug!(
            node = %id,
            kind = %operator.kind(),
            operands = operator.children().len(),
            "query node added"
        );
        self.nodes.push(node);
        self.weights.push(1.0);
        self.has_parent.push(false);
        id
    }

    fn check(&self, node: NodeId) -> Result<(), QueryError> {
        if node.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(QueryError::UnknownNode(node))
        }
    }

    /// Validate `children` as fresh operands. They are only marked as attached once
    /// their parent is built, so a failed construction leaves them free.
    fn operands(&self, children: impl IntoIterator<Item = NodeId>) -> Result<Vec<NodeId>, QueryError> {
        let children: Vec<NodeId> = children.into_iter().collect();
        for (position, &child) in children.iter().enumerate() {
            self.check(child)?;
            if self.has_parent[child.index()] || children[..position].contains(&child) {
                return Err(QueryError::NodeReused(child));
            }
        }
        Ok(children)
    }

    /// Add `node` as the parent of `children`.
    fn adopt(&mut self, children: &[NodeId], node: Node) -> NodeId {
        for &child in children {
            self.has_parent[child.index()] = true;
        }
        self.push(node)
    }

    /// A single operand stands for the operator; it stays detached so that it can be
    /// used again.
    fn reduced(&self, operator: OperatorKind, child: NodeId) -> NodeId {
        debug!(%operator, node = %child, "single operand, operator elided");
        child
    }

    fn empty(&mut self, operator: OperatorKind, matches_all: bool) -> Result<NodeId, QueryError> {
        let index = self
            .default_index
            .ok_or(QueryError::EmptyOperands { operator })?;
        debug!(%operator, %index, matches_all, "no operands, reduced to a constant");
        Ok(if matches_all {
            self.always_true(index)
        } else {
            self.always_false(index)
        })
    }
}
