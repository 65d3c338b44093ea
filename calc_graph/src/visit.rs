// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Traversal over the dependency graph.
//!
//! [`Walk`] iterates the transitive closure of a node's inputs or outputs breadth-first,
//! yielding each node at most once however many edges lead to it. The walk reflects the edges
//! as most recently recorded; a node that has never been evaluated has no input edges yet,
//! which is the price of discovering dependencies dynamically.

use alloc::collections::{BTreeSet, VecDeque};

use crate::error::GraphError;
use crate::graph::CalcGraph;
use crate::key::NodeId;

/// Which edge direction a [`Walk`] follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WalkDirection {
    /// Follow input edges: everything the start node transitively read.
    Inputs,
    /// Follow output edges: everything that transitively read the start node.
    Outputs,
}

/// Breadth-first iterator over a node's transitive inputs or outputs.
///
/// The start node is yielded first. Iteration order among siblings is the edge sets' id
/// order; callers should not rely on it.
#[derive(Debug)]
pub struct Walk<'g> {
    graph: &'g CalcGraph,
    direction: WalkDirection,
    queue: VecDeque<NodeId>,
    seen: BTreeSet<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        let graph = self.graph;
        if let Ok(n) = graph.node_ref(node) {
            let edges = match self.direction {
                WalkDirection::Inputs => &n.inputs,
                WalkDirection::Outputs => &n.outputs,
            };
            for &next in edges {
                if self.seen.insert(next) {
                    self.queue.push_back(next);
                }
            }
        }
        Some(node)
    }
}

impl CalcGraph {
    /// Walks `start` and its transitive inputs, each node at most once.
    pub fn walk_inputs(&self, start: NodeId) -> Result<Walk<'_>, GraphError> {
        self.walk(start, WalkDirection::Inputs)
    }

    /// Walks `start` and its transitive outputs, each node at most once.
    pub fn walk_outputs(&self, start: NodeId) -> Result<Walk<'_>, GraphError> {
        self.walk(start, WalkDirection::Outputs)
    }

    /// Walks `start` in the given direction.
    pub fn walk(&self, start: NodeId, direction: WalkDirection) -> Result<Walk<'_>, GraphError> {
        self.node_ref(start)?;
        let mut queue = VecDeque::new();
        let mut seen = BTreeSet::new();
        queue.push_back(start);
        seen.insert(start);
        Ok(Walk {
            graph: self,
            direction,
            queue,
            seen,
        })
    }
}
