// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation propagation.
//!
//! Invalidation is an eager walk over output edges: every transitively dependent node that is
//! currently valid loses its calced value. Nodes that are set or overlaid act as frontiers —
//! their value does not derive from their inputs, so the walk stops there and everything
//! downstream of them stays valid.
//!
//! The walk visits each node at most once per call: only nodes observed valid are pushed, and
//! a node is cleared before its outputs are expanded, so it can never be pushed twice with any
//! effect.

use alloc::vec::Vec;

use log::debug;

use crate::key::NodeId;
use crate::node::Node;

/// Reusable traversal buffer, kept on the graph so repeated invalidations are allocation-free
/// once warm.
#[derive(Debug, Default)]
pub(crate) struct InvalidateScratch {
    stack: Vec<NodeId>,
}

/// Invalidates every transitive dependent of `start`, stopping at fixed nodes.
///
/// `start` itself is untouched: the node whose value is changing carries its new state; only
/// its downstream dependents lose their calced values.
pub(crate) fn invalidate_outputs(nodes: &mut [Node], scratch: &mut InvalidateScratch, start: NodeId) {
    scratch.stack.clear();

    let Some(index) = start.index() else {
        return;
    };
    let Some(node) = nodes.get(index) else {
        return;
    };
    scratch.stack.extend(node.outputs.iter().copied());

    let mut cleared = 0_usize;
    while let Some(next) = scratch.stack.pop() {
        let Some(index) = next.index() else {
            continue;
        };
        let Some(node) = nodes.get_mut(index) else {
            continue;
        };
        // Fixed nodes are frontiers; invalid nodes have already been drained on a prior pass.
        if node.is_fixed() || !node.is_valid() {
            continue;
        }
        node.invalidate_calc();
        cleared += 1;
        scratch.stack.extend(node.outputs.iter().copied());
    }

    if cleared > 0 {
        debug!(
            "invalidated {cleared} dependent(s) of node {}",
            start.as_u64()
        );
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::descriptor::{MethodDescriptor, MethodFlags, MethodRef};
    use crate::key::{LayerId, NodeKey};
    use crate::{CalcContext, GraphError};
    use calc_value::{ObjId, Value};

    fn nil(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::Unit)
    }

    static M: MethodDescriptor = MethodDescriptor::new("m", MethodFlags::NONE, nil);

    /// Builds a slab of `count` valid nodes with no edges.
    fn slab(count: u64) -> Vec<Node> {
        (0..count)
            .map(|i| {
                let mut n = Node::new(
                    NodeKey::new(ObjId(0), MethodRef::from(&M), &[Value::I64(i as i64)]),
                    LayerId::ROOT,
                );
                n.store_calced(Value::I64(i as i64));
                n
            })
            .collect()
    }

    fn link(nodes: &mut [Node], from: u64, to: u64) {
        nodes[to as usize].add_input(NodeId::new(from));
        nodes[from as usize].add_output(NodeId::new(to));
    }

    #[test]
    fn invalidation_reaches_transitive_dependents() {
        let mut nodes = slab(3);
        link(&mut nodes, 0, 1);
        link(&mut nodes, 1, 2);

        let mut scratch = InvalidateScratch::default();
        invalidate_outputs(&mut nodes, &mut scratch, NodeId::new(0));

        assert!(nodes[0].is_valid());
        assert!(!nodes[1].is_valid());
        assert!(!nodes[2].is_valid());
        assert_eq!(nodes[1].calced, None);
    }

    #[test]
    fn fixed_nodes_are_frontiers() {
        let mut nodes = slab(3);
        link(&mut nodes, 0, 1);
        link(&mut nodes, 1, 2);
        nodes[1].store_set(Value::I64(9));

        let mut scratch = InvalidateScratch::default();
        invalidate_outputs(&mut nodes, &mut scratch, NodeId::new(0));

        // The set node keeps its calced value, and propagation stops behind it.
        assert!(nodes[1].is_valid());
        assert!(nodes[2].is_valid());
    }

    #[test]
    fn diamond_visits_each_node_once() {
        // 0 -> {1, 2} -> 3
        let mut nodes = slab(4);
        link(&mut nodes, 0, 1);
        link(&mut nodes, 0, 2);
        link(&mut nodes, 1, 3);
        link(&mut nodes, 2, 3);

        let mut scratch = InvalidateScratch::default();
        invalidate_outputs(&mut nodes, &mut scratch, NodeId::new(0));

        assert!(!nodes[1].is_valid());
        assert!(!nodes[2].is_valid());
        assert!(!nodes[3].is_valid());
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut nodes = slab(1);
        nodes[0].add_output(NodeId::new(99));

        let mut scratch = InvalidateScratch::default();
        invalidate_outputs(&mut nodes, &mut scratch, NodeId::new(0));
        invalidate_outputs(&mut nodes, &mut scratch, NodeId::new(42));

        assert!(nodes[0].is_valid());
    }
}
