// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node runtime state.
//!
//! A node is the memoization cell for one `(owner, method, args)` key: the last known value in
//! each of its three slots, a status word, and the dependency edges discovered during its most
//! recent evaluation. Edges are stored as plain id sets in both directions; reciprocal
//! maintenance across two nodes happens at the graph level, where both ends are reachable.

use alloc::collections::BTreeSet;

use calc_value::Value;

use crate::key::{LayerId, NodeId, NodeKey};

/// Status word for a node.
///
/// The bits are independent: a node can be set and overlaid at the same time, with each state
/// keeping its own value slot. The effective value is resolved by precedence — overlaid, then
/// set, then the valid calced value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NodeFlags(u8);

impl NodeFlags {
    /// No status bits; the node has never produced a value (or was invalidated).
    pub const INVALID: Self = Self(0);
    /// The calced value is current with respect to the node's inputs.
    pub const VALID: Self = Self(1 << 0);
    /// The value was directly assigned by the user.
    pub const SET: Self = Self(1 << 1);
    /// The value was bound by an active overlay.
    pub const OVERLAID: Self = Self(1 << 2);

    /// Returns `true` if this word contains every bit in `other`.
    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub(crate) const fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub(crate) const fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// Runtime state of one memoized computation.
#[derive(Debug)]
pub(crate) struct Node {
    /// Value identity; immutable for the node's lifetime.
    pub(crate) key: NodeKey,
    /// The layer that owns this node.
    pub(crate) layer: LayerId,
    pub(crate) flags: NodeFlags,
    /// Last computed value; meaningful only while `VALID` is set.
    pub(crate) calced: Option<Value>,
    /// Directly assigned value; meaningful only while `SET` is set.
    pub(crate) set: Option<Value>,
    /// Overlay-bound value; meaningful only while `OVERLAID` is set.
    pub(crate) overlaid: Option<Value>,
    /// Nodes this node read during its most recent evaluation.
    pub(crate) inputs: BTreeSet<NodeId>,
    /// Nodes whose most recent evaluation read this one.
    pub(crate) outputs: BTreeSet<NodeId>,
    /// Number of times the underlying function has run to completion.
    pub(crate) calc_count: u64,
}

impl Node {
    pub(crate) fn new(key: NodeKey, layer: LayerId) -> Self {
        Self {
            key,
            layer,
            flags: NodeFlags::INVALID,
            calced: None,
            set: None,
            overlaid: None,
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            calc_count: 0,
        }
    }

    #[inline]
    pub(crate) fn is_valid(&self) -> bool {
        self.flags.contains(NodeFlags::VALID)
    }

    #[inline]
    pub(crate) fn is_set(&self) -> bool {
        self.flags.contains(NodeFlags::SET)
    }

    #[inline]
    pub(crate) fn is_overlaid(&self) -> bool {
        self.flags.contains(NodeFlags::OVERLAID)
    }

    /// A fixed node is an invalidation frontier: its value does not depend on its inputs.
    #[inline]
    pub(crate) fn is_fixed(&self) -> bool {
        self.is_set() || self.is_overlaid()
    }

    /// Resolves the effective value by precedence: overlaid, then set, then valid calced.
    ///
    /// Returns `None` when the node must be recomputed.
    pub(crate) fn cached(&self) -> Option<&Value> {
        if self.is_overlaid() {
            return self.overlaid.as_ref();
        }
        if self.is_set() {
            return self.set.as_ref();
        }
        if self.is_valid() {
            return self.calced.as_ref();
        }
        None
    }

    /// Drops the calced value and clears `VALID`. Set and overlaid state is untouched.
    #[inline]
    pub(crate) fn invalidate_calc(&mut self) {
        self.flags.remove(NodeFlags::VALID);
        self.calced = None;
    }

    pub(crate) fn store_calced(&mut self, value: Value) {
        self.calced = Some(value);
        self.flags.insert(NodeFlags::VALID);
        self.calc_count = self.calc_count.saturating_add(1);
    }

    pub(crate) fn store_set(&mut self, value: Value) {
        self.set = Some(value);
        self.flags.insert(NodeFlags::SET);
    }

    pub(crate) fn clear_set(&mut self) {
        self.set = None;
        self.flags.remove(NodeFlags::SET);
    }

    pub(crate) fn store_overlaid(&mut self, value: Value) {
        self.overlaid = Some(value);
        self.flags.insert(NodeFlags::OVERLAID);
    }

    pub(crate) fn clear_overlaid(&mut self) {
        self.overlaid = None;
        self.flags.remove(NodeFlags::OVERLAID);
    }

    /// Records an input dependency. Idempotent.
    #[inline]
    pub(crate) fn add_input(&mut self, input: NodeId) {
        self.inputs.insert(input);
    }

    /// Records a dependent. Idempotent.
    #[inline]
    pub(crate) fn add_output(&mut self, output: NodeId) {
        self.outputs.insert(output);
    }

    /// Forgets an input dependency, if present.
    #[inline]
    pub(crate) fn remove_input(&mut self, input: NodeId) {
        self.inputs.remove(&input);
    }

    /// Forgets a dependent, if present.
    #[inline]
    pub(crate) fn remove_output(&mut self, output: NodeId) {
        self.outputs.remove(&output);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::descriptor::{MethodDescriptor, MethodFlags, MethodRef};
    use crate::{CalcContext, GraphError};
    use calc_value::ObjId;

    fn nil(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::Unit)
    }

    static M: MethodDescriptor = MethodDescriptor::new("m", MethodFlags::NONE, nil);

    fn node() -> Node {
        Node::new(
            NodeKey::new(ObjId(0), MethodRef::from(&M), &[]),
            LayerId::ROOT,
        )
    }

    #[test]
    fn effective_value_follows_precedence() {
        let mut n = node();
        assert_eq!(n.cached(), None);

        n.store_calced(Value::I64(1));
        assert_eq!(n.cached(), Some(&Value::I64(1)));

        n.store_set(Value::I64(2));
        assert_eq!(n.cached(), Some(&Value::I64(2)));

        n.store_overlaid(Value::I64(3));
        assert_eq!(n.cached(), Some(&Value::I64(3)));

        // Clearing the overlay reveals the set value without recomputation.
        n.clear_overlaid();
        assert_eq!(n.cached(), Some(&Value::I64(2)));

        // Clearing the set value reveals the still-valid calced value.
        n.clear_set();
        assert_eq!(n.cached(), Some(&Value::I64(1)));
        assert!(n.is_valid());
    }

    #[test]
    fn invalidate_calc_leaves_fixed_state_alone() {
        let mut n = node();
        n.store_calced(Value::I64(1));
        n.store_set(Value::I64(2));
        n.invalidate_calc();

        assert!(!n.is_valid());
        assert!(n.is_set());
        assert!(n.is_fixed());
        assert_eq!(n.cached(), Some(&Value::I64(2)));
    }

    #[test]
    fn edge_mutations_are_idempotent() {
        let mut n = node();
        let other = NodeId::new(7);

        n.add_input(other);
        n.add_input(other);
        assert_eq!(n.inputs.len(), 1);

        n.add_output(other);
        n.add_output(other);
        assert_eq!(n.outputs.len(), 1);

        n.remove_input(other);
        n.remove_input(other);
        assert!(n.inputs.is_empty());

        n.remove_output(other);
        assert!(n.outputs.is_empty());
    }

    #[test]
    fn calc_count_tracks_completed_runs() {
        let mut n = node();
        assert_eq!(n.calc_count, 0);
        n.store_calced(Value::I64(1));
        n.store_calced(Value::I64(2));
        assert_eq!(n.calc_count, 2);
    }
}
