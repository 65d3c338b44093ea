// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The graph façade: node interning, active pointers, and the write paths.
//!
//! [`CalcGraph`] owns every layer, overlay, node, and object table entry, and dispatches each
//! user operation to the right subsystem. Nodes live in one graph-wide slab indexed by
//! [`NodeId`]; each layer keeps a key table pointing into that slab, so dependency edges can
//! cross layers without ownership cycles.
//!
//! ## Mutation guard
//!
//! There is exactly one "currently evaluating node" slot. While it is occupied, every write
//! operation and every scope transition fails with [`GraphError::EvaluationActive`] before any
//! state is touched — this is the sole concurrency discipline of the single-threaded model.

use alloc::vec;
use alloc::vec::Vec;

use log::trace;

use calc_value::{ObjId, Value};

use crate::bind::Class;
use crate::descriptor::MethodRef;
use crate::error::GraphError;
use crate::eval::CalcContext;
use crate::invalidate::{self, InvalidateScratch};
use crate::key::{LayerId, NodeId, NodeKey, OverlayId};
use crate::layer::Layer;
use crate::node::{Node, NodeFlags};
use crate::overlay::Overlay;

/// An incremental, demand-driven calculation graph.
///
/// The graph memoizes every `(object, method, args)` computation as a node, records
/// dependency edges as a side effect of reads, and propagates invalidation through those
/// edges on writes. Layers and overlays let callers evaluate under scoped perturbations; see
/// the crate docs for the full model.
#[derive(Debug)]
pub struct CalcGraph {
    pub(crate) objects: Vec<&'static Class>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) layers: Vec<Layer>,
    pub(crate) overlays: Vec<Overlay>,
    pub(crate) active_layer: LayerId,
    pub(crate) active_overlay: Option<OverlayId>,
    pub(crate) active_node: Option<NodeId>,
    pub(crate) scratch: InvalidateScratch,
}

impl Default for CalcGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl CalcGraph {
    /// Creates an empty graph with a root layer.
    #[must_use]
    pub fn new() -> Self {
        let layers = vec![Layer::new(None)];
        Self {
            objects: Vec::new(),
            nodes: Vec::new(),
            layers,
            overlays: Vec::new(),
            active_layer: LayerId::ROOT,
            active_overlay: None,
            active_node: None,
            scratch: InvalidateScratch::default(),
        }
    }

    /// Returns `true` if the graph is currently computing a value.
    ///
    /// While computing, no graph modifications (sets, overlays, scope transitions) are
    /// accepted.
    #[must_use]
    #[inline]
    pub fn is_computing(&self) -> bool {
        self.active_node.is_some()
    }

    /// The layer lookups and writes currently resolve against.
    #[must_use]
    #[inline]
    pub fn active_layer(&self) -> LayerId {
        self.active_layer
    }

    /// The overlay that receives `overlay_value` bindings, if a scope is active.
    #[must_use]
    #[inline]
    pub fn active_overlay(&self) -> Option<OverlayId> {
        self.active_overlay
    }

    #[inline]
    pub(crate) fn ensure_idle(&self) -> Result<(), GraphError> {
        if self.is_computing() {
            return Err(GraphError::EvaluationActive);
        }
        Ok(())
    }

    // ---- slab access ------------------------------------------------------

    pub(crate) fn node_ref(&self, node: NodeId) -> Result<&Node, GraphError> {
        node.index()
            .and_then(|i| self.nodes.get(i))
            .ok_or(GraphError::BadHandle)
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> Result<&mut Node, GraphError> {
        node.index()
            .and_then(|i| self.nodes.get_mut(i))
            .ok_or(GraphError::BadHandle)
    }

    pub(crate) fn layer_ref(&self, layer: LayerId) -> Result<&Layer, GraphError> {
        self.layers.get(layer.index()).ok_or(GraphError::BadHandle)
    }

    pub(crate) fn layer_mut(&mut self, layer: LayerId) -> Result<&mut Layer, GraphError> {
        self.layers
            .get_mut(layer.index())
            .ok_or(GraphError::BadHandle)
    }

    pub(crate) fn overlay_ref(&self, overlay: OverlayId) -> Result<&Overlay, GraphError> {
        self.overlays
            .get(overlay.index())
            .ok_or(GraphError::BadHandle)
    }

    pub(crate) fn overlay_mut(&mut self, overlay: OverlayId) -> Result<&mut Overlay, GraphError> {
        self.overlays
            .get_mut(overlay.index())
            .ok_or(GraphError::BadHandle)
    }

    // ---- interning --------------------------------------------------------

    /// Returns the node for `(owner, method, args)` as resolved by the active layer chain.
    ///
    /// The walk starts at the active layer and follows parent links; the first layer owning a
    /// node for the key wins. With `create`, a missing node is created in the *active* layer
    /// (the originating layer, never an ancestor) and `Some` is guaranteed.
    pub fn lookup_node(
        &mut self,
        owner: ObjId,
        method: impl Into<MethodRef>,
        args: &[Value],
        create: bool,
    ) -> Result<Option<NodeId>, GraphError> {
        let method = method.into();
        self.ensure_member(owner, method)?;
        let key = NodeKey::new(owner, method, args);
        if let Some(found) = self.find_in_chain(self.active_layer, &key)? {
            return Ok(Some(found));
        }
        if !create {
            return Ok(None);
        }
        Ok(Some(self.intern_node(self.active_layer, key)))
    }

    /// Explicitly creates the node for `(owner, method, args)` in the active layer.
    ///
    /// Unlike [`lookup_node`](Self::lookup_node), this fails with
    /// [`GraphError::DuplicateNode`] when the active layer itself already owns a node for the
    /// key. Ancestor layers are not consulted.
    pub fn create_node(
        &mut self,
        owner: ObjId,
        method: impl Into<MethodRef>,
        args: &[Value],
    ) -> Result<NodeId, GraphError> {
        let method = method.into();
        self.ensure_member(owner, method)?;
        let key = NodeKey::new(owner, method, args);
        if self.layer_ref(self.active_layer)?.nodes.contains_key(&key) {
            return Err(GraphError::DuplicateNode {
                method: method.name(),
            });
        }
        Ok(self.intern_node(self.active_layer, key))
    }

    pub(crate) fn intern_for(
        &mut self,
        owner: ObjId,
        method: MethodRef,
        args: &[Value],
    ) -> Result<NodeId, GraphError> {
        match self.lookup_node(owner, method, args, true)? {
            Some(node) => Ok(node),
            None => Err(GraphError::BadHandle),
        }
    }

    pub(crate) fn find_in_chain(
        &self,
        start: LayerId,
        key: &NodeKey,
    ) -> Result<Option<NodeId>, GraphError> {
        let mut cursor = Some(start);
        while let Some(layer) = cursor {
            let layer = self.layer_ref(layer)?;
            if let Some(&node) = layer.nodes.get(key) {
                return Ok(Some(node));
            }
            cursor = layer.parent;
        }
        Ok(None)
    }

    pub(crate) fn intern_node(&mut self, layer: LayerId, key: NodeKey) -> NodeId {
        let id = NodeId::new(u64::try_from(self.nodes.len()).unwrap_or(u64::MAX));
        trace!(
            "intern node {}: method={} layer={}",
            id.as_u64(),
            key.method().name(),
            layer.as_u32()
        );
        self.nodes.push(Node::new(key.clone(), layer));
        if let Some(l) = self.layers.get_mut(layer.index()) {
            l.nodes.insert(key, id);
        }
        id
    }

    // ---- write resolution -------------------------------------------------

    /// Returns the node an existing write against `node`'s key would land on: the node itself
    /// when the active layer owns it (or is unrelated to it), otherwise the active layer's
    /// fork of the key, if one exists.
    pub(crate) fn resolve_existing(&self, node: NodeId) -> Result<NodeId, GraphError> {
        let n = self.node_ref(node)?;
        if n.layer == self.active_layer || !self.layer_is_ancestor(n.layer, self.active_layer)? {
            return Ok(node);
        }
        let key = n.key.clone();
        Ok(self
            .layer_ref(self.active_layer)?
            .nodes
            .get(&key)
            .copied()
            .unwrap_or(node))
    }

    /// Resolves `node` to the node writes must target, forking into the active layer on the
    /// first mutation of a key owned by an ancestor.
    ///
    /// Forking invalidates the shadowed ancestor's dependents so they rebind to the fork when
    /// recomputed inside this layer.
    pub(crate) fn resolve_for_write(&mut self, node: NodeId) -> Result<NodeId, GraphError> {
        let (node_layer, key) = {
            let n = self.node_ref(node)?;
            (n.layer, n.key.clone())
        };
        if node_layer == self.active_layer {
            return Ok(node);
        }
        if !self.layer_is_ancestor(node_layer, self.active_layer)? {
            // Unrelated layer: write in place.
            return Ok(node);
        }
        if let Some(&fork) = self.layer_ref(self.active_layer)?.nodes.get(&key) {
            return Ok(fork);
        }
        self.invalidate_outputs(node);
        let fork = self.intern_node(self.active_layer, key);
        trace!(
            "forked node {} into layer {} as {}",
            node.as_u64(),
            self.active_layer.as_u32(),
            fork.as_u64()
        );
        Ok(fork)
    }

    pub(crate) fn layer_is_ancestor(
        &self,
        candidate: LayerId,
        of: LayerId,
    ) -> Result<bool, GraphError> {
        let mut cursor = self.layer_ref(of)?.parent;
        while let Some(layer) = cursor {
            if layer == candidate {
                return Ok(true);
            }
            cursor = self.layer_ref(layer)?.parent;
        }
        Ok(false)
    }

    // ---- invalidation -----------------------------------------------------

    pub(crate) fn invalidate_outputs(&mut self, node: NodeId) {
        invalidate::invalidate_outputs(&mut self.nodes, &mut self.scratch, node);
    }

    // ---- write paths ------------------------------------------------------

    /// Sets the value of `node`, or expands through the method's write delegate.
    ///
    /// Without a delegate: the node's dependents are invalidated, the value is stored in the
    /// set slot, and the node becomes fixed until [`clear_set`](Self::clear_set). With a
    /// delegate: the delegate receives `(context, value, args)` and returns the node changes
    /// to apply instead; each change is applied through the direct set path (never expanded
    /// again), and `node` itself is untouched.
    pub fn set_value(&mut self, node: NodeId, value: Value) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let (method, owner, args) = {
            let n = self.node_ref(node)?;
            (n.key.method(), n.key.owner(), n.key.args().to_vec())
        };
        if !method.is_settable() {
            return Err(GraphError::NotPermitted {
                method: method.name(),
            });
        }
        let Some(delegate) = method.descriptor().delegate() else {
            return self.apply_direct_set(node, value);
        };

        let changes = {
            let mut ctx = CalcContext::new(&mut *self, owner);
            delegate(&mut ctx, &value, &args)?
        };
        // Validate the whole expansion before mutating anything.
        for change in &changes {
            self.ensure_member(change.owner, change.method)?;
            if !change.method.is_settable() {
                return Err(GraphError::NotPermitted {
                    method: change.method.name(),
                });
            }
        }
        for change in changes {
            let target = self.intern_for(change.owner, change.method, &change.args)?;
            self.apply_direct_set(target, change.value)?;
        }
        Ok(())
    }

    fn apply_direct_set(&mut self, node: NodeId, value: Value) -> Result<(), GraphError> {
        let node = self.resolve_for_write(node)?;
        self.invalidate_outputs(node);
        let n = self.node_mut(node)?;
        trace!("set node {}: method={}", node.as_u64(), n.key.method().name());
        n.store_set(value);
        Ok(())
    }

    /// Clears a previously set value, invalidating dependents. No-op when the node is not
    /// set.
    ///
    /// The still-valid calced value (if any) is revealed without recomputation; only the
    /// node's dependents are invalidated.
    pub fn clear_set(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let method = self.node_ref(node)?.key.method();
        if !method.is_settable() {
            return Err(GraphError::NotPermitted {
                method: method.name(),
            });
        }
        let resolved = self.resolve_existing(node)?;
        if !self.node_ref(resolved)?.is_set() {
            return Ok(());
        }
        let target = self.resolve_for_write(resolved)?;
        if target == resolved {
            self.invalidate_outputs(target);
            self.node_mut(target)?.clear_set();
        }
        // Otherwise the set value lives in an ancestor layer and the fresh fork now masks it:
        // the ancestor's value is untouched, and this layer sees a computed node.
        Ok(())
    }

    /// Sets `(owner, method, args)` to `value`, interning the node first.
    pub fn set(
        &mut self,
        owner: ObjId,
        method: impl Into<MethodRef>,
        args: &[Value],
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let node = self.intern_for(owner, method.into(), args)?;
        self.set_value(node, value.into())
    }

    // ---- introspection ----------------------------------------------------

    /// Number of nodes interned so far, across all layers.
    ///
    /// Node ids are dense: every id below this count resolves.
    #[must_use]
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The status word of `node`.
    pub fn node_flags(&self, node: NodeId) -> Result<NodeFlags, GraphError> {
        Ok(self.node_ref(node)?.flags)
    }

    /// Returns `true` if the node's calced value is current.
    pub fn node_is_valid(&self, node: NodeId) -> Result<bool, GraphError> {
        Ok(self.node_ref(node)?.is_valid())
    }

    /// Returns `true` if the node carries a user-assigned value.
    pub fn node_is_set(&self, node: NodeId) -> Result<bool, GraphError> {
        Ok(self.node_ref(node)?.is_set())
    }

    /// Returns `true` if the node is bound by an active overlay.
    pub fn node_is_overlaid(&self, node: NodeId) -> Result<bool, GraphError> {
        Ok(self.node_ref(node)?.is_overlaid())
    }

    /// Returns `true` if the node is an invalidation frontier (set or overlaid).
    pub fn node_is_fixed(&self, node: NodeId) -> Result<bool, GraphError> {
        Ok(self.node_ref(node)?.is_fixed())
    }

    /// The value identity of `node`.
    pub fn node_key(&self, node: NodeId) -> Result<&NodeKey, GraphError> {
        Ok(&self.node_ref(node)?.key)
    }

    /// The layer that owns `node`.
    pub fn node_layer(&self, node: NodeId) -> Result<LayerId, GraphError> {
        Ok(self.node_ref(node)?.layer)
    }

    /// Number of times the node's underlying function has run to completion.
    pub fn calc_count(&self, node: NodeId) -> Result<u64, GraphError> {
        Ok(self.node_ref(node)?.calc_count)
    }

    /// The nodes `node` read during its most recent evaluation, in id order.
    pub fn node_inputs(
        &self,
        node: NodeId,
    ) -> Result<impl Iterator<Item = NodeId> + '_, GraphError> {
        Ok(self.node_ref(node)?.inputs.iter().copied())
    }

    /// The nodes whose most recent evaluation read `node`, in id order.
    pub fn node_outputs(
        &self,
        node: NodeId,
    ) -> Result<impl Iterator<Item = NodeId> + '_, GraphError> {
        Ok(self.node_ref(node)?.outputs.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::descriptor::{MethodDescriptor, MethodFlags};
    use crate::test_support::{CONSTANT, PLAIN, SPOT, TestClass};

    #[test]
    fn equal_keys_intern_to_the_same_node() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);

        let a = g.lookup_node(obj, &SPOT, &[], true).unwrap().unwrap();
        let b = g.lookup_node(obj, &SPOT, &[], true).unwrap().unwrap();
        assert_eq!(a, b);

        let c = g
            .lookup_node(obj, &SPOT, &[Value::I64(1)], true)
            .unwrap()
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn lookup_without_create_returns_none() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        assert_eq!(g.lookup_node(obj, &SPOT, &[], false).unwrap(), None);
    }

    #[test]
    fn explicit_create_rejects_duplicates() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);

        g.create_node(obj, &SPOT, &[]).unwrap();
        assert_eq!(
            g.create_node(obj, &SPOT, &[]),
            Err(GraphError::DuplicateNode { method: "spot" })
        );
    }

    #[test]
    fn methods_of_other_classes_are_rejected() {
        static STRANGER: MethodDescriptor =
            MethodDescriptor::new("stranger", MethodFlags::NONE, |_ctx, _args| Ok(Value::Unit));

        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        assert_eq!(
            g.lookup_node(obj, &STRANGER, &[], true),
            Err(GraphError::BadHandle)
        );
    }

    #[test]
    fn set_requires_the_settable_capability() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        let node = g.lookup_node(obj, &CONSTANT, &[], true).unwrap().unwrap();

        assert_eq!(
            g.set_value(node, Value::I64(1)),
            Err(GraphError::NotPermitted { method: "constant" })
        );
        assert_eq!(
            g.clear_set(node),
            Err(GraphError::NotPermitted { method: "constant" })
        );
    }

    #[test]
    fn set_then_clear_reveals_the_calced_value_without_recompute() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        let node = g.lookup_node(obj, &PLAIN, &[], true).unwrap().unwrap();

        // PLAIN is settable; compute once, then fix, then clear.
        assert_eq!(g.get_value(node).unwrap(), Value::I64(5));
        assert_eq!(g.calc_count(node).unwrap(), 1);

        g.set_value(node, Value::I64(9)).unwrap();
        assert_eq!(g.get_value(node).unwrap(), Value::I64(9));

        g.clear_set(node).unwrap();
        assert_eq!(g.get_value(node).unwrap(), Value::I64(5));
        assert_eq!(g.calc_count(node).unwrap(), 1);
    }

    #[test]
    fn clear_set_is_a_no_op_when_not_set() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        let node = g.lookup_node(obj, &SPOT, &[], true).unwrap().unwrap();
        g.clear_set(node).unwrap();
        assert!(!g.node_is_set(node).unwrap());
    }

    #[test]
    fn bad_ids_surface_bad_handle() {
        let g = CalcGraph::new();
        assert_eq!(g.node_flags(NodeId::new(999)), Err(GraphError::BadHandle));
        assert_eq!(g.calc_count(NodeId::new(999)), Err(GraphError::BadHandle));
    }
}
