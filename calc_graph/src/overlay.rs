// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlays: scope-bound node perturbations.
//!
//! An overlay is a keyed bag of `(node → value)` bindings that can be entered against its
//! layer to temporarily force node values, then reverted on exit. The lifecycle has two
//! phases:
//!
//! - **Populating** (first entry): bindings recorded with
//!   [`overlay_value`](CalcGraph::overlay_value) inside the scope persist in the overlay.
//! - **Applying** (every later entry): the recorded bindings are applied on entry, and any
//!   additional bindings made inside the scope go to a transient child overlay, so the
//!   persistent overlay is never mutated after population.
//!
//! Overlays inherit bindings from an optional parent overlay, minus the nodes masked in the
//! child's removed set. When applying a binding to a node that is already overlaid (by an
//! enclosing scope), the displaced value is stashed in the applying overlay and re-applied on
//! exit — this is what makes nested scopes unwind precisely.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

use log::debug;

use calc_value::{ObjId, Value};

use crate::descriptor::MethodRef;
use crate::error::GraphError;
use crate::graph::CalcGraph;
use crate::key::{LayerId, NodeId, OverlayId};

/// A keyed bag of node bindings with scope lifecycle state.
#[derive(Debug)]
pub(crate) struct Overlay {
    /// The layer this overlay was created in; it can only be entered while that layer is
    /// active.
    pub(crate) layer: LayerId,
    /// Overlay to inherit bindings from.
    pub(crate) parent: Option<OverlayId>,
    /// Own bindings, applied in id order.
    pub(crate) bindings: BTreeMap<NodeId, Value>,
    /// Nodes with an inherited binding that is masked here.
    pub(crate) removed: BTreeSet<NodeId>,
    /// Nodes whose binding from this overlay is currently applied.
    pub(crate) applied: BTreeSet<NodeId>,
    /// Prior overlay values displaced by this overlay, restored on exit.
    pub(crate) stash: BTreeMap<NodeId, Value>,
    /// True until the first scope exit.
    pub(crate) populating: bool,
}

impl Overlay {
    pub(crate) fn new(layer: LayerId, parent: Option<OverlayId>) -> Self {
        Self {
            layer,
            parent,
            bindings: BTreeMap::new(),
            removed: BTreeSet::new(),
            applied: BTreeSet::new(),
            stash: BTreeMap::new(),
            populating: true,
        }
    }
}

impl CalcGraph {
    /// Creates an empty overlay in the active layer.
    pub fn create_overlay(&mut self) -> OverlayId {
        let id = OverlayId::new(u32::try_from(self.overlays.len()).unwrap_or(u32::MAX));
        self.overlays.push(Overlay::new(self.active_layer, None));
        id
    }

    /// Creates an overlay inheriting the bindings of `parent` (minus later removals).
    pub fn create_child_overlay(&mut self, parent: OverlayId) -> Result<OverlayId, GraphError> {
        let layer = self.overlay_ref(parent)?.layer;
        let id = OverlayId::new(u32::try_from(self.overlays.len()).unwrap_or(u32::MAX));
        self.overlays.push(Overlay::new(layer, Some(parent)));
        Ok(id)
    }

    /// The layer `overlay` was created in.
    pub fn overlay_layer(&self, overlay: OverlayId) -> Result<LayerId, GraphError> {
        Ok(self.overlay_ref(overlay)?.layer)
    }

    /// Returns `true` while `overlay` has not completed its first scope.
    pub fn overlay_is_populating(&self, overlay: OverlayId) -> Result<bool, GraphError> {
        Ok(self.overlay_ref(overlay)?.populating)
    }

    /// Records a `(node → value)` binding without applying it to the node.
    ///
    /// The binding takes effect on the overlay's next entry. Any prior binding for the node
    /// in this overlay is replaced, and a removal mask for it is lifted.
    pub fn add_binding(
        &mut self,
        overlay: OverlayId,
        node: NodeId,
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let method = self.node_ref(node)?.key.method();
        if !method.is_overlayable() {
            return Err(GraphError::NotPermitted {
                method: method.name(),
            });
        }
        let o = self.overlay_mut(overlay)?;
        o.bindings.insert(node, value.into());
        o.removed.remove(&node);
        Ok(())
    }

    /// Removes a binding from the overlay without unapplying it from the node.
    ///
    /// The node is also masked, so a binding inherited from a parent overlay no longer
    /// reaches it through this overlay.
    pub fn remove_binding(&mut self, overlay: OverlayId, node: NodeId) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let o = self.overlay_mut(overlay)?;
        o.bindings.remove(&node);
        o.removed.insert(node);
        Ok(())
    }

    /// The binding `overlay` holds for `node`, inherited bindings included.
    ///
    /// # Errors
    ///
    /// [`GraphError::NoOverlayPresent`] when no binding exists.
    pub fn binding(&self, overlay: OverlayId, node: NodeId) -> Result<Value, GraphError> {
        self.effective_binding(overlay, node)?
            .ok_or(GraphError::NoOverlayPresent)
    }

    /// Returns `true` if `overlay` holds a binding for `node`.
    pub fn has_binding(
        &self,
        overlay: OverlayId,
        node: NodeId,
        include_parent: bool,
    ) -> Result<bool, GraphError> {
        let o = self.overlay_ref(overlay)?;
        if o.removed.contains(&node) {
            return Ok(false);
        }
        if o.bindings.contains_key(&node) {
            return Ok(true);
        }
        match (include_parent, o.parent) {
            (true, Some(parent)) => self.has_binding(parent, node, true),
            _ => Ok(false),
        }
    }

    /// All bindings `overlay` would apply on entry: its own plus inherited, minus removals.
    pub fn effective_bindings(
        &self,
        overlay: OverlayId,
    ) -> Result<BTreeMap<NodeId, Value>, GraphError> {
        let o = self.overlay_ref(overlay)?;
        let mut map = match o.parent {
            Some(parent) => self.effective_bindings(parent)?,
            None => BTreeMap::new(),
        };
        for (node, value) in &o.bindings {
            map.insert(*node, value.clone());
        }
        for node in &o.removed {
            map.remove(node);
        }
        Ok(map)
    }

    /// The overlay value currently applied to `node`.
    ///
    /// # Errors
    ///
    /// [`GraphError::NoOverlayPresent`] when the node is not overlaid.
    pub fn overlaid_value(&self, node: NodeId) -> Result<Value, GraphError> {
        let n = self.node_ref(node)?;
        if !n.is_overlaid() {
            return Err(GraphError::NoOverlayPresent);
        }
        n.overlaid.clone().ok_or(GraphError::NoOverlayPresent)
    }

    /// Binds `node` to `value` in the active overlay and applies it immediately.
    ///
    /// Dependents are invalidated; a value applied by an enclosing overlay is stashed for
    /// restoration when the active scope exits.
    ///
    /// # Errors
    ///
    /// [`GraphError::NotPermitted`] for non-overlayable methods,
    /// [`GraphError::NoActiveScope`] outside an overlay scope, and
    /// [`GraphError::EvaluationActive`] while computing.
    pub fn overlay_value(
        &mut self,
        node: NodeId,
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let method = self.node_ref(node)?.key.method();
        if !method.is_overlayable() {
            return Err(GraphError::NotPermitted {
                method: method.name(),
            });
        }
        let Some(overlay) = self.active_overlay else {
            return Err(GraphError::NoActiveScope);
        };
        let target = self.resolve_for_write(node)?;
        {
            let o = self.overlay_mut(overlay)?;
            o.bindings.insert(target, value.into());
            o.removed.remove(&target);
        }
        self.apply_overlay_binding(overlay, target);
        Ok(())
    }

    /// Binds `(owner, method, args)` in the active overlay, interning the node first.
    pub fn overlay(
        &mut self,
        owner: ObjId,
        method: impl Into<MethodRef>,
        args: &[Value],
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let node = self.intern_for(owner, method.into(), args)?;
        self.overlay_value(node, value)
    }

    /// Clears the overlay applied to `node` by the active overlay scope.
    ///
    /// If an enclosing scope's value was stashed, it is re-applied (the node stays
    /// overlaid); otherwise the node's overlay state is cleared. While the active overlay is
    /// populating, the binding is also removed from the overlay itself. No-op when the
    /// active overlay has no applied binding for the node.
    pub fn clear_overlay(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.ensure_idle()?;
        let method = self.node_ref(node)?.key.method();
        if !method.is_overlayable() {
            return Err(GraphError::NotPermitted {
                method: method.name(),
            });
        }
        let Some(overlay) = self.active_overlay else {
            return Err(GraphError::NoActiveScope);
        };
        let target = self.resolve_existing(node)?;
        if !self.overlay_ref(overlay)?.applied.contains(&target) {
            return Ok(());
        }
        self.revert_overlay_binding(overlay, target);
        Ok(())
    }

    /// Enters `overlay`, applying its bindings until the returned scope is dropped.
    ///
    /// The first entry populates the overlay; later entries apply the recorded bindings and
    /// direct new bindings to a transient child overlay.
    ///
    /// # Errors
    ///
    /// [`GraphError::EvaluationActive`] while computing, and [`GraphError::Unsupported`]
    /// when the overlay belongs to a layer other than the active one (cross-layer overlay
    /// application is recognized but not implemented).
    pub fn enter_overlay(&mut self, overlay: OverlayId) -> Result<OverlayScope<'_>, GraphError> {
        self.ensure_idle()?;
        let (layer, populating) = {
            let o = self.overlay_ref(overlay)?;
            (o.layer, o.populating)
        };
        if layer != self.active_layer {
            return Err(GraphError::Unsupported {
                what: "entering an overlay outside the layer it was created in",
            });
        }

        let prior = self.active_overlay;
        let entered = if populating {
            overlay
        } else {
            // Apply-only entry: new bindings go to a transient child so the persistent
            // overlay stays as populated.
            let transient = OverlayId::new(u32::try_from(self.overlays.len()).unwrap_or(u32::MAX));
            self.overlays.push(Overlay::new(layer, Some(overlay)));
            transient
        };

        self.active_overlay = Some(entered);
        if let Ok(l) = self.layer_mut(layer) {
            l.overlay_stack.push(entered);
        }

        let to_apply: Vec<NodeId> = self
            .effective_bindings(entered)?
            .keys()
            .copied()
            .collect();
        for node in to_apply {
            self.apply_overlay_binding(entered, node);
        }
        debug!(
            "entered overlay {} (as {})",
            overlay.as_u32(),
            entered.as_u32()
        );

        Ok(OverlayScope {
            graph: self,
            origin: overlay,
            entered,
            prior,
        })
    }

    /// Unwinds one entry of an overlay. Infallible: called from scope drop.
    pub(crate) fn exit_overlay_internal(
        &mut self,
        origin: OverlayId,
        entered: OverlayId,
        prior: Option<OverlayId>,
    ) {
        // The first exit ends population; bindings recorded so far become the overlay's
        // persistent contents, so the revert pass below must not strip them.
        if let Ok(o) = self.overlay_mut(origin)
            && o.populating
        {
            o.populating = false;
        }

        let bound: Vec<NodeId> = match self.effective_bindings(entered) {
            Ok(map) => map.keys().copied().collect(),
            Err(_) => Vec::new(),
        };
        for node in bound {
            let applied = self
                .overlay_ref(entered)
                .map(|o| o.applied.contains(&node))
                .unwrap_or(false);
            if applied {
                self.revert_overlay_binding(entered, node);
            }
        }
        // A binding removed mid-scope is no longer listed but its node is still applied;
        // unwind those too, so exit always restores the pre-entry state.
        let leftovers: Vec<NodeId> = self
            .overlay_ref(entered)
            .map(|o| o.applied.iter().copied().collect())
            .unwrap_or_default();
        for node in leftovers {
            self.revert_overlay_binding(entered, node);
        }

        self.active_overlay = prior;
        let layer = self.overlay_ref(entered).map(|o| o.layer);
        if let Ok(layer) = layer
            && let Ok(l) = self.layer_mut(layer)
        {
            l.overlay_stack.pop();
        }
        debug!("exited overlay {}", origin.as_u32());
    }

    /// Applies `overlay`'s effective binding to `node` per the overlay write rule:
    /// invalidate dependents, stash a value displaced from an enclosing scope, store, mark
    /// overlaid.
    fn apply_overlay_binding(&mut self, overlay: OverlayId, node: NodeId) {
        let value = match self.effective_binding(overlay, node) {
            Ok(Some(value)) => value,
            _ => return,
        };
        let already_applied = self
            .overlay_ref(overlay)
            .map(|o| o.applied.contains(&node))
            .unwrap_or(false);

        self.invalidate_outputs(node);

        let displaced = match self.node_ref(node) {
            Ok(n) if n.is_overlaid() && !already_applied => n.overlaid.clone(),
            _ => None,
        };
        if let (Some(prior), Ok(o)) = (displaced, self.overlay_mut(overlay)) {
            o.stash.insert(node, prior);
        }

        if let Ok(n) = self.node_mut(node) {
            n.store_overlaid(value);
        }
        if let Ok(o) = self.overlay_mut(overlay) {
            o.applied.insert(node);
        }
    }

    /// Reverts `overlay`'s applied binding on `node`, restoring a stashed value if one was
    /// displaced on application.
    fn revert_overlay_binding(&mut self, overlay: OverlayId, node: NodeId) {
        self.invalidate_outputs(node);

        let stashed = self
            .overlay_mut(overlay)
            .ok()
            .and_then(|o| o.stash.remove(&node));
        if let Ok(n) = self.node_mut(node) {
            match stashed {
                Some(prior) => n.store_overlaid(prior),
                None => n.clear_overlaid(),
            }
        }

        if let Ok(o) = self.overlay_mut(overlay) {
            if o.populating {
                o.bindings.remove(&node);
                o.removed.insert(node);
            }
            o.applied.remove(&node);
        }
    }

    fn effective_binding(
        &self,
        overlay: OverlayId,
        node: NodeId,
    ) -> Result<Option<Value>, GraphError> {
        let o = self.overlay_ref(overlay)?;
        if o.removed.contains(&node) {
            return Ok(None);
        }
        if let Some(value) = o.bindings.get(&node) {
            return Ok(Some(value.clone()));
        }
        match o.parent {
            Some(parent) => self.effective_binding(parent, node),
            None => Ok(None),
        }
    }
}

/// An entered overlay. Dropping the scope reverts every applied binding and restores the
/// prior active overlay, on every path.
///
/// The scope derefs to [`CalcGraph`], so graph operations are performed directly on it.
#[derive(Debug)]
pub struct OverlayScope<'g> {
    graph: &'g mut CalcGraph,
    origin: OverlayId,
    entered: OverlayId,
    prior: Option<OverlayId>,
}

impl OverlayScope<'_> {
    /// The overlay this scope entered.
    #[must_use]
    #[inline]
    pub fn overlay_id(&self) -> OverlayId {
        self.origin
    }
}

impl Deref for OverlayScope<'_> {
    type Target = CalcGraph;

    #[inline]
    fn deref(&self) -> &CalcGraph {
        self.graph
    }
}

impl DerefMut for OverlayScope<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut CalcGraph {
        self.graph
    }
}

impl Drop for OverlayScope<'_> {
    fn drop(&mut self) {
        self.graph
            .exit_overlay_internal(self.origin, self.entered, self.prior);
    }
}
