// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hierarchical node stores.
//!
//! A layer owns a table of nodes and inherits everything else from its parent chain: lookups
//! read through to the first layer owning the key, while writes localize by forking the node
//! into the active layer on first mutation (see
//! [`resolve_for_write`](crate::CalcGraph::resolve_for_write)). Layers never mix the two
//! policies.
//!
//! Entering a layer is a scoped operation. Each entry pushes the prior (layer, overlay) pair
//! onto the layer's own stack — a plain pair of variables would lose history under nested
//! re-entry of an already-active layer — and the matching exit pops it. Crossing a layer
//! boundary also invalidates the dependents of every node whose resolution changes, so caches
//! computed against one side of the boundary are never served on the other.

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

use hashbrown::HashMap;
use log::debug;

use crate::error::GraphError;
use crate::graph::CalcGraph;
use crate::key::{LayerId, NodeId, NodeKey, OverlayId};

/// A nested node store. Layers form a parent chain for lookup inheritance.
#[derive(Debug)]
pub(crate) struct Layer {
    /// Parent layer; `None` only for the root.
    pub(crate) parent: Option<LayerId>,
    /// Nodes this layer owns, by key.
    pub(crate) nodes: HashMap<NodeKey, NodeId>,
    /// Overlays currently entered against this layer, bottom first.
    pub(crate) overlay_stack: Vec<OverlayId>,
    /// Prior (active layer, active overlay) pairs, one per live entry of this layer.
    pub(crate) enter_stack: Vec<(LayerId, Option<OverlayId>)>,
}

impl Layer {
    pub(crate) fn new(parent: Option<LayerId>) -> Self {
        Self {
            parent,
            nodes: HashMap::new(),
            overlay_stack: Vec::new(),
            enter_stack: Vec::new(),
        }
    }
}

impl CalcGraph {
    /// Creates a new layer whose parent is the active layer.
    pub fn create_layer(&mut self) -> LayerId {
        let id = LayerId::new(u32::try_from(self.layers.len()).unwrap_or(u32::MAX));
        let parent = self.active_layer;
        self.layers.push(Layer::new(Some(parent)));
        debug!("created layer {} under {}", id.as_u32(), parent.as_u32());
        id
    }

    /// Creates a new layer under an explicit parent.
    pub fn create_layer_under(&mut self, parent: LayerId) -> Result<LayerId, GraphError> {
        self.layer_ref(parent)?;
        let id = LayerId::new(u32::try_from(self.layers.len()).unwrap_or(u32::MAX));
        self.layers.push(Layer::new(Some(parent)));
        Ok(id)
    }

    /// The parent of `layer`, or `None` for the root.
    pub fn layer_parent(&self, layer: LayerId) -> Result<Option<LayerId>, GraphError> {
        Ok(self.layer_ref(layer)?.parent)
    }

    /// The overlays currently entered against `layer`, bottom of the stack first.
    pub fn layer_overlay_stack(&self, layer: LayerId) -> Result<&[OverlayId], GraphError> {
        Ok(&self.layer_ref(layer)?.overlay_stack)
    }

    /// Enters `layer`, making it the target of lookups and writes until the returned scope is
    /// dropped.
    ///
    /// Dependents bound to nodes this layer shadows are invalidated on the way in, so reads
    /// inside the scope recompute against the layer's divergent nodes.
    ///
    /// # Errors
    ///
    /// Fails with [`GraphError::EvaluationActive`] while a value is being computed.
    pub fn enter_layer(&mut self, layer: LayerId) -> Result<LayerScope<'_>, GraphError> {
        self.ensure_idle()?;
        self.layer_ref(layer)?;

        let owned: Vec<NodeKey> = self.layer_ref(layer)?.nodes.keys().cloned().collect();
        let parent = self.layer_ref(layer)?.parent;
        if let Some(parent) = parent {
            for key in &owned {
                if let Some(shadowed) = self.find_in_chain(parent, key)? {
                    self.invalidate_outputs(shadowed);
                }
            }
        }

        let frame = (self.active_layer, self.active_overlay);
        self.layer_mut(layer)?.enter_stack.push(frame);
        self.active_layer = layer;
        self.active_overlay = None;
        debug!("entered layer {}", layer.as_u32());
        Ok(LayerScope { graph: self, layer })
    }

    /// Unwinds one entry of `layer`. Infallible: called from scope drop.
    pub(crate) fn exit_layer_internal(&mut self, layer: LayerId) {
        // Dependents bound to this layer's nodes must recompute against whatever the restored
        // chain resolves.
        let owned: Vec<NodeId> = match self.layer_ref(layer) {
            Ok(l) => l.nodes.values().copied().collect(),
            Err(_) => return,
        };
        for node in owned {
            self.invalidate_outputs(node);
        }

        let frame = self
            .layer_mut(layer)
            .ok()
            .and_then(|l| l.enter_stack.pop());
        if let Some((prev_layer, prev_overlay)) = frame {
            self.active_layer = prev_layer;
            self.active_overlay = prev_overlay;
        }
        debug!("exited layer {}", layer.as_u32());
    }
}

/// An entered layer. Dropping the scope exits the layer and restores the prior active layer
/// and overlay, on every path.
///
/// The scope derefs to [`CalcGraph`], so graph operations are performed directly on it.
#[derive(Debug)]
pub struct LayerScope<'g> {
    graph: &'g mut CalcGraph,
    layer: LayerId,
}

impl LayerScope<'_> {
    /// The layer this scope entered.
    #[must_use]
    #[inline]
    pub fn layer(&self) -> LayerId {
        self.layer
    }
}

impl Deref for LayerScope<'_> {
    type Target = CalcGraph;

    #[inline]
    fn deref(&self) -> &CalcGraph {
        self.graph
    }
}

impl DerefMut for LayerScope<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut CalcGraph {
        self.graph
    }
}

impl Drop for LayerScope<'_> {
    fn drop(&mut self) {
        self.graph.exit_layer_internal(self.layer);
    }
}
