// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding user objects to the graph.
//!
//! A [`Class`] is a static table of method descriptors; creating an object against a class
//! yields an [`ObjId`] whose state lives entirely in the graph. There is no initialization
//! hook to override: construction-time values are ordinary set operations against the
//! matching methods, routed through the full write path (delegates included).
//!
//! [`BoundMethod`] is the per-(object, method) handle: every operation on it goes through the
//! graph rather than invoking the underlying function directly, which is what makes reads
//! memoized and dependency-tracked.

use calc_value::{ObjId, Value};

use crate::descriptor::{MethodDescriptor, MethodRef};
use crate::error::GraphError;
use crate::graph::CalcGraph;
use crate::key::NodeId;

/// A static table of graph methods declared by one object type.
#[derive(Debug)]
pub struct Class {
    name: &'static str,
    methods: &'static [&'static MethodDescriptor],
}

impl Class {
    /// Declares a class with the given methods.
    #[must_use]
    #[inline]
    pub const fn new(name: &'static str, methods: &'static [&'static MethodDescriptor]) -> Self {
        Self { name, methods }
    }

    /// The class name.
    #[must_use]
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The declared methods, in declaration order.
    #[inline]
    pub fn methods(&self) -> impl Iterator<Item = MethodRef> + '_ {
        self.methods.iter().map(|m| MethodRef::from(*m))
    }

    /// The methods whose values participate in state extraction (settable and serializable).
    #[inline]
    pub fn saved_methods(&self) -> impl Iterator<Item = MethodRef> + '_ {
        self.methods().filter(|m| m.is_saved())
    }

    /// Looks a method up by name.
    #[must_use]
    pub fn method_named(&self, name: &str) -> Option<MethodRef> {
        self.methods().find(|m| m.name() == name)
    }

    /// Returns `true` if `method` is declared by this class.
    #[must_use]
    pub fn declares(&self, method: MethodRef) -> bool {
        self.methods().any(|m| m == method)
    }
}

impl CalcGraph {
    /// Creates an object of `class` and returns its handle.
    #[must_use]
    pub fn create_object(&mut self, class: &'static Class) -> ObjId {
        let id = ObjId(u32::try_from(self.objects.len()).unwrap_or(u32::MAX));
        self.objects.push(class);
        id
    }

    /// Creates an object and applies each `(method, value)` pair as a set operation.
    ///
    /// This is the construction-time initializer: values route through the full set path,
    /// so capability checks and write delegates apply exactly as for a later `set`.
    pub fn create_object_with(
        &mut self,
        class: &'static Class,
        values: &[(MethodRef, Value)],
    ) -> Result<ObjId, GraphError> {
        self.ensure_idle()?;
        let obj = self.create_object(class);
        for (method, value) in values {
            self.set(obj, *method, &[], value.clone())?;
        }
        Ok(obj)
    }

    /// The class `obj` was created against.
    pub fn class_of(&self, obj: ObjId) -> Result<&'static Class, GraphError> {
        self.objects
            .get(obj.0 as usize)
            .copied()
            .ok_or(GraphError::BadHandle)
    }

    /// Fails with [`GraphError::BadHandle`] unless `method` is declared by `obj`'s class.
    pub(crate) fn ensure_member(&self, obj: ObjId, method: MethodRef) -> Result<(), GraphError> {
        if self.class_of(obj)?.declares(method) {
            Ok(())
        } else {
            Err(GraphError::BadHandle)
        }
    }

    /// Binds `method` of `obj` into a reusable handle.
    pub fn bind(
        &self,
        obj: ObjId,
        method: impl Into<MethodRef>,
    ) -> Result<BoundMethod, GraphError> {
        let method = method.into();
        self.ensure_member(obj, method)?;
        Ok(BoundMethod { owner: obj, method })
    }
}

/// A graph method bound to an object.
///
/// The handle routes every operation through the graph: calls memoize and record
/// dependencies, writes validate capabilities and invalidate dependents.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoundMethod {
    owner: ObjId,
    method: MethodRef,
}

impl BoundMethod {
    /// The owning object.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> ObjId {
        self.owner
    }

    /// The bound method.
    #[must_use]
    #[inline]
    pub fn method(&self) -> MethodRef {
        self.method
    }

    /// The node backing this method for `args`, interning it if needed.
    pub fn node(&self, graph: &mut CalcGraph, args: &[Value]) -> Result<NodeId, GraphError> {
        graph.intern_for(self.owner, self.method, args)
    }

    /// Returns the value, computing and recording dependencies as needed.
    pub fn call(&self, graph: &mut CalcGraph, args: &[Value]) -> Result<Value, GraphError> {
        graph.value_of(self.owner, self.method, args)
    }

    /// Sets the value (or expands the method's write delegate).
    pub fn set(
        &self,
        graph: &mut CalcGraph,
        args: &[Value],
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        graph.set(self.owner, self.method, args, value)
    }

    /// Clears a previously set value. No-op if not set.
    pub fn clear_set(&self, graph: &mut CalcGraph, args: &[Value]) -> Result<(), GraphError> {
        graph.ensure_idle()?;
        let node = self.node(graph, args)?;
        graph.clear_set(node)
    }

    /// Binds the value in the active overlay scope.
    pub fn overlay(
        &self,
        graph: &mut CalcGraph,
        args: &[Value],
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        graph.overlay(self.owner, self.method, args, value)
    }

    /// Clears the overlay applied by the active overlay scope. No-op if not applied.
    pub fn clear_overlay(&self, graph: &mut CalcGraph, args: &[Value]) -> Result<(), GraphError> {
        graph.ensure_idle()?;
        let node = self.node(graph, args)?;
        graph.clear_overlay(node)
    }

    /// Returns `true` if the node carries a user-assigned value.
    pub fn is_set(&self, graph: &mut CalcGraph, args: &[Value]) -> Result<bool, GraphError> {
        let node = self.node(graph, args)?;
        graph.node_is_set(node)
    }

    /// Returns `true` if the node is bound by an active overlay.
    pub fn is_overlaid(&self, graph: &mut CalcGraph, args: &[Value]) -> Result<bool, GraphError> {
        let node = self.node(graph, args)?;
        graph.node_is_overlaid(node)
    }
}
