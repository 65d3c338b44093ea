// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static metadata for user-declared graph methods.
//!
//! A [`MethodDescriptor`] lifts a plain function into a graph method: it names the method,
//! declares its capabilities, and optionally routes writes through a delegate. Descriptors are
//! `'static` data declared once per method; their identity (see [`MethodRef`]) is pointer
//! identity, which is what node keys intern on.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;

use calc_value::{ObjId, Value};

use crate::error::GraphError;
use crate::eval::CalcContext;

/// Capability flags for a graph method.
///
/// Methods are read-only by default: they cannot be set or overlaid and always derive their
/// value from the underlying function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MethodFlags(u8);

impl MethodFlags {
    /// No capabilities; the method is read-only.
    pub const NONE: Self = Self(0);
    /// The value can be directly set by a user.
    pub const SETTABLE: Self = Self(1 << 0);
    /// The value is extracted as part of object state.
    pub const SERIALIZABLE: Self = Self(1 << 1);
    /// The value can be bound by an overlay scope.
    pub const OVERLAYABLE: Self = Self(1 << 2);
    /// Equivalent to `SETTABLE | SERIALIZABLE`.
    ///
    /// Purely computed values are never worth saving, so state extraction is restricted to
    /// methods that carry both bits.
    pub const SAVED: Self = Self(Self::SETTABLE.0 | Self::SERIALIZABLE.0);

    /// Returns the union of `self` and `other`.
    #[must_use]
    #[inline]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if this set contains every bit in `other`.
    #[must_use]
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// The underlying function of a graph method.
///
/// Called with an evaluation context and the node's argument tuple; reads of other graph
/// methods through the context are recorded as dependency edges.
pub type CalcFn = fn(&mut CalcContext<'_>, &[Value]) -> Result<Value, GraphError>;

/// A write delegate.
///
/// Invoked in place of a direct set with the context, the value the user supplied, and the
/// argument tuple. Returns the list of node changes to apply instead; the delegated method's
/// own node is not modified.
pub type DelegateFn =
    fn(&mut CalcContext<'_>, &Value, &[Value]) -> Result<Vec<NodeChange>, GraphError>;

/// Static metadata for one user-declared graph method.
#[derive(Debug)]
pub struct MethodDescriptor {
    name: &'static str,
    flags: MethodFlags,
    calc: CalcFn,
    delegate: Option<DelegateFn>,
}

impl MethodDescriptor {
    /// Declares a method with the given capabilities.
    #[must_use]
    #[inline]
    pub const fn new(name: &'static str, flags: MethodFlags, calc: CalcFn) -> Self {
        Self {
            name,
            flags,
            calc,
            delegate: None,
        }
    }

    /// Declares a method whose writes are routed through `delegate`.
    #[must_use]
    #[inline]
    pub const fn with_delegate(
        name: &'static str,
        flags: MethodFlags,
        calc: CalcFn,
        delegate: DelegateFn,
    ) -> Self {
        Self {
            name,
            flags,
            calc,
            delegate: Some(delegate),
        }
    }

    /// The method's stable name.
    #[must_use]
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The declared capability flags.
    #[must_use]
    #[inline]
    pub const fn flags(&self) -> MethodFlags {
        self.flags
    }

    /// Returns `true` if a user may set this method's value directly.
    #[must_use]
    #[inline]
    pub const fn is_settable(&self) -> bool {
        self.flags.contains(MethodFlags::SETTABLE)
    }

    /// Returns `true` if an overlay scope may bind this method's value.
    #[must_use]
    #[inline]
    pub const fn is_overlayable(&self) -> bool {
        self.flags.contains(MethodFlags::OVERLAYABLE)
    }

    /// Returns `true` if this method participates in object state extraction.
    #[must_use]
    #[inline]
    pub const fn is_serializable(&self) -> bool {
        self.flags.contains(MethodFlags::SERIALIZABLE)
    }

    /// Returns `true` if this method is both settable and serializable.
    #[must_use]
    #[inline]
    pub const fn is_saved(&self) -> bool {
        self.flags.contains(MethodFlags::SAVED)
    }

    /// Returns `true` if writes to this method are expanded by a delegate.
    #[must_use]
    #[inline]
    pub const fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    /// Returns `true` if the method can change at all: settable, overlayable, or delegated.
    #[must_use]
    #[inline]
    pub const fn is_changeable(&self) -> bool {
        self.is_settable() || self.is_overlayable() || self.has_delegate()
    }

    #[inline]
    pub(crate) fn calc(&self) -> CalcFn {
        self.calc
    }

    #[inline]
    pub(crate) fn delegate(&self) -> Option<DelegateFn> {
        self.delegate
    }
}

/// A reference to a `'static` method descriptor, compared by identity.
///
/// Two refs are equal exactly when they point at the same descriptor, so distinct methods
/// with the same name never alias a node key.
#[derive(Copy, Clone)]
pub struct MethodRef(&'static MethodDescriptor);

impl MethodRef {
    /// The referenced descriptor.
    #[must_use]
    #[inline]
    pub const fn descriptor(self) -> &'static MethodDescriptor {
        self.0
    }
}

impl From<&'static MethodDescriptor> for MethodRef {
    #[inline]
    fn from(descriptor: &'static MethodDescriptor) -> Self {
        Self(descriptor)
    }
}

impl Deref for MethodRef {
    type Target = MethodDescriptor;

    #[inline]
    fn deref(&self) -> &MethodDescriptor {
        self.0
    }
}

impl PartialEq for MethodRef {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.0, other.0)
    }
}

impl Eq for MethodRef {}

impl Hash for MethodRef {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::ptr::from_ref(self.0).hash(state);
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodRef").field(&self.0.name).finish()
    }
}

/// A pending node change produced by a write delegate.
///
/// Delegates cannot mutate nodes directly (the delegating write is still in flight), so they
/// describe the set of changes they want and the graph applies them. Changes are applied
/// through the direct set path — a change naming a delegated method is *not* expanded again.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeChange {
    /// Object owning the target node.
    pub owner: ObjId,
    /// Method of the target node.
    pub method: MethodRef,
    /// Argument tuple of the target node.
    pub args: Box<[Value]>,
    /// The value to set.
    pub value: Value,
}

impl NodeChange {
    /// Describes setting `(owner, method, args)` to `value`.
    #[inline]
    pub fn new(
        owner: ObjId,
        method: impl Into<MethodRef>,
        args: &[Value],
        value: impl Into<Value>,
    ) -> Self {
        Self {
            owner,
            method: method.into(),
            args: args.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    fn nil(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::Unit)
    }

    fn fan(
        _ctx: &mut CalcContext<'_>,
        value: &Value,
        _args: &[Value],
    ) -> Result<Vec<NodeChange>, GraphError> {
        Ok(alloc::vec![NodeChange::new(
            ObjId(0),
            &PLAIN,
            &[],
            value.clone()
        )])
    }

    static PLAIN: MethodDescriptor = MethodDescriptor::new("plain", MethodFlags::NONE, nil);
    static SAVED: MethodDescriptor = MethodDescriptor::new("saved", MethodFlags::SAVED, nil);
    static OVERLAY_ONLY: MethodDescriptor =
        MethodDescriptor::new("overlay_only", MethodFlags::OVERLAYABLE, nil);
    static DELEGATED: MethodDescriptor =
        MethodDescriptor::with_delegate("delegated", MethodFlags::SETTABLE, nil, fan);

    #[test]
    fn flags_derive_the_expected_predicates() {
        assert!(!PLAIN.is_settable());
        assert!(!PLAIN.is_changeable());

        assert!(SAVED.is_settable());
        assert!(SAVED.is_serializable());
        assert!(SAVED.is_saved());
        assert!(!SAVED.is_overlayable());

        assert!(OVERLAY_ONLY.is_overlayable());
        assert!(!OVERLAY_ONLY.is_saved());
        assert!(OVERLAY_ONLY.is_changeable());

        assert!(DELEGATED.has_delegate());
        assert!(DELEGATED.is_changeable());
        assert!(!DELEGATED.is_saved());
    }

    #[test]
    fn saved_requires_both_bits() {
        assert!(!MethodFlags::SETTABLE.contains(MethodFlags::SAVED));
        assert!(!MethodFlags::SERIALIZABLE.contains(MethodFlags::SAVED));
        assert!(
            MethodFlags::SETTABLE
                .with(MethodFlags::SERIALIZABLE)
                .contains(MethodFlags::SAVED)
        );
    }

    #[test]
    fn method_refs_compare_by_identity() {
        static ALIAS: MethodDescriptor = MethodDescriptor::new("plain", MethodFlags::NONE, nil);

        assert_eq!(MethodRef::from(&PLAIN), MethodRef::from(&PLAIN));
        // Same name, different declaration: different method.
        assert_ne!(MethodRef::from(&PLAIN), MethodRef::from(&ALIAS));
    }
}
