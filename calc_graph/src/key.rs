// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Identities for nodes, layers, and overlays.

use alloc::boxed::Box;

use calc_value::{ObjId, Value};

use crate::descriptor::MethodRef;

/// Identifier for a node within a [`CalcGraph`](crate::CalcGraph).
///
/// Node ids are graph-local: they index the graph's node slab and are not stable across
/// reconstructing the graph.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct NodeId(u64);

impl NodeId {
    /// Creates a new node id.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer backing this id.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the slab index for this id, if it fits in `usize`.
    #[inline]
    pub(crate) fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

/// Identifier for a layer within a [`CalcGraph`](crate::CalcGraph).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LayerId(u32);

impl LayerId {
    /// The root layer every graph starts with.
    pub const ROOT: Self = Self(0);

    /// Creates a new layer id.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer backing this id.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier for an overlay within a [`CalcGraph`](crate::CalcGraph).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct OverlayId(u32);

impl OverlayId {
    /// Creates a new overlay id.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer backing this id.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Value identity of a node: (owner object, method, argument tuple).
///
/// Keys are compared structurally; equal keys refer to the same logical node within a layer.
/// Argument equality is the total equality of [`Value`] (floats by bit pattern), so every
/// argument tuple — `NaN` included — interns to exactly one node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeKey {
    owner: ObjId,
    method: MethodRef,
    args: Box<[Value]>,
}

impl NodeKey {
    /// Creates a key for `(owner, method, args)`.
    #[inline]
    pub fn new(owner: ObjId, method: MethodRef, args: &[Value]) -> Self {
        Self {
            owner,
            method,
            args: args.into(),
        }
    }

    /// The owning object.
    #[inline]
    pub fn owner(&self) -> ObjId {
        self.owner
    }

    /// The method this node memoizes.
    #[inline]
    pub fn method(&self) -> MethodRef {
        self.method
    }

    /// The argument tuple.
    #[inline]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}
