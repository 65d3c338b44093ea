// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime values for graph computations.
//!
//! This is the representation handed to and returned from user calc functions, and it is also
//! the representation of node-key argument tuples. The second role is why [`Value`] implements
//! `Eq` and `Hash` with *total* semantics: two values are interchangeable as node keys exactly
//! when they are equal here.

use alloc::boxed::Box;
use core::hash::{Hash, Hasher};

/// An opaque handle to a graph-owned object.
///
/// Handles are allocated by the graph when an object is created and are only meaningful within
/// the graph that issued them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjId(pub u32);

/// A runtime value.
///
/// ## Equality and hashing
///
/// Values are compared structurally. `F64` compares and hashes by bit pattern
/// ([`f64::to_bits`]): `NaN` equals itself and `0.0` differs from `-0.0`. This makes equality
/// total, which node-key interning requires; it deviates from IEEE comparison, so do not use
/// `==` on `Value` where IEEE semantics matter.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// `()`.
    Unit,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    I64(i64),
    /// 64-bit float.
    F64(f64),
    /// UTF-8 string.
    Str(Box<str>),
    /// Immutable sequence of values.
    List(Box<[Value]>),
    /// Graph object handle.
    Obj(ObjId),
}

impl Value {
    /// Returns the boolean payload, if this is a `Bool`.
    #[must_use]
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `I64`.
    #[must_use]
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload, if this is an `F64`.
    #[must_use]
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `Str`.
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list payload, if this is a `List`.
    #[must_use]
    #[inline]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(vs) => Some(vs),
            _ => None,
        }
    }

    /// Returns the object handle, if this is an `Obj`.
    #[must_use]
    #[inline]
    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            Self::Obj(o) => Some(*o),
            _ => None,
        }
    }

    /// Returns `true` if this is `Unit`.
    #[must_use]
    #[inline]
    pub fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::I64(a), Self::I64(b)) => a == b,
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Obj(a), Self::Obj(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Unit => {}
            Self::Bool(b) => b.hash(state),
            Self::I64(v) => v.hash(state),
            Self::F64(v) => v.to_bits().hash(state),
            Self::Str(s) => s.hash(state),
            Self::List(vs) => vs.hash(state),
            Self::Obj(o) => o.hash(state),
        }
    }
}

impl From<bool> for Value {
    #[inline]
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    #[inline]
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<&str> for Value {
    #[inline]
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<ObjId> for Value {
    #[inline]
    fn from(v: ObjId) -> Self {
        Self::Obj(v)
    }
}

impl From<()> for Value {
    #[inline]
    fn from(_: ()) -> Self {
        Self::Unit
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use alloc::boxed::Box;
    use core::hash::{Hash, Hasher};
    use std::collections::hash_map::DefaultHasher;

    fn hash<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
        assert_eq!(hash(&Value::F64(f64::NAN)), hash(&Value::F64(f64::NAN)));
    }

    #[test]
    fn values_hash_consistently_with_equality() {
        let a = Value::List(Box::from([Value::I64(1), Value::Str("x".into())]));
        let b = Value::List(Box::from([Value::I64(1), Value::Str("x".into())]));
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(a, Value::List(Box::from([Value::I64(2)])));
    }

    #[test]
    fn discriminants_do_not_collide() {
        assert_ne!(Value::I64(0), Value::F64(0.0));
        assert_ne!(Value::Unit, Value::Bool(false));
        assert_ne!(Value::Obj(ObjId(1)), Value::I64(1));
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::I64(7).as_i64(), Some(7));
        assert_eq!(Value::F64(1.5).as_f64(), Some(1.5));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::Obj(ObjId(3)).as_obj(), Some(ObjId(3)));
        assert!(Value::Unit.is_unit());
        assert_eq!(Value::Unit.as_i64(), None);
    }
}
