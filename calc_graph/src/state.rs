// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Object state extraction and restoration.
//!
//! Saved state covers the methods flagged both settable and serializable — purely computed
//! values are derivable and never worth persisting. Extraction evaluates through the graph,
//! so a saved method that has not been set contributes its computed value. Only
//! zero-argument methods participate; parameterized nodes have no stable name to save under.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use calc_value::{ObjId, Value};

use crate::error::GraphError;
use crate::graph::CalcGraph;

/// A name → value snapshot of an object's saved methods.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SavedState(BTreeMap<Box<str>, Value>);

impl SavedState {
    /// Creates an empty snapshot.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// The value recorded under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Records `value` under `name`, replacing any prior entry.
    pub fn insert(&mut self, name: impl Into<Box<str>>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_ref(), v))
    }

    /// Number of entries.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the snapshot holds no entries.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl CalcGraph {
    /// Extracts the saved state of `obj`: the current value of every zero-argument method
    /// flagged settable and serializable, keyed by method name.
    ///
    /// Values are obtained through `get_value`, so unset saved methods contribute their
    /// computed values.
    pub fn saved_state(&mut self, obj: ObjId) -> Result<SavedState, GraphError> {
        let class = self.class_of(obj)?;
        let mut state = SavedState::new();
        let methods: Vec<_> = class.saved_methods().collect();
        for method in methods {
            let value = self.value_of(obj, method, &[])?;
            state.insert(method.name(), value);
        }
        Ok(state)
    }

    /// Applies a snapshot to `obj` by setting each named method, through the full write path
    /// (capability checks and delegates included).
    ///
    /// # Errors
    ///
    /// [`GraphError::BadHandle`] when a name does not match a method of `obj`'s class.
    pub fn apply_state(&mut self, obj: ObjId, state: &SavedState) -> Result<(), GraphError> {
        self.ensure_idle()?;
        for (name, value) in state.iter() {
            let method = self
                .class_of(obj)?
                .method_named(name)
                .ok_or(GraphError::BadHandle)?;
            self.set(obj, method, &[], value.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::test_support::{SPOT, TestClass};

    #[test]
    fn saved_state_covers_saved_methods_only() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        g.set(obj, &SPOT, &[], Value::I64(25)).unwrap();

        let state = g.saved_state(obj).unwrap();
        assert_eq!(state.get("spot"), Some(&Value::I64(25)));
        // Computed-only and settable-but-not-serializable methods are excluded.
        assert_eq!(state.get("constant"), None);
        assert_eq!(state.get("plain"), None);
    }

    #[test]
    fn unset_saved_methods_contribute_computed_values() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        let state = g.saved_state(obj).unwrap();
        assert_eq!(state.get("spot"), Some(&Value::I64(100)));
    }

    #[test]
    fn state_round_trips_onto_a_fresh_object() {
        let mut g = CalcGraph::new();
        let a = g.create_object(TestClass::CLASS);
        g.set(a, &SPOT, &[], Value::I64(25)).unwrap();
        let state = g.saved_state(a).unwrap();

        let b = g.create_object(TestClass::CLASS);
        g.apply_state(b, &state).unwrap();
        assert_eq!(g.value_of(b, &SPOT, &[]).unwrap(), Value::I64(25));
        let spot_b = g.lookup_node(b, &SPOT, &[], true).unwrap().unwrap();
        assert!(g.node_is_set(spot_b).unwrap());
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        let mut state = SavedState::new();
        state.insert("no_such_method", Value::I64(1));
        assert_eq!(g.apply_state(obj, &state), Err(GraphError::BadHandle));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn saved_state_serializes_by_name() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);
        g.set(obj, &SPOT, &[], Value::I64(25)).unwrap();
        let state = g.saved_state(obj).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        let back: SavedState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
