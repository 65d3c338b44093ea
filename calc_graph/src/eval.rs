// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Demand-driven evaluation with dependency capture.
//!
//! [`CalcGraph::get_value`] drives everything: it records an edge between the currently
//! evaluating node and the target, resolves the target's effective value by precedence, and —
//! when a recompute is needed — runs the underlying function with this node installed as the
//! "currently evaluating" slot. Reads the function performs through its [`CalcContext`]
//! recurse into `get_value`, which is how input edges are discovered.
//!
//! The active-node slot is saved and restored on every exit path, including failure, so an
//! error inside a user function never wedges the graph in a computing state.

use alloc::vec::Vec;

use log::trace;

use calc_value::{ObjId, Value};

use crate::descriptor::MethodRef;
use crate::error::GraphError;
use crate::graph::CalcGraph;
use crate::key::NodeId;

impl CalcGraph {
    /// Returns the value of `node`, recalculating if necessary.
    ///
    /// If another node is currently evaluating, a dependency edge from that node to this one
    /// is recorded first — reads register dependencies as a side effect, whether or not the
    /// target ends up recomputing.
    ///
    /// The effective value is the highest-priority state present: the overlay binding, then
    /// the set value, then the valid calced value. Only when none is present does the
    /// underlying function run; its reads refill the node's input set (the previous inputs
    /// are dropped first, in both directions).
    ///
    /// # Errors
    ///
    /// Propagates whatever the underlying function returns. The failed node is left invalid
    /// with an empty input set, and the graph remains usable.
    pub fn get_value(&mut self, node: NodeId) -> Result<Value, GraphError> {
        self.node_ref(node)?;
        let caller = self.active_node;
        if let Some(reader) = caller {
            self.add_edge(reader, node);
        }
        self.active_node = Some(node);
        let result = self.compute_effective(node);
        self.active_node = caller;
        result
    }

    /// Returns the value of `(owner, method, args)`, interning the node first.
    pub fn value_of(
        &mut self,
        owner: ObjId,
        method: impl Into<MethodRef>,
        args: &[Value],
    ) -> Result<Value, GraphError> {
        let node = self.intern_for(owner, method.into(), args)?;
        self.get_value(node)
    }

    fn compute_effective(&mut self, node: NodeId) -> Result<Value, GraphError> {
        if let Some(value) = self.node_ref(node)?.cached() {
            return Ok(value.clone());
        }

        // Recompute: drop stale inputs (and their reciprocal outputs) so edge capture can
        // rebuild the set from what this run actually reads.
        self.clear_inputs(node);
        let (calc, owner, args) = {
            let n = self.node_ref(node)?;
            (
                n.key.method().descriptor().calc(),
                n.key.owner(),
                n.key.args().to_vec(),
            )
        };
        trace!("calc node {}", node.as_u64());
        let outcome = {
            let mut ctx = CalcContext::new(&mut *self, owner);
            calc(&mut ctx, &args)
        };
        match outcome {
            Ok(value) => {
                self.node_mut(node)?.store_calced(value.clone());
                Ok(value)
            }
            Err(err) => {
                // The run may have captured partial reads before failing; a failed node is
                // left invalid with an empty input set.
                self.clear_inputs(node);
                Err(err)
            }
        }
    }

    /// Records the edge `reader ← input` in both directions. Idempotent.
    pub(crate) fn add_edge(&mut self, reader: NodeId, input: NodeId) {
        if let Ok(n) = self.node_mut(reader) {
            n.add_input(input);
        }
        if let Ok(n) = self.node_mut(input) {
            n.add_output(reader);
        }
    }

    /// Drops all of `node`'s input edges, removing `node` from each former input's outputs.
    pub(crate) fn clear_inputs(&mut self, node: NodeId) {
        let inputs: Vec<NodeId> = match self.node_ref(node) {
            Ok(n) => n.inputs.iter().copied().collect(),
            Err(_) => return,
        };
        for input in inputs {
            if let Ok(n) = self.node_mut(input) {
                n.remove_output(node);
            }
        }
        if let Ok(n) = self.node_mut(node) {
            n.inputs.clear();
        }
    }
}

/// The context handed to a graph method while it computes.
///
/// Reads performed through the context are recorded as dependency edges of the evaluating
/// node. The full graph is reachable through [`graph_mut`](Self::graph_mut), but every write
/// path checks the evaluation guard at runtime — a method body that attempts a set or an
/// overlay receives [`GraphError::EvaluationActive`].
#[derive(Debug)]
pub struct CalcContext<'g> {
    graph: &'g mut CalcGraph,
    owner: ObjId,
}

impl<'g> CalcContext<'g> {
    pub(crate) fn new(graph: &'g mut CalcGraph, owner: ObjId) -> Self {
        Self { graph, owner }
    }

    /// The object whose method is being evaluated.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> ObjId {
        self.owner
    }

    /// Reads another graph method of the owning object, recording the dependency.
    pub fn read(
        &mut self,
        method: impl Into<MethodRef>,
        args: &[Value],
    ) -> Result<Value, GraphError> {
        let owner = self.owner;
        self.read_on(owner, method, args)
    }

    /// Reads a graph method of another object, recording the dependency.
    pub fn read_on(
        &mut self,
        owner: ObjId,
        method: impl Into<MethodRef>,
        args: &[Value],
    ) -> Result<Value, GraphError> {
        let node = self.graph.intern_for(owner, method.into(), args)?;
        self.graph.get_value(node)
    }

    /// Shared access to the underlying graph.
    #[must_use]
    #[inline]
    pub fn graph(&self) -> &CalcGraph {
        self.graph
    }

    /// Exclusive access to the underlying graph.
    ///
    /// All mutation paths remain guarded: while evaluation is active they fail with
    /// [`GraphError::EvaluationActive`] and leave the graph unchanged.
    #[must_use]
    #[inline]
    pub fn graph_mut(&mut self) -> &mut CalcGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::test_support::{DOUBLE, FAILING, FLAG, LEFT, PICK, RIGHT, SPOT, TestClass};
    use alloc::vec::Vec;

    #[test]
    fn values_are_memoized_until_invalidated() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);

        assert_eq!(g.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(200));
        assert_eq!(g.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(200));

        let double = g.lookup_node(obj, &DOUBLE, &[], true).unwrap().unwrap();
        let spot = g.lookup_node(obj, &SPOT, &[], true).unwrap().unwrap();
        assert_eq!(g.calc_count(double).unwrap(), 1);
        assert_eq!(g.calc_count(spot).unwrap(), 1);
    }

    #[test]
    fn reads_capture_symmetric_edges() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);

        g.value_of(obj, &DOUBLE, &[]).unwrap();
        let double = g.lookup_node(obj, &DOUBLE, &[], true).unwrap().unwrap();
        let spot = g.lookup_node(obj, &SPOT, &[], true).unwrap().unwrap();

        let inputs: Vec<_> = g.node_inputs(double).unwrap().collect();
        let outputs: Vec<_> = g.node_outputs(spot).unwrap().collect();
        assert_eq!(inputs, [spot]);
        assert_eq!(outputs, [double]);
    }

    #[test]
    fn set_invalidates_dependents_and_recompute_follows() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);

        assert_eq!(g.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(200));
        g.set(obj, &SPOT, &[], Value::I64(10)).unwrap();
        assert_eq!(g.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(20));
        g.set(obj, &SPOT, &[], Value::I64(20)).unwrap();
        assert_eq!(g.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(40));
    }

    #[test]
    fn recompute_rebuilds_the_input_set_from_actual_reads() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);

        // FLAG defaults to false, so PICK reads RIGHT.
        assert_eq!(g.value_of(obj, &PICK, &[]).unwrap(), Value::I64(2));
        let pick = g.lookup_node(obj, &PICK, &[], true).unwrap().unwrap();
        let flag = g.lookup_node(obj, &FLAG, &[], true).unwrap().unwrap();
        let left = g.lookup_node(obj, &LEFT, &[], true).unwrap().unwrap();
        let right = g.lookup_node(obj, &RIGHT, &[], true).unwrap().unwrap();

        let inputs: Vec<_> = g.node_inputs(pick).unwrap().collect();
        assert_eq!(inputs, [flag, right]);

        g.set(obj, &FLAG, &[], Value::Bool(true)).unwrap();
        assert_eq!(g.value_of(obj, &PICK, &[]).unwrap(), Value::I64(1));

        // The stale RIGHT edge is gone in both directions.
        let inputs: Vec<_> = g.node_inputs(pick).unwrap().collect();
        assert_eq!(inputs, [flag, left]);
        assert!(!g.node_outputs(right).unwrap().any(|n| n == pick));
    }

    #[test]
    fn failed_calcs_restore_the_active_node_and_leave_the_node_invalid() {
        let mut g = CalcGraph::new();
        let obj = g.create_object(TestClass::CLASS);

        let err = g.value_of(obj, &FAILING, &[]).unwrap_err();
        assert_eq!(err, GraphError::calc_failed("deliberate failure"));

        assert!(!g.is_computing());
        let failing = g.lookup_node(obj, &FAILING, &[], true).unwrap().unwrap();
        assert!(!g.node_is_valid(failing).unwrap());
        assert_eq!(g.node_inputs(failing).unwrap().count(), 0);

        // The graph stays usable after the failure.
        assert_eq!(g.value_of(obj, &SPOT, &[]).unwrap(), Value::I64(100));
    }

    #[test]
    fn get_value_rejects_foreign_ids_before_touching_state() {
        let mut g = CalcGraph::new();
        assert_eq!(g.get_value(NodeId::new(40)), Err(GraphError::BadHandle));
        assert!(!g.is_computing());
    }
}
