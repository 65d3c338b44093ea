// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Universally quantified properties, exercised over small graphs.

use calc_graph::{
    CalcContext, CalcGraph, Class, GraphError, LayerId, MethodDescriptor, MethodFlags, NodeId,
    OverlayId,
};
use calc_value::Value;

use crate::fixtures::{QUOTE, W, X, Y, want_i64};

/// Asserts `A ∈ B.inputs ⇔ B ∈ A.outputs` for every node in the graph.
fn assert_edges_symmetric(g: &CalcGraph) {
    for raw in 0..g.node_count() as u64 {
        let id = NodeId::new(raw);
        let inputs: Vec<_> = g.node_inputs(id).unwrap().collect();
        for input in inputs {
            assert!(
                g.node_outputs(input).unwrap().any(|n| n == id),
                "node {raw} lists an input that does not list it back"
            );
        }
        let outputs: Vec<_> = g.node_outputs(id).unwrap().collect();
        for output in outputs {
            assert!(
                g.node_inputs(output).unwrap().any(|n| n == id),
                "node {raw} lists an output that does not list it back"
            );
        }
    }
}

#[test]
fn edge_relation_stays_symmetric_across_operations() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);

    g.value_of(obj, &W, &[]).unwrap();
    assert_edges_symmetric(&g);

    g.set(obj, &X, &[], Value::I64(10)).unwrap();
    g.value_of(obj, &W, &[]).unwrap();
    assert_edges_symmetric(&g);

    let x = g.lookup_node(obj, &X, &[], true).unwrap().unwrap();
    g.clear_set(x).unwrap();
    g.value_of(obj, &W, &[]).unwrap();
    assert_edges_symmetric(&g);

    let ov = g.create_overlay();
    {
        let mut scope = g.enter_overlay(ov).unwrap();
        scope.overlay(obj, &X, &[], Value::I64(3)).unwrap();
        scope.value_of(obj, &W, &[]).unwrap();
        assert_edges_symmetric(&scope);
    }
    assert_edges_symmetric(&g);

    let layer = g.create_layer();
    {
        let mut scope = g.enter_layer(layer).unwrap();
        scope.set(obj, &X, &[], Value::I64(50)).unwrap();
        scope.value_of(obj, &W, &[]).unwrap();
        assert_edges_symmetric(&scope);
    }
    g.value_of(obj, &W, &[]).unwrap();
    assert_edges_symmetric(&g);
}

#[test]
fn set_values_persist_until_cleared() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);

    g.set(obj, &X, &[], Value::I64(41)).unwrap();
    assert_eq!(g.value_of(obj, &X, &[]).unwrap(), Value::I64(41));
    assert_eq!(g.value_of(obj, &X, &[]).unwrap(), Value::I64(41));

    let x = g.lookup_node(obj, &X, &[], true).unwrap().unwrap();
    g.clear_set(x).unwrap();
    assert_eq!(g.value_of(obj, &X, &[]).unwrap(), Value::I64(5));
}

#[test]
fn precedence_is_overlaid_then_set_then_computed() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);
    let x = g.lookup_node(obj, &X, &[], true).unwrap().unwrap();

    // Computed first, so the calced slot is populated.
    assert_eq!(g.get_value(x).unwrap(), Value::I64(5));
    let runs = g.calc_count(x).unwrap();

    g.set_value(x, Value::I64(8)).unwrap();
    assert_eq!(g.get_value(x).unwrap(), Value::I64(8));

    let ov = g.create_overlay();
    let mut scope = g.enter_overlay(ov).unwrap();
    scope.overlay_value(x, Value::I64(13)).unwrap();

    // All three states hold; the overlay wins.
    assert!(scope.node_is_overlaid(x).unwrap());
    assert!(scope.node_is_set(x).unwrap());
    assert_eq!(scope.get_value(x).unwrap(), Value::I64(13));

    // Clearing the overlay reveals the set value.
    scope.clear_overlay(x).unwrap();
    assert_eq!(scope.get_value(x).unwrap(), Value::I64(8));
    drop(scope);

    // Clearing the set value reveals the calced value, with no recomputation.
    g.clear_set(x).unwrap();
    assert_eq!(g.get_value(x).unwrap(), Value::I64(5));
    assert_eq!(g.calc_count(x).unwrap(), runs);
}

#[test]
fn invalidation_reaches_transitive_dependents() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);

    // w reads y and z, which read x.
    assert_eq!(g.value_of(obj, &W, &[]).unwrap(), Value::I64(16));
    let w = g.lookup_node(obj, &W, &[], true).unwrap().unwrap();
    let y = g.lookup_node(obj, &Y, &[], true).unwrap().unwrap();
    assert!(g.node_is_valid(w).unwrap());

    g.set(obj, &X, &[], Value::I64(10)).unwrap();
    assert!(!g.node_is_valid(y).unwrap());
    assert!(!g.node_is_valid(w).unwrap());
    assert_eq!(g.value_of(obj, &W, &[]).unwrap(), Value::I64(31));
}

#[test]
fn fixed_nodes_are_invalidation_frontiers() {
    fn one(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::I64(1))
    }

    fn b(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        let a = want_i64(ctx.read(&A, &[])?)?;
        Ok(Value::I64(a + 10))
    }

    fn c(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        let b = want_i64(ctx.read(&B, &[])?)?;
        Ok(Value::I64(b + 100))
    }

    static A: MethodDescriptor = MethodDescriptor::new("a", MethodFlags::SETTABLE, one);
    static B: MethodDescriptor = MethodDescriptor::new("b", MethodFlags::SETTABLE, b);
    static C: MethodDescriptor = MethodDescriptor::new("c", MethodFlags::NONE, c);
    static CLASS: Class = Class::new("Chain", &[&A, &B, &C]);

    let mut g = CalcGraph::new();
    let obj = g.create_object(&CLASS);
    assert_eq!(g.value_of(obj, &C, &[]).unwrap(), Value::I64(111));

    // Fix the middle of the chain, then mutate its input.
    g.set(obj, &B, &[], Value::I64(50)).unwrap();
    assert_eq!(g.value_of(obj, &C, &[]).unwrap(), Value::I64(150));
    g.set(obj, &A, &[], Value::I64(7)).unwrap();

    // The set node and everything behind it stay valid.
    let b_node = g.lookup_node(obj, &B, &[], true).unwrap().unwrap();
    let c_node = g.lookup_node(obj, &C, &[], true).unwrap().unwrap();
    assert!(g.node_is_valid(c_node).unwrap());
    assert!(g.node_is_set(b_node).unwrap());
    assert_eq!(g.value_of(obj, &C, &[]).unwrap(), Value::I64(150));

    // Unfixing reveals b's memoized value. The earlier mutation of a stopped at the
    // frontier, so that computation is still considered valid.
    g.clear_set(b_node).unwrap();
    assert!(g.node_is_valid(b_node).unwrap());
    assert_eq!(g.value_of(obj, &C, &[]).unwrap(), Value::I64(111));
}

#[test]
fn overlay_scopes_round_trip_observable_state() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);
    g.set(obj, &X, &[], Value::I64(9)).unwrap();

    let before: Vec<Value> = [&X, &Y, &W]
        .iter()
        .map(|m| g.value_of(obj, *m, &[]).unwrap())
        .collect();
    let x = g.lookup_node(obj, &X, &[], true).unwrap().unwrap();
    let set_before = g.node_is_set(x).unwrap();

    let ov = g.create_overlay();
    {
        let mut scope = g.enter_overlay(ov).unwrap();
        scope.overlay_value(x, Value::I64(1000)).unwrap();
        scope.value_of(obj, &W, &[]).unwrap();
    }

    let after: Vec<Value> = [&X, &Y, &W]
        .iter()
        .map(|m| g.value_of(obj, *m, &[]).unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(g.node_is_set(x).unwrap(), set_before);
    assert!(!g.node_is_overlaid(x).unwrap());
}

#[test]
fn every_mutation_during_evaluation_fails_and_changes_nothing() {
    fn one(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::I64(1))
    }

    fn probe(ctx: &mut CalcContext<'_>, args: &[Value]) -> Result<Value, GraphError> {
        let layer = LayerId::new(want_i64(args[0].clone())? as u32);
        let overlay = OverlayId::new(want_i64(args[1].clone())? as u32);
        let owner = ctx.owner();
        let g = ctx.graph_mut();
        let target = g
            .lookup_node(owner, &TARGET, &[], true)?
            .ok_or(GraphError::BadHandle)?;

        let mut rejected = 0_i64;
        rejected += i64::from(g.set_value(target, Value::I64(9)) == Err(GraphError::EvaluationActive));
        rejected += i64::from(g.clear_set(target) == Err(GraphError::EvaluationActive));
        rejected +=
            i64::from(g.overlay_value(target, Value::I64(9)) == Err(GraphError::EvaluationActive));
        rejected += i64::from(g.clear_overlay(target) == Err(GraphError::EvaluationActive));
        rejected += i64::from(matches!(
            g.enter_layer(layer),
            Err(GraphError::EvaluationActive)
        ));
        rejected += i64::from(matches!(
            g.enter_overlay(overlay),
            Err(GraphError::EvaluationActive)
        ));
        Ok(Value::I64(rejected))
    }

    static TARGET: MethodDescriptor = MethodDescriptor::new(
        "target",
        MethodFlags::SETTABLE.with(MethodFlags::OVERLAYABLE),
        one,
    );
    static PROBE: MethodDescriptor = MethodDescriptor::new("probe", MethodFlags::NONE, probe);
    static CLASS: Class = Class::new("Guarded", &[&TARGET, &PROBE]);

    let mut g = CalcGraph::new();
    let obj = g.create_object(&CLASS);
    let layer = g.create_layer();
    let overlay = g.create_overlay();

    let args = [
        Value::I64(i64::from(layer.as_u32())),
        Value::I64(i64::from(overlay.as_u32())),
    ];
    assert_eq!(g.value_of(obj, &PROBE, &args).unwrap(), Value::I64(6));

    // Nothing stuck: idle again, no set/overlay state, scopes unentered.
    assert!(!g.is_computing());
    assert_eq!(g.active_layer(), LayerId::ROOT);
    assert_eq!(g.active_overlay(), None);
    let target = g.lookup_node(obj, &TARGET, &[], true).unwrap().unwrap();
    assert!(!g.node_is_set(target).unwrap());
    assert!(!g.node_is_overlaid(target).unwrap());
    assert_eq!(g.layer_overlay_stack(LayerId::ROOT).unwrap().len(), 0);
}
