// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end behavioral scenarios.

use std::sync::atomic::{AtomicI64, Ordering};

use calc_graph::{
    CalcContext, CalcGraph, Class, GraphError, MethodDescriptor, MethodFlags, NodeChange,
};
use calc_value::Value;

use crate::fixtures::{QUOTE, X, Y, want_i64};

/// A computed value is cached: the underlying function runs once however often dependents
/// read it.
#[test]
fn caching_computes_each_node_once() {
    static CALLS: AtomicI64 = AtomicI64::new(0);

    fn counter(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::I64(CALLS.fetch_add(1, Ordering::SeqCst)))
    }

    fn succ(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        let x = want_i64(ctx.read(&COUNTER, &[])?)?;
        Ok(Value::I64(x + 1))
    }

    static COUNTER: MethodDescriptor = MethodDescriptor::new("counter", MethodFlags::NONE, counter);
    static SUCC: MethodDescriptor = MethodDescriptor::new("succ", MethodFlags::NONE, succ);
    static CLASS: Class = Class::new("Counting", &[&COUNTER, &SUCC]);

    let mut g = CalcGraph::new();
    let obj = g.create_object(&CLASS);

    // The counter body runs exactly once; the second read is served from the cache.
    assert_eq!(g.value_of(obj, &SUCC, &[]).unwrap(), Value::I64(1));
    assert_eq!(g.value_of(obj, &SUCC, &[]).unwrap(), Value::I64(1));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

/// Setting an input propagates through recomputation of dependents.
#[test]
fn set_invalidates_and_dependents_recompute() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);

    g.set(obj, &X, &[], Value::I64(10)).unwrap();
    assert_eq!(g.value_of(obj, &Y, &[]).unwrap(), Value::I64(11));

    g.set(obj, &X, &[], Value::I64(20)).unwrap();
    assert_eq!(g.value_of(obj, &Y, &[]).unwrap(), Value::I64(21));
}

/// An overlay perturbs values inside its scope and round-trips on exit.
#[test]
fn overlay_round_trip() {
    fn double(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        let x = want_i64(ctx.read(&BASE, &[])?)?;
        Ok(Value::I64(x * 2))
    }

    fn five(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::I64(5))
    }

    static BASE: MethodDescriptor = MethodDescriptor::new("base", MethodFlags::OVERLAYABLE, five);
    static DOUBLE: MethodDescriptor = MethodDescriptor::new("double", MethodFlags::NONE, double);
    static CLASS: Class = Class::new("Doubling", &[&BASE, &DOUBLE]);

    let mut g = CalcGraph::new();
    let obj = g.create_object(&CLASS);
    assert_eq!(g.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(10));

    let ov = g.create_overlay();
    {
        let mut scope = g.enter_overlay(ov).unwrap();
        scope.overlay(obj, &BASE, &[], Value::I64(7)).unwrap();
        assert_eq!(scope.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(14));
    }
    assert_eq!(g.value_of(obj, &DOUBLE, &[]).unwrap(), Value::I64(10));
}

/// A delegated set expands into the delegate's node changes; the delegated node itself is
/// untouched.
#[test]
fn delegate_write_expands_to_node_changes() {
    fn zero(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::I64(0))
    }

    fn fan_out(
        ctx: &mut CalcContext<'_>,
        value: &Value,
        _args: &[Value],
    ) -> Result<Vec<NodeChange>, GraphError> {
        let v = want_i64(value.clone())?;
        let owner = ctx.owner();
        Ok(vec![
            NodeChange::new(owner, &FAN_X, &[], Value::I64(v)),
            NodeChange::new(owner, &FAN_W, &[], Value::I64(v + 1)),
        ])
    }

    static FAN_X: MethodDescriptor = MethodDescriptor::new("fan_x", MethodFlags::SETTABLE, zero);
    static FAN_W: MethodDescriptor = MethodDescriptor::new("fan_w", MethodFlags::SETTABLE, zero);
    static FAN_Z: MethodDescriptor =
        MethodDescriptor::with_delegate("fan_z", MethodFlags::SETTABLE, zero, fan_out);
    static CLASS: Class = Class::new("Fan", &[&FAN_X, &FAN_W, &FAN_Z]);

    let mut g = CalcGraph::new();
    let obj = g.create_object(&CLASS);
    let z_before = g.value_of(obj, &FAN_Z, &[]).unwrap();

    g.set(obj, &FAN_Z, &[], Value::I64(3)).unwrap();

    assert_eq!(g.value_of(obj, &FAN_X, &[]).unwrap(), Value::I64(3));
    assert_eq!(g.value_of(obj, &FAN_W, &[]).unwrap(), Value::I64(4));
    assert_eq!(g.value_of(obj, &FAN_Z, &[]).unwrap(), z_before);
    let z = g.lookup_node(obj, &FAN_Z, &[], true).unwrap().unwrap();
    assert!(!g.node_is_set(z).unwrap());
}

/// Writes from inside a computed body are rejected, and the graph is usable afterwards.
#[test]
fn mutation_during_evaluation_is_rejected() {
    fn one(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Ok(Value::I64(1))
    }

    fn probe(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        let owner = ctx.owner();
        let attempt = ctx.graph_mut().set(owner, &GUARDED, &[], Value::I64(9));
        Ok(Value::Bool(attempt == Err(GraphError::EvaluationActive)))
    }

    static GUARDED: MethodDescriptor = MethodDescriptor::new("guarded", MethodFlags::SETTABLE, one);
    static PROBE: MethodDescriptor = MethodDescriptor::new("probe", MethodFlags::NONE, probe);
    static CLASS: Class = Class::new("Probing", &[&GUARDED, &PROBE]);

    let mut g = CalcGraph::new();
    let obj = g.create_object(&CLASS);

    assert_eq!(g.value_of(obj, &PROBE, &[]).unwrap(), Value::Bool(true));
    assert!(!g.is_computing());

    // The rejected write left no trace, and the graph accepts writes again.
    assert_eq!(g.value_of(obj, &GUARDED, &[]).unwrap(), Value::I64(1));
    let guarded = g.lookup_node(obj, &GUARDED, &[], true).unwrap().unwrap();
    assert!(!g.node_is_set(guarded).unwrap());
    g.set(obj, &GUARDED, &[], Value::I64(2)).unwrap();
    assert_eq!(g.value_of(obj, &GUARDED, &[]).unwrap(), Value::I64(2));
}

/// Nested overlays stash and restore each other's bindings value by value.
#[test]
fn nested_overlays_stash_and_restore() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);
    let original = g.value_of(obj, &X, &[]).unwrap();

    let o1 = g.create_overlay();
    let o2 = g.create_overlay();

    let mut s1 = g.enter_overlay(o1).unwrap();
    s1.overlay(obj, &X, &[], Value::I64(7)).unwrap();
    assert_eq!(s1.value_of(obj, &X, &[]).unwrap(), Value::I64(7));

    {
        let mut s2 = s1.enter_overlay(o2).unwrap();
        s2.overlay(obj, &X, &[], Value::I64(9)).unwrap();
        assert_eq!(s2.value_of(obj, &X, &[]).unwrap(), Value::I64(9));
    }

    // Exiting the inner scope restores the outer overlay's binding.
    assert_eq!(s1.value_of(obj, &X, &[]).unwrap(), Value::I64(7));
    drop(s1);

    assert_eq!(g.value_of(obj, &X, &[]).unwrap(), original);
}
