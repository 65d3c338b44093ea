// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error-surface coverage: each failure kind from the operation preconditions.

use calc_graph::{
    CalcContext, CalcGraph, Class, GraphError, MethodDescriptor, MethodFlags, NodeId,
};
use calc_value::{ObjId, Value};

use crate::fixtures::{QUOTE, X, Y};

#[test]
fn capability_violations_are_not_permitted() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);
    let y = g.lookup_node(obj, &Y, &[], true).unwrap().unwrap();

    // y is computed-only: neither settable nor overlayable.
    assert_eq!(
        g.set_value(y, Value::I64(1)),
        Err(GraphError::NotPermitted { method: "y" })
    );
    assert_eq!(
        g.clear_set(y),
        Err(GraphError::NotPermitted { method: "y" })
    );

    let ov = g.create_overlay();
    let mut scope = g.enter_overlay(ov).unwrap();
    assert_eq!(
        scope.overlay_value(y, Value::I64(1)),
        Err(GraphError::NotPermitted { method: "y" })
    );
    assert_eq!(
        scope.clear_overlay(y),
        Err(GraphError::NotPermitted { method: "y" })
    );
    assert_eq!(
        scope.add_binding(ov, y, Value::I64(1)),
        Err(GraphError::NotPermitted { method: "y" })
    );
    drop(scope);
}

#[test]
fn overlay_operations_need_an_active_scope() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);
    let x = g.lookup_node(obj, &X, &[], true).unwrap().unwrap();

    assert_eq!(
        g.overlay_value(x, Value::I64(1)),
        Err(GraphError::NoActiveScope)
    );
    assert_eq!(g.clear_overlay(x), Err(GraphError::NoActiveScope));
}

#[test]
fn absent_overlay_values_read_as_no_overlay_present() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);
    let x = g.lookup_node(obj, &X, &[], true).unwrap().unwrap();

    assert_eq!(g.overlaid_value(x), Err(GraphError::NoOverlayPresent));
    let ov = g.create_overlay();
    assert_eq!(g.binding(ov, x), Err(GraphError::NoOverlayPresent));
}

#[test]
fn duplicate_explicit_creation_is_rejected_per_layer() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);

    g.create_node(obj, &X, &[]).unwrap();
    assert_eq!(
        g.create_node(obj, &X, &[]),
        Err(GraphError::DuplicateNode { method: "x" })
    );

    // A child layer does not own the key, so explicit creation succeeds there.
    let layer = g.create_layer();
    let mut scope = g.enter_layer(layer).unwrap();
    scope.create_node(obj, &X, &[]).unwrap();
    assert_eq!(
        scope.create_node(obj, &X, &[]),
        Err(GraphError::DuplicateNode { method: "x" })
    );
    drop(scope);
}

#[test]
fn cross_layer_overlay_entry_is_unsupported() {
    let mut g = CalcGraph::new();
    let ov = g.create_overlay();
    let layer = g.create_layer();

    let mut scope = g.enter_layer(layer).unwrap();
    assert!(matches!(
        scope.enter_overlay(ov),
        Err(GraphError::Unsupported { .. })
    ));
    drop(scope);
}

#[test]
fn foreign_handles_fail_uniformly() {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&QUOTE);

    assert_eq!(g.get_value(NodeId::new(77)), Err(GraphError::BadHandle));
    assert!(matches!(g.class_of(ObjId(7)), Err(GraphError::BadHandle)));
    assert_eq!(
        g.value_of(ObjId(7), &X, &[]),
        Err(GraphError::BadHandle)
    );

    // A method the owner's class does not declare is a bad handle, not a capability error.
    static FOREIGN: MethodDescriptor =
        MethodDescriptor::new("foreign", MethodFlags::SETTABLE, |_ctx, _args| {
            Ok(Value::Unit)
        });
    assert_eq!(
        g.set(obj, &FOREIGN, &[], Value::I64(1)),
        Err(GraphError::BadHandle)
    );
}

#[test]
fn calc_failures_propagate_with_their_message() {
    fn boom(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        Err(GraphError::calc_failed("boom"))
    }

    fn caller(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
        ctx.read(&BOOM, &[])
    }

    static BOOM: MethodDescriptor = MethodDescriptor::new("boom", MethodFlags::NONE, boom);
    static CALLER: MethodDescriptor = MethodDescriptor::new("caller", MethodFlags::NONE, caller);
    static CLASS: Class = Class::new("Failing", &[&BOOM, &CALLER]);

    let mut g = CalcGraph::new();
    let obj = g.create_object(&CLASS);

    // The failure propagates through the intermediate evaluation unchanged.
    assert_eq!(
        g.value_of(obj, &CALLER, &[]),
        Err(GraphError::CalcFailed("boom".into()))
    );
    assert!(!g.is_computing());

    // Both nodes are left invalid; a later read retries the computation.
    let caller_node = g.lookup_node(obj, &CALLER, &[], true).unwrap().unwrap();
    assert!(!g.node_is_valid(caller_node).unwrap());
    assert_eq!(g.node_inputs(caller_node).unwrap().count(), 0);
}
