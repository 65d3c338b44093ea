// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What-if pricing on a calc graph.
//!
//! A small position is priced off a settable spot; overlay scopes run shock scenarios
//! without disturbing the booked state, and a layer holds a divergent what-if book.
//! Run with `RUST_LOG=calc_graph=trace` to watch interning and invalidation.

use calc_graph::{
    CalcContext, CalcGraph, Class, GraphError, MethodDescriptor, MethodFlags, MethodRef,
};
use calc_value::Value;

fn want_f64(value: Value) -> Result<f64, GraphError> {
    value
        .as_f64()
        .ok_or_else(|| GraphError::calc_failed("expected a float"))
}

fn spot(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::F64(100.0))
}

fn quantity(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::F64(1.0))
}

fn notional(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let spot = want_f64(ctx.read(&SPOT, &[])?)?;
    let quantity = want_f64(ctx.read(&QUANTITY, &[])?)?;
    Ok(Value::F64(spot * quantity))
}

fn pnl(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let notional = want_f64(ctx.read(&NOTIONAL, &[])?)?;
    let cost = want_f64(ctx.read(&COST, &[])?)?;
    Ok(Value::F64(notional - cost))
}

fn cost(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::F64(0.0))
}

static SPOT: MethodDescriptor = MethodDescriptor::new(
    "spot",
    MethodFlags::SAVED.with(MethodFlags::OVERLAYABLE),
    spot,
);
static QUANTITY: MethodDescriptor =
    MethodDescriptor::new("quantity", MethodFlags::SAVED, quantity);
static COST: MethodDescriptor = MethodDescriptor::new("cost", MethodFlags::SAVED, cost);
static NOTIONAL: MethodDescriptor = MethodDescriptor::new("notional", MethodFlags::NONE, notional);
static PNL: MethodDescriptor = MethodDescriptor::new("pnl", MethodFlags::NONE, pnl);

static POSITION: Class = Class::new("Position", &[&SPOT, &QUANTITY, &COST, &NOTIONAL, &PNL]);

fn main() -> Result<(), GraphError> {
    env_logger::init();

    let mut g = CalcGraph::new();
    let position = g.create_object_with(
        &POSITION,
        &[
            (MethodRef::from(&SPOT), Value::F64(102.5)),
            (MethodRef::from(&QUANTITY), Value::F64(250.0)),
            (MethodRef::from(&COST), Value::F64(25_000.0)),
        ],
    )?;

    let pnl = g.bind(position, &PNL)?;
    println!("booked pnl: {:?}", pnl.call(&mut g, &[])?);

    // Shock scenarios: each overlay perturbs spot inside its scope only.
    for shock in [0.9, 1.0, 1.1] {
        let scenario = g.create_overlay();
        let mut scope = g.enter_overlay(scenario)?;
        scope.overlay(position, &SPOT, &[], Value::F64(102.5 * shock))?;
        let shocked = scope.value_of(position, &PNL, &[])?;
        println!("pnl at {shock:>4}x spot: {shocked:?}");
        drop(scope);
    }
    println!("booked pnl unchanged: {:?}", pnl.call(&mut g, &[])?);

    // A layer holds a divergent book: double the position without touching the base.
    let what_if = g.create_layer();
    let mut scope = g.enter_layer(what_if)?;
    scope.set(position, &QUANTITY, &[], Value::F64(500.0))?;
    println!("what-if pnl: {:?}", scope.value_of(position, &PNL, &[])?);
    drop(scope);
    println!("booked pnl unchanged: {:?}", pnl.call(&mut g, &[])?);

    // Saved state covers the settable, serializable methods.
    let state = g.saved_state(position)?;
    for (name, value) in state.iter() {
        println!("saved {name} = {value:?}");
    }
    Ok(())
}
