// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixture class for the conformance tests.
//!
//! `Quote` models the shapes the scenarios need: a settable, overlayable input (`x`), two
//! computed dependents (`y = x + 1`, `z = x * 2`), and a second-level dependent
//! (`w = y + z`). Tests that need bodies with their own state (call counters, deliberate
//! failures, in-evaluation writes) declare those descriptors locally instead.

use calc_graph::{CalcContext, Class, GraphError, MethodDescriptor, MethodFlags};
use calc_value::Value;

pub(crate) fn want_i64(value: Value) -> Result<i64, GraphError> {
    value
        .as_i64()
        .ok_or_else(|| GraphError::calc_failed("expected an integer"))
}

fn x(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::I64(5))
}

fn y(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let x = want_i64(ctx.read(&X, &[])?)?;
    Ok(Value::I64(x + 1))
}

fn z(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let x = want_i64(ctx.read(&X, &[])?)?;
    Ok(Value::I64(x * 2))
}

fn w(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let y = want_i64(ctx.read(&Y, &[])?)?;
    let z = want_i64(ctx.read(&Z, &[])?)?;
    Ok(Value::I64(y + z))
}

pub(crate) static X: MethodDescriptor = MethodDescriptor::new(
    "x",
    MethodFlags::SAVED.with(MethodFlags::OVERLAYABLE),
    x,
);
pub(crate) static Y: MethodDescriptor = MethodDescriptor::new("y", MethodFlags::NONE, y);
pub(crate) static Z: MethodDescriptor = MethodDescriptor::new("z", MethodFlags::NONE, z);
pub(crate) static W: MethodDescriptor = MethodDescriptor::new("w", MethodFlags::NONE, w);

pub(crate) static QUOTE: Class = Class::new("Quote", &[&X, &Y, &Z, &W]);
