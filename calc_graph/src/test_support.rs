// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the crate's unit tests: one class exercising every method shape.

use calc_value::Value;

use crate::bind::Class;
use crate::descriptor::{MethodDescriptor, MethodFlags};
use crate::error::GraphError;
use crate::eval::CalcContext;

fn want_i64(value: Value) -> Result<i64, GraphError> {
    value
        .as_i64()
        .ok_or_else(|| GraphError::calc_failed("expected an integer"))
}

fn spot(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::I64(100))
}

fn double(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let spot = want_i64(ctx.read(&SPOT, &[])?)?;
    Ok(Value::I64(spot * 2))
}

fn quad(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let double = want_i64(ctx.read(&DOUBLE, &[])?)?;
    let _spot = ctx.read(&SPOT, &[])?;
    Ok(Value::I64(double * 2))
}

fn constant(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::I64(7))
}

fn plain(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::I64(5))
}

fn flag(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::Bool(false))
}

fn left(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::I64(1))
}

fn right(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::I64(2))
}

fn pick(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let which = ctx.read(&FLAG, &[])?.as_bool().unwrap_or(false);
    if which {
        ctx.read(&LEFT, &[])
    } else {
        ctx.read(&RIGHT, &[])
    }
}

fn failing(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    let _ = ctx.read(&SPOT, &[])?;
    Err(GraphError::calc_failed("deliberate failure"))
}

pub(crate) static SPOT: MethodDescriptor = MethodDescriptor::new(
    "spot",
    MethodFlags::SAVED.with(MethodFlags::OVERLAYABLE),
    spot,
);
pub(crate) static DOUBLE: MethodDescriptor =
    MethodDescriptor::new("double", MethodFlags::NONE, double);
pub(crate) static QUAD: MethodDescriptor = MethodDescriptor::new("quad", MethodFlags::NONE, quad);
pub(crate) static CONSTANT: MethodDescriptor =
    MethodDescriptor::new("constant", MethodFlags::NONE, constant);
pub(crate) static PLAIN: MethodDescriptor =
    MethodDescriptor::new("plain", MethodFlags::SETTABLE, plain);
pub(crate) static FLAG: MethodDescriptor =
    MethodDescriptor::new("flag", MethodFlags::SETTABLE, flag);
pub(crate) static LEFT: MethodDescriptor =
    MethodDescriptor::new("left", MethodFlags::SETTABLE, left);
pub(crate) static RIGHT: MethodDescriptor =
    MethodDescriptor::new("right", MethodFlags::SETTABLE, right);
pub(crate) static PICK: MethodDescriptor = MethodDescriptor::new("pick", MethodFlags::NONE, pick);
pub(crate) static FAILING: MethodDescriptor =
    MethodDescriptor::new("failing", MethodFlags::NONE, failing);

static TEST_CLASS: Class = Class::new(
    "Test",
    &[
        &SPOT, &DOUBLE, &QUAD, &CONSTANT, &PLAIN, &FLAG, &LEFT, &RIGHT, &PICK, &FAILING,
    ],
);

/// Namespace for the shared test class.
pub(crate) struct TestClass;

impl TestClass {
    pub(crate) const CLASS: &'static Class = &TEST_CLASS;
}
