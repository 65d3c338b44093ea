// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use calc_graph::{CalcContext, CalcGraph, Class, GraphError, MethodDescriptor, MethodFlags};
use calc_value::{ObjId, Value};

/// Entry point for `calc_graph` wind-tunnel benchmarks.
///
/// The scenarios highlight how invalidation and recomputation behave over different graph
/// shapes (chains, fanout) and how much the scope machinery (overlays, layers) costs per
/// round trip.
fn bench_graph(c: &mut Criterion) {
    bench_chain_rerun(c);
    bench_chain_memoized_read(c);
    bench_fanout_rerun(c);
    bench_overlay_round_trip(c);
    bench_layer_what_if(c);
}

fn want_i64(value: Value) -> Result<i64, GraphError> {
    value
        .as_i64()
        .ok_or_else(|| GraphError::calc_failed("expected an integer"))
}

fn base(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
    Ok(Value::I64(1))
}

/// `chain(i)` reads `chain(i - 1)`, bottoming out at `base`. One descriptor, one node per
/// argument tuple.
fn chain(ctx: &mut CalcContext<'_>, args: &[Value]) -> Result<Value, GraphError> {
    let i = want_i64(args[0].clone())?;
    let below = if i == 0 {
        ctx.read(&BASE, &[])?
    } else {
        ctx.read(&CHAIN, &[Value::I64(i - 1)])?
    };
    Ok(Value::I64(want_i64(below)? + 1))
}

/// `fan(i)` reads `base`; every fan node is a direct dependent.
fn fan(ctx: &mut CalcContext<'_>, args: &[Value]) -> Result<Value, GraphError> {
    let i = want_i64(args[0].clone())?;
    let base = want_i64(ctx.read(&BASE, &[])?)?;
    Ok(Value::I64(base + i))
}

static BASE: MethodDescriptor = MethodDescriptor::new(
    "base",
    MethodFlags::SETTABLE.with(MethodFlags::OVERLAYABLE),
    base,
);
static CHAIN: MethodDescriptor = MethodDescriptor::new("chain", MethodFlags::NONE, chain);
static FAN: MethodDescriptor = MethodDescriptor::new("fan", MethodFlags::NONE, fan);
static BENCH: Class = Class::new("Bench", &[&BASE, &CHAIN, &FAN]);

fn build_chain_graph(len: i64) -> (CalcGraph, ObjId) {
    let mut g = CalcGraph::new();
    let obj = g.create_object(&BENCH);
    g.value_of(obj, &CHAIN, &[Value::I64(len - 1)]).unwrap();
    (g, obj)
}

/// Linear chain where every node depends on the previous one.
///
/// Measures a root set that forces the entire chain to recompute on the next read.
fn bench_chain_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_rerun");
    for &len in &[10_i64, 100, 1_000] {
        let (mut g, obj) = build_chain_graph(len);
        let top = [Value::I64(len - 1)];
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            let mut v = 0_i64;
            b.iter(|| {
                v = v.wrapping_add(1);
                g.set(obj, &BASE, &[], Value::I64(black_box(v))).unwrap();
                g.value_of(obj, &CHAIN, &top).unwrap()
            });
        });
    }
    group.finish();
}

/// Steady-state cost of reading a fully memoized chain top.
///
/// This should be near-constant (it does not walk the chain) and acts as the cache-hit
/// baseline.
fn bench_chain_memoized_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_memoized_read");
    for &len in &[10_i64, 100, 1_000] {
        let (mut g, obj) = build_chain_graph(len);
        let top = [Value::I64(len - 1)];
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| g.value_of(obj, &CHAIN, &top).unwrap());
        });
    }
    group.finish();
}

/// One shared input with `n` direct dependents: a set invalidates the whole fan, the next
/// sweep recomputes it.
fn bench_fanout_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_rerun");
    for &n in &[10_i64, 100, 1_000] {
        let mut g = CalcGraph::new();
        let obj = g.create_object(&BENCH);
        for i in 0..n {
            g.value_of(obj, &FAN, &[Value::I64(i)]).unwrap();
        }
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let mut v = 0_i64;
            b.iter(|| {
                v = v.wrapping_add(1);
                g.set(obj, &BASE, &[], Value::I64(black_box(v))).unwrap();
                for i in 0..n {
                    g.value_of(obj, &FAN, &[Value::I64(i)]).unwrap();
                }
            });
        });
    }
    group.finish();
}

/// Full overlay cycle against a warm chain: enter, bind the root, read the top, exit.
///
/// Captures the cost of apply/revert plus the two invalidation sweeps a scope implies.
fn bench_overlay_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay_round_trip");
    for &len in &[10_i64, 100] {
        let (mut g, obj) = build_chain_graph(len);
        let top = [Value::I64(len - 1)];
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            let mut v = 0_i64;
            b.iter(|| {
                v = v.wrapping_add(1);
                let ov = g.create_overlay();
                let mut scope = g.enter_overlay(ov).unwrap();
                scope
                    .overlay(obj, &BASE, &[], Value::I64(black_box(v)))
                    .unwrap();
                let shocked = scope.value_of(obj, &CHAIN, &top).unwrap();
                drop(scope);
                shocked
            });
        });
    }
    group.finish();
}

/// Divergent what-if book: enter a layer, fork the root with a set, read the top, exit.
///
/// The layer is created once and re-entered per iteration, so this measures the steady-state
/// scope cycle rather than first-fork interning.
fn bench_layer_what_if(c: &mut Criterion) {
    let mut group = c.benchmark_group("layer_what_if");
    for &len in &[10_i64, 100] {
        let (mut g, obj) = build_chain_graph(len);
        let layer = g.create_layer();
        let top = [Value::I64(len - 1)];
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            let mut v = 0_i64;
            b.iter(|| {
                v = v.wrapping_add(1);
                let mut scope = g.enter_layer(layer).unwrap();
                scope
                    .set(obj, &BASE, &[], Value::I64(black_box(v)))
                    .unwrap();
                let what_if = scope.value_of(obj, &CHAIN, &top).unwrap();
                drop(scope);
                what_if
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_graph);
criterion_main!(benches);
