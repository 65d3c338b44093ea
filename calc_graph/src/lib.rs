// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental, demand-driven computation over a dynamic dependency graph of memoized
//! methods.
//!
//! Objects declare methods as graph-enabled via [`MethodDescriptor`] tables; reading one
//! method from another implicitly registers a dependency edge; writes invalidate the
//! transitive closure of dependents; and layered scopes ([`LayerScope`], [`OverlayScope`])
//! evaluate the graph under temporary, precisely unwound perturbations without mutating the
//! underlying state.
//!
//! ## Model
//!
//! - A **node** memoizes one `(object, method, args)` computation. Edges between nodes are
//!   discovered dynamically: whatever a method reads during evaluation becomes its inputs.
//! - A **set** value suppresses recomputation until cleared; an **overlay** value does the
//!   same within a scope and is reverted on exit. Precedence is overlaid, then set, then
//!   computed. Set and overlaid nodes are invalidation frontiers.
//! - **Layers** nest node stores: reads resolve through the parent chain, writes fork into
//!   the active layer on first mutation.
//!
//! Evaluation is single-threaded and synchronous; while a value is being computed, every
//! mutation fails with [`GraphError::EvaluationActive`]. The dependency graph must stay
//! acyclic — that is the caller's contract, and cycles are not diagnosed.
//!
//! ## Example
//!
//! ```
//! use calc_graph::{CalcContext, CalcGraph, Class, GraphError, MethodDescriptor, MethodFlags};
//! use calc_value::Value;
//!
//! fn spot(_ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
//!     Ok(Value::F64(42.0))
//! }
//!
//! fn price(ctx: &mut CalcContext<'_>, _args: &[Value]) -> Result<Value, GraphError> {
//!     let spot = ctx.read(&SPOT, &[])?.as_f64().unwrap_or(0.0);
//!     Ok(Value::F64(spot * 2.0))
//! }
//!
//! static SPOT: MethodDescriptor = MethodDescriptor::new(
//!     "spot",
//!     MethodFlags::SAVED.with(MethodFlags::OVERLAYABLE),
//!     spot,
//! );
//! static PRICE: MethodDescriptor = MethodDescriptor::new("price", MethodFlags::NONE, price);
//! static INSTRUMENT: Class = Class::new("Instrument", &[&SPOT, &PRICE]);
//!
//! fn main() -> Result<(), GraphError> {
//!     let mut g = CalcGraph::new();
//!     let obj = g.create_object(&INSTRUMENT);
//!     assert_eq!(g.value_of(obj, &PRICE, &[])?, Value::F64(84.0));
//!
//!     // Setting an input invalidates its dependents.
//!     g.set(obj, &SPOT, &[], Value::F64(10.0))?;
//!     assert_eq!(g.value_of(obj, &PRICE, &[])?, Value::F64(20.0));
//!
//!     // Overlays perturb values only within their scope.
//!     let what_if = g.create_overlay();
//!     {
//!         let mut scope = g.enter_overlay(what_if)?;
//!         scope.overlay(obj, &SPOT, &[], Value::F64(7.0))?;
//!         assert_eq!(scope.value_of(obj, &PRICE, &[])?, Value::F64(14.0));
//!     }
//!     assert_eq!(g.value_of(obj, &PRICE, &[])?, Value::F64(20.0));
//!     Ok(())
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod bind;
pub mod descriptor;
pub mod error;
pub mod eval;
pub mod graph;
pub mod key;
pub mod layer;
pub mod node;
pub mod overlay;
pub mod state;
pub mod visit;

mod invalidate;
#[cfg(test)]
mod test_support;

pub use bind::{BoundMethod, Class};
pub use descriptor::{CalcFn, DelegateFn, MethodDescriptor, MethodFlags, MethodRef, NodeChange};
pub use error::GraphError;
pub use eval::CalcContext;
pub use graph::CalcGraph;
pub use key::{LayerId, NodeId, NodeKey, OverlayId};
pub use layer::LayerScope;
pub use node::NodeFlags;
pub use overlay::OverlayScope;
pub use state::SavedState;
pub use visit::{Walk, WalkDirection};
