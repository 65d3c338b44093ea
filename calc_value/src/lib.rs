// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime value model shared by the calc graph crates.
//!
//! Values double as node-key arguments, so equality and hashing are total (see
//! [`Value`] for the float caveat). The crate is `no_std + alloc` friendly.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod value;

pub use value::{ObjId, Value};
