// Copyright 2026 the Calc Graph Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Graph operation errors.

use alloc::boxed::Box;
use core::fmt;

/// Errors raised by graph operations.
///
/// Validation is performed before any mutation or invalidation, so a failed operation never
/// leaves the graph in a partially updated state. The one exception is a failing user
/// computation ([`GraphError::CalcFailed`] or any error a calc function chooses to return):
/// the node that was being computed is left invalid with an empty input set, and the
/// evaluator's active-node slot is restored on the way out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
    /// A write operation was attempted against a method that lacks the required capability.
    NotPermitted {
        /// Name of the method that rejected the operation.
        method: &'static str,
    },
    /// A mutation was attempted while a value is being computed.
    EvaluationActive,
    /// An overlay operation was attempted without an enclosing overlay scope.
    NoActiveScope,
    /// An overlay value was read that does not exist.
    NoOverlayPresent,
    /// A node was explicitly created in a layer that already owns one for the key.
    DuplicateNode {
        /// Name of the method whose node already exists.
        method: &'static str,
    },
    /// A recognized but not-yet-implemented pathway was invoked.
    Unsupported {
        /// Short description of the unimplemented pathway.
        what: &'static str,
    },
    /// An id did not resolve within this graph, or a method does not belong to the owner's
    /// class.
    BadHandle,
    /// A user computation failed.
    CalcFailed(Box<str>),
}

impl GraphError {
    /// Constructs a [`GraphError::CalcFailed`] from any message.
    #[inline]
    pub fn calc_failed(detail: impl Into<Box<str>>) -> Self {
        Self::CalcFailed(detail.into())
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPermitted { method } => {
                write!(f, "operation not permitted on method: {method}")
            }
            Self::EvaluationActive => {
                write!(f, "graph mutation attempted during evaluation")
            }
            Self::NoActiveScope => write!(f, "no overlay scope is active"),
            Self::NoOverlayPresent => write!(f, "no overlay value is present"),
            Self::DuplicateNode { method } => {
                write!(f, "node already exists in this layer: method={method}")
            }
            Self::Unsupported { what } => write!(f, "unsupported operation: {what}"),
            Self::BadHandle => write!(f, "bad graph handle"),
            Self::CalcFailed(detail) => write!(f, "calculation failed: {detail}"),
        }
    }
}

impl core::error::Error for GraphError {}
