//! Tracked tensor operations.
//!
//! Each operation computes its value with the untracked kernels in
//! `crate::operations` and, when grad mode is on and an operand requires
//! grad, records a node whose backward rule is itself built from these
//! operations.

mod elementwise;
mod linalg;
mod reduction;

use std::rc::Rc;

pub use elementwise::{add, exp, ln, mul, neg, powf, scale, sub};
pub use linalg::{matmul, transpose};
pub use reduction::{dot, expand, reshape, sum};

use super::graph::{GradFn, NodeId, is_grad_enabled, with_graph};
use super::tensor::TrackedTensor;
use crate::tensor::DenseTensor;

/// Wrap a forward value, recording `grad_fn` if any operand is tracked.
///
/// `grad_fn` is only built when a node is actually recorded.
fn record<F>(value: DenseTensor<f64>, operands: &[&TrackedTensor], grad_fn: F) -> TrackedTensor
where
    F: FnOnce() -> Rc<dyn GradFn>,
{
    if !is_grad_enabled() || !operands.iter().any(|t| t.requires_grad()) {
        return TrackedTensor::new(value);
    }
    let node = with_graph(|g| g.create_node(grad_fn()));
    TrackedTensor::from_node(value, node)
}

/// Node ids of the operands that are tracked.
fn tracked_ids(operands: &[Option<NodeId>]) -> Vec<NodeId> {
    operands.iter().flatten().copied().collect()
}
