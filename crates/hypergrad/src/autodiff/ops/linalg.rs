//! Tracked matrix operations.

use std::rc::Rc;

use super::{record, tracked_ids};
use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations as kernels;

#[derive(Debug)]
struct TransposeBackward {
    input: Option<NodeId>,
}

impl GradFn for TransposeBackward {
    fn name(&self) -> &'static str {
        "TransposeBackward"
    }

    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        match self.input {
            Some(id) => Ok(vec![(id, transpose(grad_output)?)]),
            None => Ok(Vec::new()),
        }
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input])
    }
}

/// Transpose of a rank-2 tensor.
pub fn transpose(a: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let value = kernels::transpose(a.tensor())?;
    Ok(record(value, &[a], || {
        Rc::new(TransposeBackward { input: a.node_id() })
    }))
}

/// Backward function for matrix multiplication.
///
/// Saves both operands from the forward pass.
#[derive(Debug)]
struct MatmulBackward {
    lhs: TrackedTensor,
    rhs: TrackedTensor,
}

impl GradFn for MatmulBackward {
    fn name(&self) -> &'static str {
        "MatmulBackward"
    }

    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        // C = A B  =>  dA = dC B^T,  dB = A^T dC
        let mut edges = Vec::with_capacity(2);
        if let Some(id) = self.lhs.node_id() {
            edges.push((id, matmul(grad_output, &transpose(&self.rhs)?)?));
        }
        if let Some(id) = self.rhs.node_id() {
            edges.push((id, matmul(&transpose(&self.lhs)?, grad_output)?));
        }
        Ok(edges)
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.lhs.node_id(), self.rhs.node_id()])
    }
}

/// Tracked matrix product of rank-2 tensors.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::autodiff::{TrackedTensor, ops};
///
/// let a = TrackedTensor::leaf(DenseTensor::ones(&[2, 3]));
/// let b = TrackedTensor::new(DenseTensor::ones(&[3, 4]));
/// let c = ops::matmul(&a, &b).unwrap();
///
/// assert_eq!(c.shape(), &[2, 4]);
/// assert!(c.requires_grad());
/// ```
pub fn matmul(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let value = kernels::matmul(a.tensor(), b.tensor())?;
    Ok(record(value, &[a, b], || {
        Rc::new(MatmulBackward {
            lhs: a.clone(),
            rhs: b.clone(),
        })
    }))
}
