//! Tracked reductions and shape changes.

use std::rc::Rc;

use super::{mul, record, tracked_ids};
use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations as kernels;

#[derive(Debug)]
struct SumBackward {
    input: Option<NodeId>,
    input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn name(&self) -> &'static str {
        "SumBackward"
    }

    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        match self.input {
            Some(id) => Ok(vec![(id, expand(grad_output, &self.input_shape)?)]),
            None => Ok(Vec::new()),
        }
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input])
    }
}

/// Sum of all elements, as a tensor of shape `[1]`.
pub fn sum(a: &TrackedTensor) -> TrackedTensor {
    let value = kernels::sum(a.tensor());
    record(value, &[a], || {
        Rc::new(SumBackward {
            input: a.node_id(),
            input_shape: a.shape().to_vec(),
        })
    })
}

#[derive(Debug)]
struct ExpandBackward {
    input: Option<NodeId>,
    input_shape: Vec<usize>,
}

impl GradFn for ExpandBackward {
    fn name(&self) -> &'static str {
        "ExpandBackward"
    }

    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        match self.input {
            Some(id) => Ok(vec![(id, reshape(&sum(grad_output), &self.input_shape)?)]),
            None => Ok(Vec::new()),
        }
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input])
    }
}

/// Broadcast a one-element tensor to `shape`.
pub fn expand(a: &TrackedTensor, shape: &[usize]) -> Result<TrackedTensor, TensorError> {
    let value = kernels::expand(a.tensor(), shape)?;
    Ok(record(value, &[a], || {
        Rc::new(ExpandBackward {
            input: a.node_id(),
            input_shape: a.shape().to_vec(),
        })
    }))
}

#[derive(Debug)]
struct ReshapeBackward {
    input: Option<NodeId>,
    input_shape: Vec<usize>,
}

impl GradFn for ReshapeBackward {
    fn name(&self) -> &'static str {
        "ReshapeBackward"
    }

    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError> {
        match self.input {
            Some(id) => Ok(vec![(id, reshape(grad_output, &self.input_shape)?)]),
            None => Ok(Vec::new()),
        }
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input])
    }
}

/// Same elements under a new shape.
pub fn reshape(a: &TrackedTensor, shape: &[usize]) -> Result<TrackedTensor, TensorError> {
    let value = a.tensor().reshape(shape)?;
    Ok(record(value, &[a], || {
        Rc::new(ReshapeBackward {
            input: a.node_id(),
            input_shape: a.shape().to_vec(),
        })
    }))
}

/// Inner product `sum(a * b)` of two tensors with the same shape.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::autodiff::{TrackedTensor, ops};
///
/// let a = TrackedTensor::new(DenseTensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap());
/// let b = TrackedTensor::new(DenseTensor::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap());
/// assert_eq!(ops::dot(&a, &b).unwrap().item(), Some(32.0));
/// ```
pub fn dot(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    Ok(sum(&mul(a, b)?))
}
