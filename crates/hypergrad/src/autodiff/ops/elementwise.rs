//! Tracked element-wise operations.

use std::rc::Rc;

use super::{record, tracked_ids};
use crate::autodiff::graph::{GradFn, NodeId};
use crate::autodiff::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::operations as kernels;

type Edges = Result<Vec<(NodeId, TrackedTensor)>, TensorError>;

#[derive(Debug)]
struct AddBackward {
    lhs: Option<NodeId>,
    rhs: Option<NodeId>,
}

impl GradFn for AddBackward {
    fn name(&self) -> &'static str {
        "AddBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        Ok(self
            .inputs()
            .into_iter()
            .map(|id| (id, grad_output.clone()))
            .collect())
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.lhs, self.rhs])
    }
}

/// Element-wise `a + b`.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::autodiff::{TrackedTensor, ops};
///
/// let a = TrackedTensor::leaf(DenseTensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
/// let b = TrackedTensor::new(DenseTensor::from_vec(vec![3.0, 4.0], &[2]).unwrap());
/// let c = ops::add(&a, &b).unwrap();
/// assert_eq!(c.data(), &[4.0, 6.0]);
/// assert!(c.requires_grad());
/// ```
pub fn add(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let value = kernels::apply_binary(a.tensor(), b.tensor(), |x, y| x + y)?;
    Ok(record(value, &[a, b], || {
        Rc::new(AddBackward {
            lhs: a.node_id(),
            rhs: b.node_id(),
        })
    }))
}

#[derive(Debug)]
struct SubBackward {
    lhs: Option<NodeId>,
    rhs: Option<NodeId>,
}

impl GradFn for SubBackward {
    fn name(&self) -> &'static str {
        "SubBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        let mut edges = Vec::with_capacity(2);
        if let Some(id) = self.lhs {
            edges.push((id, grad_output.clone()));
        }
        if let Some(id) = self.rhs {
            edges.push((id, neg(grad_output)));
        }
        Ok(edges)
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.lhs, self.rhs])
    }
}

/// Element-wise `a - b`.
pub fn sub(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let value = kernels::apply_binary(a.tensor(), b.tensor(), |x, y| x - y)?;
    Ok(record(value, &[a, b], || {
        Rc::new(SubBackward {
            lhs: a.node_id(),
            rhs: b.node_id(),
        })
    }))
}

#[derive(Debug)]
struct MulBackward {
    lhs: TrackedTensor,
    rhs: TrackedTensor,
}

impl GradFn for MulBackward {
    fn name(&self) -> &'static str {
        "MulBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        // d(a*b) = b da + a db; the saved operands stay tracked so the
        // products below are differentiable again under create_graph.
        let mut edges = Vec::with_capacity(2);
        if let Some(id) = self.lhs.node_id() {
            edges.push((id, mul(grad_output, &self.rhs)?));
        }
        if let Some(id) = self.rhs.node_id() {
            edges.push((id, mul(grad_output, &self.lhs)?));
        }
        Ok(edges)
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.lhs.node_id(), self.rhs.node_id()])
    }
}

/// Element-wise `a * b`.
pub fn mul(a: &TrackedTensor, b: &TrackedTensor) -> Result<TrackedTensor, TensorError> {
    let value = kernels::apply_binary(a.tensor(), b.tensor(), |x, y| x * y)?;
    Ok(record(value, &[a, b], || {
        Rc::new(MulBackward {
            lhs: a.clone(),
            rhs: b.clone(),
        })
    }))
}

#[derive(Debug)]
struct ScaleBackward {
    input: Option<NodeId>,
    alpha: f64,
}

impl GradFn for ScaleBackward {
    fn name(&self) -> &'static str {
        "ScaleBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        Ok(self
            .input
            .map(|id| (id, scale(grad_output, self.alpha)))
            .into_iter()
            .collect())
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input])
    }
}

/// `alpha * a`.
pub fn scale(a: &TrackedTensor, alpha: f64) -> TrackedTensor {
    let value = kernels::scale(a.tensor(), alpha);
    record(value, &[a], || {
        Rc::new(ScaleBackward {
            input: a.node_id(),
            alpha,
        })
    })
}

#[derive(Debug)]
struct NegBackward {
    input: Option<NodeId>,
}

impl GradFn for NegBackward {
    fn name(&self) -> &'static str {
        "NegBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        Ok(self
            .input
            .map(|id| (id, neg(grad_output)))
            .into_iter()
            .collect())
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input])
    }
}

/// Element-wise `-a`.
pub fn neg(a: &TrackedTensor) -> TrackedTensor {
    let value = kernels::scale(a.tensor(), -1.0);
    record(value, &[a], || Rc::new(NegBackward { input: a.node_id() }))
}

#[derive(Debug)]
struct PowBackward {
    base: TrackedTensor,
    exponent: f64,
}

impl GradFn for PowBackward {
    fn name(&self) -> &'static str {
        "PowBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        let Some(id) = self.base.node_id() else {
            return Ok(Vec::new());
        };
        let derivative = scale(&powf(&self.base, self.exponent - 1.0), self.exponent);
        Ok(vec![(id, mul(grad_output, &derivative)?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.base.node_id()])
    }
}

/// Element-wise `a^exponent`.
pub fn powf(a: &TrackedTensor, exponent: f64) -> TrackedTensor {
    let value = kernels::apply(a.tensor(), |x: f64| x.powf(exponent));
    record(value, &[a], || {
        Rc::new(PowBackward {
            base: a.clone(),
            exponent,
        })
    })
}

#[derive(Debug)]
struct ExpBackward {
    input: TrackedTensor,
}

impl GradFn for ExpBackward {
    fn name(&self) -> &'static str {
        "ExpBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        let Some(id) = self.input.node_id() else {
            return Ok(Vec::new());
        };
        Ok(vec![(id, mul(grad_output, &exp(&self.input))?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input.node_id()])
    }
}

/// Element-wise `e^a`.
pub fn exp(a: &TrackedTensor) -> TrackedTensor {
    let value = kernels::apply(a.tensor(), f64::exp);
    record(value, &[a], || Rc::new(ExpBackward { input: a.clone() }))
}

#[derive(Debug)]
struct LnBackward {
    input: TrackedTensor,
}

impl GradFn for LnBackward {
    fn name(&self) -> &'static str {
        "LnBackward"
    }

    fn backward(&self, grad_output: &TrackedTensor) -> Edges {
        let Some(id) = self.input.node_id() else {
            return Ok(Vec::new());
        };
        Ok(vec![(id, mul(grad_output, &powf(&self.input, -1.0))?)])
    }

    fn inputs(&self) -> Vec<NodeId> {
        tracked_ids(&[self.input.node_id()])
    }
}

/// Element-wise natural logarithm.
pub fn ln(a: &TrackedTensor) -> TrackedTensor {
    let value = kernels::apply(a.tensor(), f64::ln);
    record(value, &[a], || Rc::new(LnBackward { input: a.clone() }))
}
