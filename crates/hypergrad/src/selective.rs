//! Selective gradients: differentiate with respect to the inputs the caller
//! marked, and keep a placeholder in the slot of every other input.
//!
//! Useful when a parameter list mixes trainable tensors with frozen ones, as
//! in hypergradient and meta-learning loops, and the caller wants results
//! aligned with the full list.
//!
//! # Example
//!
//! ```
//! use hypergrad::autodiff::{TrackedTensor, ops};
//! use hypergrad::{DenseTensor, GradInput, GradOptions, GradSlot, selective_grad};
//!
//! let a = TrackedTensor::new(DenseTensor::scalar(2.0));
//! let b = TrackedTensor::leaf(DenseTensor::scalar(3.0));
//! let f = ops::mul(&a, &b).unwrap();
//!
//! let inputs = [GradInput::from_tensor(&a), GradInput::from_tensor(&b)];
//! let grads = selective_grad(&[&f], &inputs, None, &GradOptions::default()).unwrap();
//!
//! assert!(grads[0].is_placeholder());
//! assert_eq!(grads[1].as_grad().unwrap().data(), &[2.0]);
//! ```

use log::debug;

use crate::autodiff::{GradOptions, TrackedTensor, grad};
use crate::error::TensorError;
use crate::tensor::DenseTensor;

/// An input paired with the caller's decision to differentiate it.
#[derive(Debug, Clone, Copy)]
pub struct GradInput<'a> {
    tensor: &'a TrackedTensor,
    track_grad: bool,
}

impl<'a> GradInput<'a> {
    pub fn new(tensor: &'a TrackedTensor, track_grad: bool) -> Self {
        Self { tensor, track_grad }
    }

    pub fn tracked(tensor: &'a TrackedTensor) -> Self {
        Self::new(tensor, true)
    }

    pub fn untracked(tensor: &'a TrackedTensor) -> Self {
        Self::new(tensor, false)
    }

    /// Track exactly when the tensor requires grad.
    pub fn from_tensor(tensor: &'a TrackedTensor) -> Self {
        Self::new(tensor, tensor.requires_grad())
    }

    pub fn tensor(&self) -> &'a TrackedTensor {
        self.tensor
    }

    pub fn track_grad(&self) -> bool {
        self.track_grad
    }
}

/// One entry of a selective gradient result.
#[derive(Debug, Clone)]
pub enum GradSlot {
    /// Gradient with the shape of its input.
    Grad(TrackedTensor),
    /// The input was not differentiated, or had no gradient path.
    ///
    /// Stands for numeric zero but is not a computed zero gradient.
    Placeholder,
}

impl GradSlot {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, GradSlot::Placeholder)
    }

    pub fn as_grad(&self) -> Option<&TrackedTensor> {
        match self {
            GradSlot::Grad(g) => Some(g),
            GradSlot::Placeholder => None,
        }
    }

    pub fn into_grad(self) -> Option<TrackedTensor> {
        match self {
            GradSlot::Grad(g) => Some(g),
            GradSlot::Placeholder => None,
        }
    }

    /// The gradient values, or zeros of `shape` for a placeholder.
    pub fn to_dense_or_zeros(&self, shape: &[usize]) -> DenseTensor<f64> {
        match self {
            GradSlot::Grad(g) => g.tensor().clone(),
            GradSlot::Placeholder => DenseTensor::zeros(shape),
        }
    }
}

impl From<Option<TrackedTensor>> for GradSlot {
    fn from(grad: Option<TrackedTensor>) -> Self {
        grad.map_or(GradSlot::Placeholder, GradSlot::Grad)
    }
}

/// Gradients of `outputs` with respect to the tracked subset of `inputs`.
///
/// The result has one slot per input, in input order. Untracked inputs get
/// [`GradSlot::Placeholder`]; tracked inputs get what [`grad`] returns for
/// them, with `None` (only possible under `options.allow_unused`) also
/// becoming a placeholder. The engine is called once, on the tracked inputs
/// only, and is not called at all when there are none.
///
/// # Errors
///
/// Engine errors are passed through unchanged, except that input positions
/// in `NotDifferentiable` and `UnusedInput` refer to `inputs`, not to the
/// tracked subset.
pub fn selective_grad(
    outputs: &[&TrackedTensor],
    inputs: &[GradInput<'_>],
    grad_outputs: Option<&[&TrackedTensor]>,
    options: &GradOptions,
) -> Result<Vec<GradSlot>, TensorError> {
    let positions: Vec<usize> = inputs
        .iter()
        .enumerate()
        .filter(|(_, input)| input.track_grad())
        .map(|(i, _)| i)
        .collect();

    let mut slots = vec![GradSlot::Placeholder; inputs.len()];
    if positions.is_empty() {
        debug!(
            "selective_grad: none of {} inputs tracked, skipping backward pass",
            inputs.len()
        );
        return Ok(slots);
    }

    let subset: Vec<&TrackedTensor> = positions.iter().map(|&i| inputs[i].tensor()).collect();
    let grads = grad(outputs, &subset, grad_outputs, options).map_err(|err| match err {
        TensorError::NotDifferentiable {
            role: "inputs",
            index,
        } => TensorError::NotDifferentiable {
            role: "inputs",
            index: positions[index],
        },
        TensorError::UnusedInput { index } => TensorError::UnusedInput {
            index: positions[index],
        },
        other => other,
    })?;

    for (&position, g) in positions.iter().zip(grads) {
        slots[position] = g.into();
    }
    debug!(
        "selective_grad: {} of {} inputs differentiated",
        positions.len(),
        inputs.len()
    );
    Ok(slots)
}
