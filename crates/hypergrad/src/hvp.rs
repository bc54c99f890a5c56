//! Hessian-vector products through double backward.

use log::debug;

use crate::autodiff::{GradOptions, TrackedTensor, ops, release_graph};
use crate::error::TensorError;
use crate::selective::{GradInput, GradSlot, selective_grad};
use crate::tensor::DenseTensor;

/// Hessian of a scalar `output` times `vectors`, one block per input.
///
/// Computes `g = ∇f` with a recorded graph, then differentiates
/// `Σ_i <g_i, v_i>` again. Untracked inputs yield [`GradSlot::Placeholder`].
/// A tracked input whose gradient does not depend on any tracked input gets
/// zeros, since its Hessian row is zero.
///
/// `options.allow_unused` applies to the first pass; `options.retain_graph`
/// and `options.create_graph` apply to the second. The first pass always
/// keeps its graph for the second one; unless `options` retains the graph,
/// the forward nodes it walked are released once both passes are done.
///
/// # Errors
///
/// - `SeedCountMismatch` if `vectors` and `inputs` differ in length
/// - `IncompatibleShapes` if a vector does not match its input's shape
/// - any error of [`selective_grad`]
///
/// # Example
///
/// ```
/// use hypergrad::autodiff::{TrackedTensor, ops};
/// use hypergrad::hvp::hessian_vector_product;
/// use hypergrad::{DenseTensor, GradInput, GradOptions};
///
/// // f(x) = sum(x^3), H = diag(6x)
/// let x = TrackedTensor::leaf(DenseTensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
/// let f = ops::sum(&ops::powf(&x, 3.0));
/// let v = DenseTensor::from_vec(vec![1.0, 0.5], &[2]).unwrap();
///
/// let hv = hessian_vector_product(&f, &[GradInput::tracked(&x)], &[v], &GradOptions::default())
///     .unwrap();
/// assert_eq!(hv[0].as_grad().unwrap().data(), &[6.0, 6.0]);
/// ```
pub fn hessian_vector_product(
    output: &TrackedTensor,
    inputs: &[GradInput<'_>],
    vectors: &[DenseTensor<f64>],
    options: &GradOptions,
) -> Result<Vec<GradSlot>, TensorError> {
    if vectors.len() != inputs.len() {
        return Err(TensorError::SeedCountMismatch {
            expected: inputs.len(),
            actual: vectors.len(),
        });
    }
    for (input, vector) in inputs.iter().zip(vectors) {
        input.tensor().tensor().ensure_same_shape(vector)?;
    }

    let first_pass = options.with_create_graph(true).with_retain_graph(true);
    let first = selective_grad(&[output], inputs, None, &first_pass)?;

    // Constant gradients contribute nothing to the second pass.
    let mut inner: Option<TrackedTensor> = None;
    for (slot, vector) in first.iter().zip(vectors) {
        let Some(g) = slot.as_grad().filter(|g| g.requires_grad()) else {
            continue;
        };
        let term = ops::dot(g, &TrackedTensor::new(vector.clone()))?;
        inner = Some(match inner {
            Some(acc) => ops::add(&acc, &term)?,
            None => term,
        });
    }

    let second = match &inner {
        Some(inner) => {
            let second_pass = options.with_allow_unused(true);
            selective_grad(&[inner], inputs, None, &second_pass)?
        }
        None => {
            debug!("hessian_vector_product: gradient is constant in every input");
            vec![GradSlot::Placeholder; inputs.len()]
        }
    };

    if !options.retains_graph() {
        let tracked: Vec<&TrackedTensor> = inputs
            .iter()
            .filter(|input| input.track_grad())
            .map(|input| input.tensor())
            .collect();
        let released = release_graph(&[output], &tracked)?;
        debug!("hessian_vector_product: released {released} forward nodes");
    }

    Ok(inputs
        .iter()
        .zip(second)
        .map(|(input, slot)| match slot {
            GradSlot::Placeholder if input.track_grad() => GradSlot::Grad(TrackedTensor::new(
                DenseTensor::zeros(input.tensor().shape()),
            )),
            slot => slot,
        })
        .collect())
}
