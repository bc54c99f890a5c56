//! Element-wise tensor operations.

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

/// Apply a function to each element, returning a new tensor.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::operations::apply;
///
/// let t = DenseTensor::from_vec(vec![1.0, 4.0, 9.0], &[3]).unwrap();
/// let ts = apply(&t, |x: f64| x.sqrt());
/// assert!((ts.data()[2] - 3.0).abs() < 1e-10);
/// ```
pub fn apply<ElT: Scalar, F>(tensor: &DenseTensor<ElT>, f: F) -> DenseTensor<ElT>
where
    F: Fn(ElT) -> ElT,
{
    let data: Vec<ElT> = tensor.data().iter().map(|&x| f(x)).collect();
    DenseTensor::from_vec(data, tensor.shape()).expect("apply: shape unchanged")
}

/// Combine two tensors of identical shape element-wise.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::operations::apply_binary;
///
/// let a = DenseTensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
/// let b = DenseTensor::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap();
/// let c = apply_binary(&a, &b, |x, y| x + y).unwrap();
/// assert_eq!(c.data(), &[5.0, 7.0, 9.0]);
/// ```
pub fn apply_binary<ElT: Scalar, F>(
    a: &DenseTensor<ElT>,
    b: &DenseTensor<ElT>,
    f: F,
) -> Result<DenseTensor<ElT>, TensorError>
where
    F: Fn(ElT, ElT) -> ElT,
{
    a.ensure_same_shape(b)?;
    let data: Vec<ElT> = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| f(x, y))
        .collect();
    DenseTensor::from_vec(data, a.shape())
}

/// Multiply all elements by a scalar.
pub fn scale(tensor: &DenseTensor<f64>, alpha: f64) -> DenseTensor<f64> {
    apply(tensor, |x| x * alpha)
}

/// Sum of all elements as a one-element tensor of shape `[1]`.
pub fn sum(tensor: &DenseTensor<f64>) -> DenseTensor<f64> {
    DenseTensor::scalar(tensor.data().iter().sum())
}

/// Broadcast a one-element tensor to `shape`.
pub fn expand(tensor: &DenseTensor<f64>, shape: &[usize]) -> Result<DenseTensor<f64>, TensorError> {
    let value = tensor.item().ok_or_else(|| {
        TensorError::InvalidOperation(format!(
            "expand requires a one-element tensor, got shape {:?}",
            tensor.shape()
        ))
    })?;
    Ok(DenseTensor::full(shape, value))
}

/// Inner product of two tensors of identical shape.
pub fn dot(a: &DenseTensor<f64>, b: &DenseTensor<f64>) -> Result<f64, TensorError> {
    a.ensure_same_shape(b)?;
    Ok(a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum())
}
