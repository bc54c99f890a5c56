//! Dense n-dimensional tensor.
//!
//! Data is stored flat in column-major order, the layout faer expects, so
//! 2-D tensors can be handed to faer's matmul without copying.

use crate::error::TensorError;
use crate::scalar::Scalar;

/// A dense n-dimensional tensor in column-major order.
///
/// A tensor with an empty shape (`[]`) holds a single element and is treated
/// as a scalar, as is any tensor with exactly one element. A shape with a
/// zero extent, such as `[0]` or `[2, 0]`, holds no elements.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor<ElT: Scalar> {
    data: Vec<ElT>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

/// Column-major strides: `[1, d0, d0*d1, ...]`.
fn column_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1;
    for &dim in shape {
        strides.push(stride);
        stride *= dim;
    }
    strides
}

/// Number of stored elements for a shape.
///
/// The empty shape `[]` stores one element; any zero extent stores none.
pub(crate) fn storage_len(shape: &[usize]) -> usize {
    if shape.is_empty() {
        1
    } else {
        shape.iter().product()
    }
}

impl<ElT: Scalar> DenseTensor<ElT> {
    /// Create a zero-initialized tensor.
    ///
    /// # Examples
    ///
    /// ```
    /// use hypergrad::DenseTensor;
    ///
    /// let t: DenseTensor<f64> = DenseTensor::zeros(&[2, 3, 4]);
    /// assert_eq!(t.shape(), &[2, 3, 4]);
    /// assert_eq!(t.len(), 24);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, ElT::zero())
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, ElT::one())
    }

    /// Create a tensor with every element set to `value`.
    pub fn full(shape: &[usize], value: ElT) -> Self {
        Self {
            data: vec![value; storage_len(shape)],
            shape: shape.to_vec(),
            strides: column_major_strides(shape),
        }
    }

    /// Create a one-element tensor of shape `[1]`.
    pub fn scalar(value: ElT) -> Self {
        Self::full(&[1], value)
    }

    /// Create tensor from column-major data and shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::ShapeMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use hypergrad::DenseTensor;
    ///
    /// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[1, 0]), Some(&2.0)); // column-major
    /// assert_eq!(t.get(&[0, 1]), Some(&3.0));
    /// ```
    pub fn from_vec(data: Vec<ElT>, shape: &[usize]) -> Result<Self, TensorError> {
        let expected = storage_len(shape);
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
            strides: column_major_strides(shape),
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Rank (number of dimensions).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if the tensor holds exactly one element.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    pub fn data(&self) -> &[ElT] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [ElT] {
        &mut self.data
    }

    /// Consume the tensor and return its column-major data.
    pub fn into_data(self) -> Vec<ElT> {
        self.data
    }

    /// The single element of a scalar tensor.
    pub fn item(&self) -> Option<ElT> {
        if self.is_scalar() {
            Some(self.data[0])
        } else {
            None
        }
    }

    #[inline]
    pub fn get_linear(&self, i: usize) -> Option<&ElT> {
        self.data.get(i)
    }

    fn linear_index(&self, indices: &[usize]) -> Result<usize, TensorError> {
        if indices.len() != self.ndim() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        let mut linear = 0;
        for ((&idx, &dim), &stride) in indices.iter().zip(&self.shape).zip(&self.strides) {
            if idx >= dim {
                return Err(TensorError::IndexOutOfBounds {
                    index: idx,
                    dim_size: dim,
                });
            }
            linear += idx * stride;
        }
        Ok(linear)
    }

    /// Get element by cartesian indices.
    ///
    /// Returns `None` if indices are out of bounds or wrong number of indices.
    pub fn get(&self, indices: &[usize]) -> Option<&ElT> {
        self.linear_index(indices).ok().map(|i| &self.data[i])
    }

    /// Set element by cartesian indices.
    pub fn set(&mut self, indices: &[usize], value: ElT) -> Result<(), TensorError> {
        let i = self.linear_index(indices)?;
        self.data[i] = value;
        Ok(())
    }

    pub fn fill(&mut self, value: ElT) {
        self.data.fill(value);
    }

    /// Return a copy with a new shape holding the same number of elements.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, TensorError> {
        let new_len = storage_len(new_shape);
        if new_len != self.len() {
            return Err(TensorError::ShapeMismatch {
                expected: self.len(),
                actual: new_len,
            });
        }
        Ok(Self {
            data: self.data.clone(),
            shape: new_shape.to_vec(),
            strides: column_major_strides(new_shape),
        })
    }

    /// Check that `other` has exactly the same shape.
    pub fn ensure_same_shape(&self, other: &Self) -> Result<(), TensorError> {
        if self.shape != other.shape {
            return Err(TensorError::IncompatibleShapes {
                lhs: self.shape.clone(),
                rhs: other.shape.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;

    fn test_zeros_generic<T: Scalar>() {
        let t: DenseTensor<T> = DenseTensor::zeros(&[2, 3]);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.len(), 6);
        assert_eq!(t.strides(), &[1, 2]);
        assert!(t.data().iter().all(|&x| x == T::zero()));
    }

    #[test]
    fn test_zeros_f64() {
        test_zeros_generic::<f64>();
    }

    #[test]
    fn test_zeros_c64() {
        test_zeros_generic::<c64>();
    }

    #[test]
    fn test_from_vec_column_major() {
        let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        assert_eq!(t.get(&[0, 0]), Some(&1.0));
        assert_eq!(t.get(&[1, 0]), Some(&2.0));
        assert_eq!(t.get(&[0, 1]), Some(&3.0));
        assert_eq!(t.get(&[1, 2]), Some(&6.0));
    }

    #[test]
    fn test_from_vec_shape_mismatch() {
        let result = DenseTensor::<f64>::from_vec(vec![1.0, 2.0, 3.0], &[2, 3]);
        assert!(matches!(
            result,
            Err(TensorError::ShapeMismatch {
                expected: 6,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let t: DenseTensor<f64> = DenseTensor::zeros(&[2, 3]);
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(t.get(&[0, 3]), None);
        assert_eq!(t.get(&[0]), None);
    }

    #[test]
    fn test_set_errors() {
        let mut t: DenseTensor<f64> = DenseTensor::zeros(&[2, 3]);
        t.set(&[1, 2], 42.0).unwrap();
        assert_eq!(t.get(&[1, 2]), Some(&42.0));
        assert!(matches!(
            t.set(&[0], 1.0),
            Err(TensorError::WrongNumberOfIndices { .. })
        ));
        assert!(matches!(
            t.set(&[5, 0], 1.0),
            Err(TensorError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_scalar_shapes() {
        let empty: DenseTensor<f64> = DenseTensor::ones(&[]);
        assert_eq!(empty.len(), 1);
        assert!(empty.is_scalar());
        assert_eq!(empty.item(), Some(1.0));

        let s = DenseTensor::scalar(3.5);
        assert_eq!(s.shape(), &[1]);
        assert_eq!(s.item(), Some(3.5));

        let v: DenseTensor<f64> = DenseTensor::ones(&[2]);
        assert_eq!(v.item(), None);
    }

    #[test]
    fn test_zero_extent_shapes() {
        let t: DenseTensor<f64> = DenseTensor::zeros(&[0]);
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
        assert!(!t.is_scalar());
        assert_eq!(t.item(), None);
        assert_eq!(t.get(&[0]), None);

        let m: DenseTensor<f64> = DenseTensor::ones(&[2, 0]);
        assert!(m.is_empty());
        assert_eq!(m.reshape(&[0, 5]).unwrap().shape(), &[0, 5]);
        assert!(m.reshape(&[]).is_err());

        assert!(DenseTensor::<f64>::from_vec(vec![], &[3, 0]).is_ok());
        assert!(matches!(
            DenseTensor::from_vec(vec![1.0], &[0]),
            Err(TensorError::ShapeMismatch {
                expected: 0,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_reshape() {
        let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let r = t.reshape(&[3, 2]).unwrap();
        assert_eq!(r.shape(), &[3, 2]);
        assert_eq!(r.data(), t.data());
        assert!(t.reshape(&[4]).is_err());
    }

    #[test]
    fn test_ensure_same_shape() {
        let a: DenseTensor<f64> = DenseTensor::zeros(&[2, 3]);
        let b: DenseTensor<f64> = DenseTensor::zeros(&[3, 2]);
        assert!(a.ensure_same_shape(&a.clone()).is_ok());
        assert!(matches!(
            a.ensure_same_shape(&b),
            Err(TensorError::IncompatibleShapes { .. })
        ));
    }
}
