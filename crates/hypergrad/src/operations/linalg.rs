//! Matrix operations on rank-2 tensors, backed by faer.
//!
//! Tensors and faer matrices share the column-major layout, so a rank-2
//! tensor is viewed as a `MatRef` without copying.

use faer::linalg::matmul::matmul as faer_matmul;
use faer::{Accum, MatMut, MatRef, Par};

use crate::error::TensorError;
use crate::scalar::Scalar;
use crate::tensor::DenseTensor;

fn ensure_matrix<ElT: Scalar>(t: &DenseTensor<ElT>) -> Result<(usize, usize), TensorError> {
    match t.shape() {
        &[rows, cols] => Ok((rows, cols)),
        other => Err(TensorError::RankMismatch {
            expected: 2,
            actual: other.len(),
        }),
    }
}

/// View a rank-2 tensor as a faer matrix (zero-copy).
pub fn as_faer_mat<ElT: Scalar>(t: &DenseTensor<ElT>) -> Result<MatRef<'_, ElT>, TensorError> {
    let (rows, cols) = ensure_matrix(t)?;
    Ok(MatRef::from_column_major_slice(t.data(), rows, cols))
}

/// Swap the two dimensions of a rank-2 tensor.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::operations::transpose;
///
/// let t = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// let tt = transpose(&t).unwrap();
/// assert_eq!(tt.shape(), &[3, 2]);
/// assert_eq!(t.get(&[1, 2]), tt.get(&[2, 1]));
/// ```
pub fn transpose<ElT: Scalar>(t: &DenseTensor<ElT>) -> Result<DenseTensor<ElT>, TensorError> {
    let (rows, cols) = ensure_matrix(t)?;
    let src = t.data();
    let mut data = Vec::with_capacity(src.len());
    // Output column i is input row i.
    for i in 0..rows {
        for j in 0..cols {
            data.push(src[i + j * rows]);
        }
    }
    DenseTensor::from_vec(data, &[cols, rows])
}

/// Matrix product `C = A B` of rank-2 tensors.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::operations::matmul;
///
/// let a = DenseTensor::<f64>::ones(&[2, 3]);
/// let b = DenseTensor::<f64>::ones(&[3, 4]);
/// let c = matmul(&a, &b).unwrap();
/// assert_eq!(c.shape(), &[2, 4]);
/// assert_eq!(c.data()[0], 3.0);
/// ```
pub fn matmul<ElT: Scalar>(
    a: &DenseTensor<ElT>,
    b: &DenseTensor<ElT>,
) -> Result<DenseTensor<ElT>, TensorError> {
    let (m, k) = ensure_matrix(a)?;
    let (kb, n) = ensure_matrix(b)?;
    if k != kb {
        return Err(TensorError::IncompatibleShapes {
            lhs: a.shape().to_vec(),
            rhs: b.shape().to_vec(),
        });
    }

    // An empty output or an empty inner dimension leaves C at zero.
    let mut c = DenseTensor::<ElT>::zeros(&[m, n]);
    if m * n == 0 || k == 0 {
        return Ok(c);
    }
    let a_mat = as_faer_mat(a)?;
    let b_mat = as_faer_mat(b)?;
    let mut c_mat = MatMut::from_column_major_slice_mut(c.data_mut(), m, n);

    faer_matmul(c_mat.as_mut(), Accum::Replace, a_mat, b_mat, ElT::one(), Par::Seq);
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;
    use approx::assert_relative_eq;

    #[test]
    fn test_matmul_values() {
        // A = [[1, 3, 5], [2, 4, 6]], B = column-major 1..=12 as 3x4
        let a = DenseTensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b_data: Vec<f64> = (1..=12).map(|x| x as f64).collect();
        let b = DenseTensor::from_vec(b_data, &[3, 4]).unwrap();

        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), &[2, 4]);

        for i in 0..2 {
            for j in 0..4 {
                let expected: f64 = (0..3)
                    .map(|k| a.get(&[i, k]).unwrap() * b.get(&[k, j]).unwrap())
                    .sum();
                assert_relative_eq!(*c.get(&[i, j]).unwrap(), expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let a = DenseTensor::<f64>::ones(&[2, 3]);
        let b = DenseTensor::<f64>::ones(&[4, 5]);
        assert!(matches!(
            matmul(&a, &b),
            Err(TensorError::IncompatibleShapes { .. })
        ));
    }

    #[test]
    fn test_matmul_requires_rank_two() {
        let a = DenseTensor::<f64>::ones(&[3]);
        let b = DenseTensor::<f64>::ones(&[3, 1]);
        assert!(matches!(
            matmul(&a, &b),
            Err(TensorError::RankMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_matmul_zero_inner_dimension() {
        let a = DenseTensor::<f64>::zeros(&[2, 0]);
        let b = DenseTensor::<f64>::zeros(&[0, 3]);
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert_eq!(c.data(), &[0.0; 6]);
    }

    #[test]
    fn test_matmul_empty_output() {
        let a = DenseTensor::<f64>::ones(&[0, 4]);
        let b = DenseTensor::<f64>::ones(&[4, 3]);
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), &[0, 3]);
        assert!(c.is_empty());
    }

    #[test]
    fn test_transpose_zero_extent() {
        let t = DenseTensor::<f64>::zeros(&[0, 3]);
        let tt = transpose(&t).unwrap();
        assert_eq!(tt.shape(), &[3, 0]);
        assert!(tt.is_empty());
        assert!(as_faer_mat(&tt).is_ok());
    }

    #[test]
    fn test_matmul_complex() {
        // (1 + i) * (1 - i) = 2
        let a = DenseTensor::from_vec(vec![c64::new(1.0, 1.0)], &[1, 1]).unwrap();
        let b = DenseTensor::from_vec(vec![c64::new(1.0, -1.0)], &[1, 1]).unwrap();
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.data(), &[c64::new(2.0, 0.0)]);
    }

    #[test]
    fn test_transpose_twice_is_identity() {
        let t = DenseTensor::from_vec((0..6).map(|x| x as f64).collect(), &[3, 2]).unwrap();
        let back = transpose(&transpose(&t).unwrap()).unwrap();
        assert_eq!(back, t);
    }
}
