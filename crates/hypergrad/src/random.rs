//! Random tensor construction.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::tensor::{DenseTensor, storage_len};

impl DenseTensor<f64> {
    /// Create a tensor with uniform random values in [0, 1).
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with uniform random values using a specific RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use hypergrad::DenseTensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let t1 = DenseTensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// let t2 = DenseTensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn random_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        let len = storage_len(shape);
        let data: Vec<f64> = (0..len).map(|_| rng.sample(StandardUniform)).collect();
        Self::from_vec(data, shape).expect("shape and data length should match")
    }

    /// Create a tensor with standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with standard normal random values using a specific RNG.
    pub fn randn_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        let len = storage_len(shape);
        let data: Vec<f64> = (0..len).map(|_| rng.sample(StandardNormal)).collect();
        Self::from_vec(data, shape).expect("shape and data length should match")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_range() {
        let t = DenseTensor::random(&[2, 3]);
        assert_eq!(t.len(), 6);
        for &v in t.data() {
            assert!((0.0..1.0).contains(&v), "value {} not in [0, 1)", v);
        }
    }

    #[test]
    fn test_randn_reproducible() {
        let t1 = DenseTensor::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(54321));
        let t2 = DenseTensor::randn_with_rng(&[3, 4], &mut StdRng::seed_from_u64(54321));
        assert_eq!(t1.data(), t2.data());
    }

    #[test]
    fn test_random_scalar_tensor() {
        let t = DenseTensor::random(&[]);
        assert_eq!(t.shape(), &[] as &[usize]);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_random_zero_extent() {
        let t = DenseTensor::randn_with_rng(&[3, 0], &mut StdRng::seed_from_u64(1));
        assert_eq!(t.shape(), &[3, 0]);
        assert!(t.is_empty());
    }
}
