//! Scalar trait for tensor element types.

use faer_traits::ComplexField;
use std::fmt::Debug;

pub use faer::c64;

/// Trait for scalar types a `DenseTensor` can hold.
///
/// Wraps faer's `ComplexField` so tensors can be viewed as faer matrices.
/// Gradient tracking is only provided for `f64`.
pub trait Scalar: ComplexField + Copy + Debug + Default + 'static {
    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;
}

impl Scalar for f64 {
    fn one() -> Self {
        1.0
    }
}

impl Scalar for c64 {
    fn one() -> Self {
        c64::new(1.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_is_real() {
        assert!(<f64 as ComplexField>::IS_REAL);
    }

    #[test]
    fn test_zero_one() {
        assert_eq!(f64::zero(), 0.0);
        assert_eq!(f64::one(), 1.0);
        assert_eq!(c64::zero(), c64::new(0.0, 0.0));
        assert_eq!(c64::one(), c64::new(1.0, 0.0));
    }
}
