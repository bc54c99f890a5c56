//! hypergrad - selective gradients for hypergradient computations
//!
//! This crate provides column-major dense tensors, a reverse-mode autodiff
//! engine with higher-order support, and a wrapper that differentiates only
//! the inputs a caller marks while keeping results aligned with the full
//! input list.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Selective API (selective, hvp)
//!     → selective_grad, hessian_vector_product
//!
//! Level 2: Autodiff engine (autodiff module)
//!     → grad, backward, tracked ops
//!
//! Level 3: Dense kernels (operations module)
//!     → element-wise maps, reductions, faer matmul
//! ```
//!
//! # Example
//!
//! ```
//! use hypergrad::autodiff::{TrackedTensor, ops};
//! use hypergrad::{DenseTensor, GradInput, GradOptions, selective_grad};
//!
//! let w = TrackedTensor::leaf(DenseTensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
//! let x = TrackedTensor::new(DenseTensor::from_vec(vec![3.0, 4.0], &[2]).unwrap());
//! let loss = ops::dot(&w, &x).unwrap();
//!
//! let inputs = [GradInput::from_tensor(&w), GradInput::from_tensor(&x)];
//! let grads = selective_grad(&[&loss], &inputs, None, &GradOptions::default()).unwrap();
//!
//! assert_eq!(grads[0].as_grad().unwrap().data(), &[3.0, 4.0]);
//! assert!(grads[1].is_placeholder());
//! ```

pub mod error;
pub mod operations;
mod random;
pub mod scalar;
pub mod tensor;

#[cfg(feature = "autodiff")]
pub mod autodiff;
#[cfg(feature = "autodiff")]
pub mod hvp;
#[cfg(feature = "autodiff")]
pub mod selective;

pub use error::TensorError;
pub use scalar::{Scalar, c64};
pub use tensor::DenseTensor;

#[cfg(feature = "autodiff")]
pub use autodiff::GradOptions;
#[cfg(feature = "autodiff")]
pub use selective::{GradInput, GradSlot, selective_grad};
