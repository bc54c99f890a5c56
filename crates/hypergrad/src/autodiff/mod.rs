//! Reverse-mode automatic differentiation on a thread-local tape.
//!
//! # Architecture
//!
//! ```text
//! TrackedTensor  ──registers in──►  ComputationGraph (thread_local)
//!        │                                 │
//!        ▼                                 ▼
//!   DenseTensor<f64>                  Vec<Node>
//!                                          │
//!                                          ▼
//!                               Rc<dyn GradFn> (MulBackward, ...)
//! ```
//!
//! Backward rules are written with the tracked operations in [`ops`], so a
//! pass run with `create_graph` records its own graph and the resulting
//! gradients can be differentiated again.
//!
//! # Example
//!
//! ```
//! use hypergrad::DenseTensor;
//! use hypergrad::autodiff::{GradOptions, TrackedTensor, clear_graph, grad, ops};
//!
//! clear_graph();
//!
//! let x = TrackedTensor::leaf(DenseTensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
//! let y = ops::sum(&ops::powf(&x, 3.0));
//!
//! // First derivative 3x^2, kept differentiable
//! let options = GradOptions::default().with_create_graph(true);
//! let dy = grad(&[&y], &[&x], None, &options).unwrap().remove(0).unwrap();
//! assert_eq!(dy.data(), &[3.0, 12.0]);
//!
//! // Second derivative 6x
//! let d2y = grad(&[&ops::sum(&dy)], &[&x], None, &GradOptions::default()).unwrap();
//! assert_eq!(d2y[0].as_ref().unwrap().data(), &[6.0, 12.0]);
//! ```
//!
//! # Design Notes
//!
//! - Thread-local computation graph (no `Arc`, uses `Rc`)
//! - Gradient accumulation for multiple paths to same node
//! - Backward order from a topological sort of the reachable subgraph

mod backward;
mod gradients;
mod graph;
pub mod ops;
mod tensor;

pub use backward::{GradOptions, backward, grad};
pub(crate) use backward::release_graph;
pub use gradients::Gradients;
pub use graph::{
    ComputationGraph, GradFn, GradModeGuard, Node, NodeId, clear_graph, is_grad_enabled, no_grad,
    with_graph,
};
pub use tensor::TrackedTensor;
