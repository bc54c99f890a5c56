//! Error types for hypergrad.

use thiserror::Error;

/// Errors that can occur in tensor operations and gradient computation.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Shape mismatch between data length and expected size.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Two operands (or a seed and its output) have different shapes.
    #[error("incompatible shapes {lhs:?} and {rhs:?}")]
    IncompatibleShapes { lhs: Vec<usize>, rhs: Vec<usize> },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Operation requires specific tensor rank.
    #[error("expected tensor of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Operation is not valid for its arguments.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A tensor passed to `grad` is not part of the computation graph.
    #[error("element {index} of {role} does not require grad and has no grad_fn")]
    NotDifferentiable { role: &'static str, index: usize },

    /// An output without a seed gradient is not a scalar.
    #[error("grad can be implicitly created only for scalar outputs, output {index} has {len} elements")]
    NonScalarOutput { index: usize, len: usize },

    /// Number of seed gradients does not match the number of outputs.
    #[error("expected {expected} seed gradients, got {actual}")]
    SeedCountMismatch { expected: usize, actual: usize },

    /// Backward pass reached a node whose backward function was already freed.
    #[error(
        "trying to backward through node {node} a second time after its graph was released; \
         pass retain_graph = true on the first call"
    )]
    GraphReleased { node: usize },

    /// A tracked input has no gradient path from the outputs.
    #[error("input {index} is not reachable from the outputs; set allow_unused = true to allow this")]
    UnusedInput { index: usize },
}
