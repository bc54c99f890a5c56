//! TrackedTensor - tensor with gradient tracking for automatic differentiation.

use super::graph::{NodeId, with_graph};
use crate::tensor::DenseTensor;

/// A tensor that may be tracked in the computation graph.
///
/// A tensor requires grad exactly when it has a node: leaves created with
/// [`TrackedTensor::leaf`] and results of tracked operations on them.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::autodiff::TrackedTensor;
///
/// let a = TrackedTensor::leaf(DenseTensor::ones(&[2, 3]));
/// assert!(a.requires_grad());
///
/// let b = TrackedTensor::new(DenseTensor::ones(&[3, 4]));
/// assert!(!b.requires_grad());
/// ```
#[derive(Debug, Clone)]
pub struct TrackedTensor {
    tensor: DenseTensor<f64>,
    node: Option<NodeId>,
}

impl TrackedTensor {
    /// Create a constant that does not require gradient.
    pub fn new(tensor: DenseTensor<f64>) -> Self {
        Self { tensor, node: None }
    }

    /// Create a leaf that requires gradient.
    ///
    /// Registers in the thread-local computation graph.
    pub fn leaf(tensor: DenseTensor<f64>) -> Self {
        let node = with_graph(|g| g.create_leaf());
        Self {
            tensor,
            node: Some(node),
        }
    }

    /// Create with explicit requires_grad flag.
    pub fn with_requires_grad(tensor: DenseTensor<f64>, requires_grad: bool) -> Self {
        if requires_grad {
            Self::leaf(tensor)
        } else {
            Self::new(tensor)
        }
    }

    pub(crate) fn from_node(tensor: DenseTensor<f64>, node: NodeId) -> Self {
        Self {
            tensor,
            node: Some(node),
        }
    }

    pub fn tensor(&self) -> &DenseTensor<f64> {
        &self.tensor
    }

    pub fn into_tensor(self) -> DenseTensor<f64> {
        self.tensor
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    pub fn requires_grad(&self) -> bool {
        self.node.is_some()
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn ndim(&self) -> usize {
        self.tensor.ndim()
    }

    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        self.tensor.data()
    }

    /// The single element of a scalar tensor.
    pub fn item(&self) -> Option<f64> {
        self.tensor.item()
    }

    /// Copy of the values, cut off from the computation graph.
    pub fn detach(&self) -> Self {
        Self::new(self.tensor.clone())
    }
}

impl From<DenseTensor<f64>> for TrackedTensor {
    fn from(tensor: DenseTensor<f64>) -> Self {
        Self::new(tensor)
    }
}
