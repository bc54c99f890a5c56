//! Gradient storage container.

use std::collections::HashMap;

use super::graph::NodeId;
use super::ops;
use super::tensor::TrackedTensor;
use crate::error::TensorError;

/// Container for accumulated gradients, keyed by node.
///
/// Contributions reaching the same node along several paths are summed with
/// the tracked `add`, so accumulation is itself differentiable when grad mode
/// is on.
#[derive(Debug, Default)]
pub struct Gradients {
    grads: HashMap<NodeId, TrackedTensor>,
}

impl Gradients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate gradient for a node.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::IncompatibleShapes` if the contribution's shape
    /// differs from the gradient already stored.
    pub fn accumulate(&mut self, id: NodeId, grad: TrackedTensor) -> Result<(), TensorError> {
        match self.grads.get_mut(&id) {
            Some(existing) => *existing = ops::add(existing, &grad)?,
            None => {
                self.grads.insert(id, grad);
            }
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&TrackedTensor> {
        self.grads.get(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<TrackedTensor> {
        self.grads.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.grads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &TrackedTensor)> {
        self.grads.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DenseTensor;
    use crate::autodiff::graph::{clear_graph, with_graph};

    fn constant(data: &[f64]) -> TrackedTensor {
        TrackedTensor::new(DenseTensor::from_vec(data.to_vec(), &[data.len()]).unwrap())
    }

    fn fresh_id() -> NodeId {
        with_graph(|g| g.create_leaf())
    }

    #[test]
    fn test_gradients_accumulate_single() {
        clear_graph();
        let mut grads = Gradients::new();
        let id = fresh_id();

        grads.accumulate(id, constant(&[1.0, 2.0, 3.0])).unwrap();

        assert!(grads.contains(id));
        assert_eq!(grads.get(id).unwrap().data(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_gradients_accumulate_multiple() {
        clear_graph();
        let mut grads = Gradients::new();
        let id = fresh_id();

        grads.accumulate(id, constant(&[1.0, 2.0, 3.0])).unwrap();
        grads.accumulate(id, constant(&[4.0, 5.0, 6.0])).unwrap();

        assert_eq!(grads.get(id).unwrap().data(), &[5.0, 7.0, 9.0]);
        assert_eq!(grads.len(), 1);
    }

    #[test]
    fn test_gradients_accumulate_shape_mismatch() {
        clear_graph();
        let mut grads = Gradients::new();
        let id = fresh_id();

        grads.accumulate(id, constant(&[1.0, 2.0])).unwrap();
        assert!(grads.accumulate(id, constant(&[1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn test_gradients_remove() {
        clear_graph();
        let mut grads = Gradients::new();
        let id = fresh_id();

        grads.accumulate(id, constant(&[1.0])).unwrap();
        assert!(grads.remove(id).is_some());
        assert!(grads.is_empty());
    }
}
