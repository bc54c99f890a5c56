//! Computation graph for reverse-mode automatic differentiation.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use super::tensor::TrackedTensor;
use crate::error::TensorError;

/// Unique identifier for a node in the computation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the internal index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Backward function of a recorded operation.
///
/// Rules are written with tracked operations, so running them with grad
/// mode enabled records the gradient computation itself (`create_graph`).
pub trait GradFn: Debug {
    /// Operation name, used in log output.
    fn name(&self) -> &'static str;

    /// Compute the vector-Jacobian product for every input that requires grad.
    ///
    /// Returns `(input node, gradient)` pairs.
    fn backward(
        &self,
        grad_output: &TrackedTensor,
    ) -> Result<Vec<(NodeId, TrackedTensor)>, TensorError>;

    /// Input node IDs (for topological sort).
    fn inputs(&self) -> Vec<NodeId>;
}

/// A node in the computation graph.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    /// Backward function (None for leaves and released nodes).
    grad_fn: Option<Rc<dyn GradFn>>,
    /// Kept after release so traversal can still see the topology.
    inputs: Vec<NodeId>,
    released: bool,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn grad_fn(&self) -> Option<&dyn GradFn> {
        self.grad_fn.as_deref()
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// A leaf was created directly by the user, not by an operation.
    pub fn is_leaf(&self) -> bool {
        self.inputs.is_empty()
    }

    /// True once a non-retaining backward pass dropped the backward function.
    pub fn is_released(&self) -> bool {
        self.released
    }
}

/// Thread-local computation graph.
///
/// Nodes are only appended, so every input of a node has a smaller id.
pub struct ComputationGraph {
    nodes: Vec<Node>,
}

impl ComputationGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len())
    }

    /// Create a leaf node.
    pub fn create_leaf(&mut self) -> NodeId {
        let id = self.next_id();
        self.nodes.push(Node {
            id,
            grad_fn: None,
            inputs: Vec::new(),
            released: false,
        });
        id
    }

    /// Create a computed node with its backward function.
    pub fn create_node(&mut self, grad_fn: Rc<dyn GradFn>) -> NodeId {
        let id = self.next_id();
        let inputs = grad_fn.inputs();
        self.nodes.push(Node {
            id,
            grad_fn: Some(grad_fn),
            inputs,
            released: false,
        });
        id
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Shared handle to a node's backward function.
    ///
    /// Cloning the `Rc` lets the caller run the function after releasing the
    /// graph borrow, since backward rules record new nodes.
    pub fn grad_fn_handle(&self, id: NodeId) -> Option<Rc<dyn GradFn>> {
        self.get_node(id).and_then(|n| n.grad_fn.clone())
    }

    /// Drop a node's backward function and the tensors it saved.
    pub fn release(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            if node.grad_fn.take().is_some() {
                node.released = true;
            }
        }
    }

    /// Number of nodes still holding a backward function.
    pub fn num_live(&self) -> usize {
        self.nodes.iter().filter(|n| n.grad_fn.is_some()).count()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for ComputationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ComputationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputationGraph")
            .field("num_nodes", &self.nodes.len())
            .field("num_live", &self.num_live())
            .field(
                "released",
                &self.nodes.iter().filter(|n| n.released).count(),
            )
            .finish()
    }
}

thread_local! {
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Access the thread-local computation graph.
///
/// The closure must not call tracked operations: they borrow the graph too.
pub fn with_graph<R>(f: impl FnOnce(&mut ComputationGraph) -> R) -> R {
    GRAPH.with(|g| f(&mut g.borrow_mut()))
}

/// Clear the thread-local computation graph.
///
/// Tensors created before the call keep stale node ids and must not be
/// differentiated afterwards.
pub fn clear_graph() {
    with_graph(|g| g.clear());
}

/// Whether tracked operations currently record nodes on this thread.
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|e| e.get())
}

/// RAII guard that sets grad mode and restores the previous mode on drop.
#[derive(Debug)]
#[must_use = "grad mode is restored as soon as the guard is dropped"]
pub struct GradModeGuard {
    previous: bool,
}

impl GradModeGuard {
    pub fn new(enabled: bool) -> Self {
        let previous = GRAD_ENABLED.with(|e| e.replace(enabled));
        Self { previous }
    }
}

impl Drop for GradModeGuard {
    fn drop(&mut self) {
        GRAD_ENABLED.with(|e| e.set(self.previous));
    }
}

/// Disable recording until the returned guard is dropped.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::autodiff::{TrackedTensor, no_grad, ops};
///
/// let x = TrackedTensor::leaf(DenseTensor::ones(&[2]));
/// let y = {
///     let _guard = no_grad();
///     ops::scale(&x, 2.0)
/// };
/// assert!(!y.requires_grad());
/// ```
pub fn no_grad() -> GradModeGuard {
    GradModeGuard::new(false)
}
