//! Backward pass execution and the `grad` primitive.

use std::collections::{HashMap, HashSet};

use log::trace;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use super::gradients::Gradients;
use super::graph::{ComputationGraph, GradModeGuard, NodeId, with_graph};
use super::tensor::TrackedTensor;
use crate::error::TensorError;
use crate::tensor::DenseTensor;

/// Graph-lifetime and tolerance flags for a gradient computation.
///
/// # Example
///
/// ```
/// use hypergrad::autodiff::GradOptions;
///
/// let options = GradOptions::default().with_create_graph(true);
/// assert!(options.retains_graph());
/// assert!(!options.with_retain_graph(false).retains_graph());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradOptions {
    /// Keep backward functions alive for another pass. `None` follows
    /// `create_graph`.
    pub retain_graph: Option<bool>,
    /// Record the backward pass so the returned gradients are differentiable.
    pub create_graph: bool,
    /// Accepted for interface compatibility; gradients are only ever
    /// returned for the requested inputs.
    pub only_inputs: bool,
    /// Return `None` instead of failing for inputs with no gradient path.
    pub allow_unused: bool,
}

impl Default for GradOptions {
    fn default() -> Self {
        Self {
            retain_graph: None,
            create_graph: false,
            only_inputs: true,
            allow_unused: false,
        }
    }
}

impl GradOptions {
    pub fn with_retain_graph(mut self, retain_graph: bool) -> Self {
        self.retain_graph = Some(retain_graph);
        self
    }

    pub fn with_create_graph(mut self, create_graph: bool) -> Self {
        self.create_graph = create_graph;
        self
    }

    pub fn with_only_inputs(mut self, only_inputs: bool) -> Self {
        self.only_inputs = only_inputs;
        self
    }

    pub fn with_allow_unused(mut self, allow_unused: bool) -> Self {
        self.allow_unused = allow_unused;
        self
    }

    /// Effective `retain_graph`.
    pub fn retains_graph(&self) -> bool {
        self.retain_graph.unwrap_or(self.create_graph)
    }
}

/// Nodes whose gradients are wanted at the end of a pass.
enum Targets<'a> {
    Nodes(&'a HashSet<NodeId>),
    /// Every leaf reachable from the roots.
    Leaves,
}

/// Traversal order for one backward pass.
struct BackwardPlan {
    /// Reverse topological order, outputs first.
    order: Vec<NodeId>,
    /// Nodes that lie on a path from a root to a target.
    needed: HashSet<NodeId>,
    /// Needed nodes whose backward function must run.
    expand: HashSet<NodeId>,
    targets: HashSet<NodeId>,
}

impl BackwardPlan {
    fn build(
        graph: &ComputationGraph,
        roots: &[NodeId],
        targets: Targets<'_>,
    ) -> Result<Self, TensorError> {
        // Collect the subgraph reachable from the roots.
        let mut dag: DiGraph<NodeId, ()> = DiGraph::new();
        let mut index_of: HashMap<NodeId, NodeIndex> = HashMap::new();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if index_of.contains_key(&id) {
                continue;
            }
            index_of.insert(id, dag.add_node(id));
            let node = graph.get_node(id).ok_or_else(|| {
                TensorError::InvalidOperation(format!("node {} is not in the graph", id.index()))
            })?;
            stack.extend(node.inputs().iter().copied());
        }
        for (&id, &output_idx) in &index_of {
            if let Some(node) = graph.get_node(id) {
                for input in node.inputs() {
                    // Edge from input to output (forward direction)
                    dag.add_edge(index_of[input], output_idx, ());
                }
            }
        }

        let forward = toposort(&dag, None).map_err(|cycle| {
            TensorError::InvalidOperation(format!(
                "computation graph has a cycle through node {}",
                dag[cycle.node_id()].index()
            ))
        })?;
        let forward: Vec<NodeId> = forward.into_iter().map(|idx| dag[idx]).collect();

        let targets: HashSet<NodeId> = match targets {
            Targets::Nodes(nodes) => nodes.clone(),
            Targets::Leaves => forward
                .iter()
                .copied()
                .filter(|&id| graph.get_node(id).is_some_and(|n| n.is_leaf()))
                .collect(),
        };

        // Inputs come first in forward order, so one sweep settles `needed`.
        let mut needed = HashSet::new();
        let mut expand = HashSet::new();
        for &id in &forward {
            let inputs = graph.get_node(id).map(|n| n.inputs()).unwrap_or_default();
            let feeds_target = inputs.iter().any(|input| needed.contains(input));
            if feeds_target {
                expand.insert(id);
            }
            if feeds_target || targets.contains(&id) {
                needed.insert(id);
            }
        }

        let mut order = forward;
        order.reverse();
        Ok(Self {
            order,
            needed,
            expand,
            targets,
        })
    }

    /// Fail if a backward function this plan must run was already freed.
    fn ensure_live(&self, graph: &ComputationGraph) -> Result<(), TensorError> {
        for &id in &self.expand {
            if graph.get_node(id).is_some_and(|n| n.is_released()) {
                return Err(TensorError::GraphReleased { node: id.index() });
            }
        }
        Ok(())
    }
}

/// Run reverse accumulation from seeded roots.
fn run_backward(
    roots: &[NodeId],
    seeds: Vec<TrackedTensor>,
    targets: Targets<'_>,
    options: &GradOptions,
) -> Result<Gradients, TensorError> {
    let plan = with_graph(|g| {
        let plan = BackwardPlan::build(g, roots, targets)?;
        plan.ensure_live(g)?;
        Ok::<_, TensorError>(plan)
    })?;
    let _mode = GradModeGuard::new(options.create_graph);
    let retain = options.retains_graph();

    let mut gradients = Gradients::new();
    for (&root, seed) in roots.iter().zip(seeds) {
        gradients.accumulate(root, seed)?;
    }

    let mut released = 0usize;
    for &id in &plan.order {
        if !plan.expand.contains(&id) {
            continue;
        }
        let grad_output = if plan.targets.contains(&id) {
            gradients.get(id).cloned()
        } else {
            gradients.remove(id)
        };
        let Some(grad_output) = grad_output else {
            continue; // No gradient flowing to this node
        };

        // Clone the handle out so the rule can record nodes while it runs.
        let grad_fn = with_graph(|g| g.grad_fn_handle(id))
            .ok_or(TensorError::GraphReleased { node: id.index() })?;
        for (input, grad) in grad_fn.backward(&grad_output)? {
            if plan.needed.contains(&input) {
                gradients.accumulate(input, grad)?;
            }
        }

        if !retain {
            drop(grad_fn);
            with_graph(|g| g.release(id));
            released += 1;
        }
    }

    trace!(
        "backward: {} reachable nodes, {} expanded, {} released, create_graph = {}",
        plan.order.len(),
        plan.expand.len(),
        released,
        options.create_graph
    );
    Ok(gradients)
}

fn root_ids(outputs: &[&TrackedTensor]) -> Result<Vec<NodeId>, TensorError> {
    outputs
        .iter()
        .enumerate()
        .map(|(index, t)| {
            t.node_id().ok_or(TensorError::NotDifferentiable {
                role: "outputs",
                index,
            })
        })
        .collect()
}

/// Validate explicit seeds, or build the default seed (ones) for scalar outputs.
fn seed_gradients(
    outputs: &[&TrackedTensor],
    grad_outputs: Option<&[&TrackedTensor]>,
) -> Result<Vec<TrackedTensor>, TensorError> {
    match grad_outputs {
        Some(seeds) => {
            if seeds.len() != outputs.len() {
                return Err(TensorError::SeedCountMismatch {
                    expected: outputs.len(),
                    actual: seeds.len(),
                });
            }
            outputs
                .iter()
                .zip(seeds)
                .map(|(output, seed)| {
                    output.tensor().ensure_same_shape(seed.tensor())?;
                    Ok((*seed).clone())
                })
                .collect()
        }
        None => outputs
            .iter()
            .enumerate()
            .map(|(index, output)| {
                if output.len() != 1 {
                    return Err(TensorError::NonScalarOutput {
                        index,
                        len: output.len(),
                    });
                }
                Ok(TrackedTensor::new(DenseTensor::ones(output.shape())))
            })
            .collect(),
    }
}

/// Compute gradients of `outputs` with respect to `inputs`.
///
/// Returns one entry per input, in order: the summed gradient, or `None`
/// when no path leads from the outputs to that input and
/// `options.allow_unused` is set.
///
/// Without `grad_outputs`, every output must be a scalar and is seeded with
/// ones. With `options.create_graph` the returned gradients are tracked and
/// can be differentiated again; otherwise they are detached constants.
///
/// # Errors
///
/// - `NotDifferentiable` if an output or input is not in the graph
/// - `SeedCountMismatch` / `IncompatibleShapes` for malformed seeds
/// - `NonScalarOutput` if a seed is needed but missing
/// - `GraphReleased` if a needed backward function was freed by an earlier
///   call without `retain_graph`
/// - `UnusedInput` if an input is unreachable and `allow_unused` is false
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::autodiff::{GradOptions, TrackedTensor, grad, ops};
///
/// let x = TrackedTensor::leaf(DenseTensor::from_vec(vec![1.0, 2.0], &[2]).unwrap());
/// let y = ops::sum(&ops::mul(&x, &x).unwrap());
///
/// let grads = grad(&[&y], &[&x], None, &GradOptions::default()).unwrap();
/// assert_eq!(grads[0].as_ref().unwrap().data(), &[2.0, 4.0]);
/// ```
pub fn grad(
    outputs: &[&TrackedTensor],
    inputs: &[&TrackedTensor],
    grad_outputs: Option<&[&TrackedTensor]>,
    options: &GradOptions,
) -> Result<Vec<Option<TrackedTensor>>, TensorError> {
    if outputs.is_empty() {
        return Err(TensorError::InvalidOperation(
            "grad requires at least one output".to_string(),
        ));
    }
    let roots = root_ids(outputs)?;
    let input_ids: Vec<NodeId> = inputs
        .iter()
        .enumerate()
        .map(|(index, t)| {
            t.node_id().ok_or(TensorError::NotDifferentiable {
                role: "inputs",
                index,
            })
        })
        .collect::<Result<_, _>>()?;
    let seeds = seed_gradients(outputs, grad_outputs)?;

    let targets: HashSet<NodeId> = input_ids.iter().copied().collect();
    let gradients = run_backward(&roots, seeds, Targets::Nodes(&targets), options)?;

    input_ids
        .iter()
        .enumerate()
        .map(|(index, id)| match gradients.get(*id) {
            Some(g) if options.create_graph => Ok(Some(g.clone())),
            Some(g) => Ok(Some(g.detach())),
            None if options.allow_unused => Ok(None),
            None => Err(TensorError::UnusedInput { index }),
        })
        .collect()
}

/// Free the backward functions a pass from `outputs` to `inputs` runs.
///
/// Used after passes made with `retain_graph` that the caller does not want
/// to keep. Nodes already released are skipped. Returns the number of nodes
/// released by this call.
pub(crate) fn release_graph(
    outputs: &[&TrackedTensor],
    inputs: &[&TrackedTensor],
) -> Result<usize, TensorError> {
    let roots = root_ids(outputs)?;
    let targets: HashSet<NodeId> = inputs.iter().filter_map(|t| t.node_id()).collect();
    with_graph(|g| {
        let plan = BackwardPlan::build(g, &roots, Targets::Nodes(&targets))?;
        let before = g.num_live();
        for &id in &plan.expand {
            g.release(id);
        }
        let released = before - g.num_live();
        trace!("release_graph: {released} nodes released");
        Ok::<_, TensorError>(released)
    })
}

/// Execute a backward pass from a scalar loss.
///
/// Computes gradients for every reachable leaf and releases the graph it
/// walked.
///
/// # Errors
///
/// Returns error if the loss is not a scalar or not in the computation graph.
///
/// # Example
///
/// ```
/// use hypergrad::DenseTensor;
/// use hypergrad::autodiff::{TrackedTensor, backward, clear_graph, ops};
///
/// clear_graph();
///
/// let a = TrackedTensor::leaf(DenseTensor::ones(&[2, 3]));
/// let b = TrackedTensor::leaf(DenseTensor::ones(&[3, 4]));
/// let loss = ops::sum(&ops::matmul(&a, &b).unwrap());
///
/// let grads = backward(&loss).unwrap();
/// assert_eq!(grads.get(a.node_id().unwrap()).unwrap().data(), &[4.0; 6]);
/// ```
pub fn backward(loss: &TrackedTensor) -> Result<Gradients, TensorError> {
    let roots = root_ids(&[loss])?;
    let seeds = seed_gradients(&[loss], None)?;
    run_backward(&roots, seeds, Targets::Leaves, &GradOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::graph::{clear_graph, is_grad_enabled};
    use crate::autodiff::ops;

    fn leaf(data: &[f64]) -> TrackedTensor {
        TrackedTensor::leaf(DenseTensor::from_vec(data.to_vec(), &[data.len()]).unwrap())
    }

    #[test]
    fn test_backward_chain() {
        clear_graph();
        // leaf -> scale(2) -> scale(3) -> loss
        let x = leaf(&[1.0]);
        let loss = ops::scale(&ops::scale(&x, 2.0), 3.0);

        let grads = backward(&loss).unwrap();
        assert_eq!(grads.get(x.node_id().unwrap()).unwrap().data(), &[6.0]);
    }

    #[test]
    fn test_backward_non_scalar_error() {
        clear_graph();
        let x = leaf(&[1.0, 2.0, 3.0]);
        let y = ops::scale(&x, 2.0);
        assert!(matches!(
            backward(&y),
            Err(TensorError::NonScalarOutput { index: 0, len: 3 })
        ));
    }

    #[test]
    fn test_backward_not_in_graph_error() {
        let loss = TrackedTensor::new(DenseTensor::scalar(1.0));
        assert!(matches!(
            backward(&loss),
            Err(TensorError::NotDifferentiable { role: "outputs", .. })
        ));
    }

    #[test]
    fn test_diamond_accumulates_once_per_path() {
        clear_graph();
        // y = x^2 is reused: f = y * y = x^4, f'(2) = 32
        let x = leaf(&[2.0]);
        let y = ops::mul(&x, &x).unwrap();
        let f = ops::mul(&y, &y).unwrap();

        let grads = grad(&[&f], &[&x], None, &GradOptions::default()).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data(), &[32.0]);
    }

    #[test]
    fn test_intermediate_input() {
        clear_graph();
        let x = leaf(&[3.0]);
        let y = ops::scale(&x, 2.0);
        let f = ops::mul(&y, &y).unwrap();

        // df/dy = 2y = 12
        let grads = grad(&[&f], &[&y], None, &GradOptions::default()).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data(), &[12.0]);
    }

    #[test]
    fn test_output_is_its_own_input() {
        clear_graph();
        let x = leaf(&[3.0]);
        let grads = grad(&[&x], &[&x], None, &GradOptions::default()).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data(), &[1.0]);
    }

    #[test]
    fn test_unused_input() {
        clear_graph();
        let x = leaf(&[1.0]);
        let unused = leaf(&[1.0]);
        let f = ops::scale(&x, 2.0);

        let options = GradOptions::default().with_retain_graph(true);
        assert!(matches!(
            grad(&[&f], &[&x, &unused], None, &options),
            Err(TensorError::UnusedInput { index: 1 })
        ));

        let grads = grad(&[&f], &[&x, &unused], None, &options.with_allow_unused(true)).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data(), &[2.0]);
        assert!(grads[1].is_none());
    }

    #[test]
    fn test_untracked_input_is_rejected() {
        clear_graph();
        let x = leaf(&[1.0]);
        let c = TrackedTensor::new(DenseTensor::scalar(1.0));
        let f = ops::scale(&x, 2.0);
        assert!(matches!(
            grad(&[&f], &[&x, &c], None, &GradOptions::default()),
            Err(TensorError::NotDifferentiable {
                role: "inputs",
                index: 1
            })
        ));
    }

    #[test]
    fn test_seed_validation() {
        clear_graph();
        let x = leaf(&[1.0, 2.0]);
        let y = ops::scale(&x, 3.0);
        let options = GradOptions::default().with_retain_graph(true);

        assert!(matches!(
            grad(&[&y], &[&x], None, &options),
            Err(TensorError::NonScalarOutput { index: 0, len: 2 })
        ));

        let bad = TrackedTensor::new(DenseTensor::ones(&[3]));
        assert!(matches!(
            grad(&[&y], &[&x], Some(&[&bad]), &options),
            Err(TensorError::IncompatibleShapes { .. })
        ));
        assert!(matches!(
            grad(&[&y], &[&x], Some(&[]), &options),
            Err(TensorError::SeedCountMismatch {
                expected: 1,
                actual: 0
            })
        ));

        let seed = TrackedTensor::new(DenseTensor::from_vec(vec![1.0, -1.0], &[2]).unwrap());
        let grads = grad(&[&y], &[&x], Some(&[&seed]), &options).unwrap();
        assert_eq!(grads[0].as_ref().unwrap().data(), &[3.0, -3.0]);
    }

    #[test]
    fn test_release_then_reuse_fails() {
        clear_graph();
        let x = leaf(&[2.0]);
        let f = ops::mul(&x, &x).unwrap();

        grad(&[&f], &[&x], None, &GradOptions::default()).unwrap();
        assert!(matches!(
            grad(&[&f], &[&x], None, &GradOptions::default()),
            Err(TensorError::GraphReleased { .. })
        ));
    }

    #[test]
    fn test_retain_graph_allows_reuse() {
        clear_graph();
        let x = leaf(&[2.0]);
        let f = ops::mul(&x, &x).unwrap();
        let options = GradOptions::default().with_retain_graph(true);

        let first = grad(&[&f], &[&x], None, &options).unwrap();
        let second = grad(&[&f], &[&x], None, &options).unwrap();
        assert_eq!(
            first[0].as_ref().unwrap().data(),
            second[0].as_ref().unwrap().data()
        );
    }

    #[test]
    fn test_pruned_branch_is_not_released() {
        clear_graph();
        let x = leaf(&[1.0]);
        let w = leaf(&[4.0]);
        let w_sq = ops::mul(&w, &w).unwrap();
        let f = ops::add(&ops::scale(&x, 2.0), &w_sq).unwrap();

        // Only x is requested; the w branch is never expanded.
        grad(&[&f], &[&x], None, &GradOptions::default()).unwrap();
        let released = with_graph(|g| g.get_node(w_sq.node_id().unwrap()).unwrap().is_released());
        assert!(!released);
    }

    #[test]
    fn test_release_graph_after_retained_pass() {
        clear_graph();
        let x = leaf(&[2.0]);
        let y = ops::exp(&x);
        let f = ops::mul(&y, &y).unwrap();
        let options = GradOptions::default().with_retain_graph(true);

        grad(&[&f], &[&x], None, &options).unwrap();
        assert_eq!(with_graph(|g| g.num_live()), 2);

        assert_eq!(release_graph(&[&f], &[&x]).unwrap(), 2);
        assert_eq!(with_graph(|g| g.num_live()), 0);
        // Releasing twice is a no-op.
        assert_eq!(release_graph(&[&f], &[&x]).unwrap(), 0);
        assert!(matches!(
            grad(&[&f], &[&x], None, &options),
            Err(TensorError::GraphReleased { .. })
        ));
    }

    #[test]
    fn test_create_graph_returns_tracked_gradients() {
        clear_graph();
        let x = leaf(&[3.0]);
        let f = ops::powf(&x, 3.0);

        let options = GradOptions::default().with_create_graph(true);
        let first = grad(&[&f], &[&x], None, &options).unwrap();
        let g = first[0].clone().unwrap();
        assert!(g.requires_grad());
        assert_eq!(g.data(), &[27.0]);

        // d/dx 3x^2 = 6x = 18
        let second = grad(&[&g], &[&x], None, &GradOptions::default()).unwrap();
        assert_eq!(second[0].as_ref().unwrap().data(), &[18.0]);
    }

    #[test]
    fn test_grad_mode_restored_after_pass() {
        clear_graph();
        let x = leaf(&[1.0]);
        let f = ops::exp(&x);
        grad(&[&f], &[&x], None, &GradOptions::default()).unwrap();
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_detached_results_without_create_graph() {
        clear_graph();
        let x = leaf(&[1.0, 2.0]);
        let f = ops::dot(&x, &x).unwrap();
        let grads = grad(&[&f], &[&x], None, &GradOptions::default()).unwrap();
        assert!(!grads[0].as_ref().unwrap().requires_grad());
    }
}
