use crate::ball::{BregmanBall, Bound};
use crate::data_wrappers::Edge;
use crate::dataset::Dataset;
use crate::edge_policy::{EdgePolicy, MstMaxEdge};
use crate::tree::{BallTreeNode, BregmanBallTree};
use crate::union_find::UnionFind;
use crate::BregmanDivergence;
use log::{debug, warn};
use num_traits::Float;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Minimum spanning trees over the points of a [`BregmanBallTree`] with Boruvka's algorithm.
///
/// Every round finds, for each connected component, the lightest edge leaving it, then commits
/// those edges. Three ways of finding the edges are offered: an exhaustive scan, a pruned search
/// of the tree for every point (single-tree) and a pruned traversal of pairs of nodes
/// (dual-tree). All three yield a spanning tree of the same total weight.
///
/// The computations annotate the tree's bounds with component ids, hence the mutable borrow;
/// the annotations are cleared again before a computation returns.
#[derive(Debug)]
pub struct MinimumSpanningTree<'a, T, D, B = BregmanBall<T>, P = MstMaxEdge> {
    tree: &'a mut BregmanBallTree<T, D, B>,
    policy: P,
    state: Boruvka<T>,
    edge_list: Vec<Edge<T>>,
}

impl<'a, T, D, B> MinimumSpanningTree<'a, T, D, B, MstMaxEdge>
where
    T: Float,
    D: BregmanDivergence<T>,
    B: Bound<T>,
{
    pub fn new(tree: &'a mut BregmanBallTree<T, D, B>) -> Self {
        Self::with_policy(tree, MstMaxEdge)
    }
}

impl<'a, T, D, B, P> MinimumSpanningTree<'a, T, D, B, P>
where
    T: Float,
    D: BregmanDivergence<T>,
    B: Bound<T>,
    P: EdgePolicy<T>,
{
    pub fn with_policy(tree: &'a mut BregmanBallTree<T, D, B>, policy: P) -> Self {
        let n_samples = tree.len();
        MinimumSpanningTree {
            tree,
            policy,
            state: Boruvka::new(n_samples),
            edge_list: Vec::new(),
        }
    }

    /// Boruvka's algorithm, comparing every pair of points in every round.
    ///
    /// # Parameters
    /// * `use_precomputed_matrix` - computes all `n²` edge weights once up front instead of in
    ///   every round
    pub fn compute_naive(&mut self, use_precomputed_matrix: bool) -> &[Edge<T>] {
        self.start();
        let data = self.tree.dataset();
        let divergence = self.tree.divergence();
        let n_samples = data.len();
        let matrix = use_precomputed_matrix.then(|| {
            let mut matrix = vec![T::zero(); n_samples * n_samples];
            for i in 0..n_samples {
                for j in (i + 1)..n_samples {
                    let weight = self.policy.edge_weight(divergence, data.point(i), data.point(j));
                    matrix[i * n_samples + j] = weight;
                    matrix[j * n_samples + i] = weight;
                }
            }
            matrix
        });

        let mut round = 0;
        while self.state.needs_round() {
            round += 1;
            let roots = self.state.refresh_components();
            for i in 0..n_samples {
                for j in (i + 1)..n_samples {
                    if self.state.component[i] == self.state.component[j] {
                        continue;
                    }
                    let weight = match &matrix {
                        Some(matrix) => matrix[i * n_samples + j],
                        None => self.policy.edge_weight(divergence, data.point(i), data.point(j)),
                    };
                    self.state.offer(i, j, weight);
                    self.state.offer(j, i, weight);
                }
            }
            if !self.state.commit(&roots, round) {
                break;
            }
        }
        self.finish()
    }

    /// Boruvka's algorithm with one pruned search of the tree per point and round. Subtrees
    /// already inside the point's component are skipped.
    pub fn compute_stb(&mut self) -> &[Edge<T>] {
        self.start();
        let gradients = self.gradients();
        let mut round = 0;
        while self.state.needs_round() {
            round += 1;
            let roots = self.state.refresh_components();
            let (data, divergence, root) = self.tree.parts_mut();
            update_components(root, &self.state.component);
            let root = &*root;

            let search = PointSearch {
                data,
                divergence,
                policy: &self.policy,
            };
            for (i, gradient) in gradients.iter().enumerate() {
                search.search(root, i, gradient, &mut self.state);
            }
            if !self.state.commit(&roots, round) {
                break;
            }
        }
        self.finish()
    }

    /// Boruvka's algorithm with a traversal of pairs of nodes per round, pruning pairs that
    /// already share a component or whose bounds are too far apart.
    pub fn compute_dtb(&mut self) -> &[Edge<T>] {
        self.start();
        let mut round = 0;
        while self.state.needs_round() {
            round += 1;
            let roots = self.state.refresh_components();
            let (data, divergence, root) = self.tree.parts_mut();
            update_components(root, &self.state.component);
            let root = &*root;

            let traversal = DualTraversal {
                data,
                divergence,
                policy: &self.policy,
            };
            traversal.traverse(root, root, &mut self.state);
            if !self.state.commit(&roots, round) {
                break;
            }
        }
        self.finish()
    }

    /// The edges of the last computation, sorted by ascending weight, between indices of the
    /// data the tree was built from.
    pub fn edge_list(&self) -> &[Edge<T>] {
        &self.edge_list
    }

    pub fn total_weight(&self) -> T {
        self.edge_list
            .iter()
            .fold(T::zero(), |total, edge| total + edge.weight)
    }

    fn start(&mut self) {
        self.tree.reset_components();
        self.state.reset();
        self.edge_list.clear();
    }

    fn finish(&mut self) -> &[Edge<T>] {
        self.tree.reset_components();
        let permutation = self.tree.permutation();
        let mut edges: Vec<Edge<T>> = self
            .state
            .edges
            .iter()
            .map(|edge| {
                let (u, v) = (permutation[edge.u], permutation[edge.v]);
                Edge {
                    u: u.min(v),
                    v: u.max(v),
                    weight: edge.weight,
                }
            })
            .collect();
        edges.sort_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(Ordering::Equal));
        self.edge_list = edges;
        &self.edge_list
    }

    fn gradients(&self) -> Vec<Vec<T>> {
        let data = self.tree.dataset();
        (0..data.len())
            .map(|i| self.tree.divergence().gradient(data.point(i)))
            .collect()
    }
}

// Working state of one computation. Points are identified by stored position throughout.
#[derive(Debug, Clone)]
struct Boruvka<T> {
    union_find: UnionFind,
    // The component of every point at the start of the current round
    component: Vec<usize>,
    candidate_dist: Vec<T>,
    candidate_edge: Vec<Option<(usize, usize)>>,
    // Largest candidate over the points of a node spanning several components, keyed by the
    // node's point range. Candidates only shrink within a round, so an outdated entry is still
    // an upper bound.
    node_bounds: HashMap<(usize, usize), T>,
    edges: Vec<Edge<T>>,
}

impl<T: Float> Boruvka<T> {
    fn new(n_samples: usize) -> Self {
        Boruvka {
            union_find: UnionFind::new(n_samples),
            component: (0..n_samples).collect(),
            candidate_dist: vec![T::infinity(); n_samples],
            candidate_edge: vec![None; n_samples],
            node_bounds: HashMap::new(),
            edges: Vec::with_capacity(n_samples.saturating_sub(1)),
        }
    }

    fn reset(&mut self) {
        self.union_find.reset();
        self.component
            .iter_mut()
            .enumerate()
            .for_each(|(i, c)| *c = i);
        self.candidate_dist.iter_mut().for_each(|d| *d = T::infinity());
        self.candidate_edge.iter_mut().for_each(|e| *e = None);
        self.node_bounds.clear();
        self.edges.clear();
    }

    fn needs_round(&self) -> bool {
        self.edges.len() + 1 < self.component.len()
    }

    // Snapshots the component of every point. Returns the component roots.
    fn refresh_components(&mut self) -> Vec<usize> {
        self.node_bounds.clear();
        let mut roots = Vec::new();
        for i in 0..self.component.len() {
            let root = self.union_find.find(i);
            self.component[i] = root;
            if root == i {
                roots.push(i);
            }
        }
        roots
    }

    fn candidate(&self, point: usize) -> T {
        self.candidate_dist[self.component[point]]
    }

    // Offers the edge from `from` to `to` as a candidate for the component of `from`.
    fn offer(&mut self, from: usize, to: usize, weight: T) {
        let component = self.component[from];
        if weight < self.candidate_dist[component] {
            self.candidate_dist[component] = weight;
            self.candidate_edge[component] = Some((from, to));
        }
    }

    // Commits the candidate of every component. Another component's edge committed earlier in
    // the same pass may already have joined the endpoints, so each edge is checked again
    // against the union find before it is added. Returns whether any edge was added.
    fn commit(&mut self, roots: &[usize], round: usize) -> bool {
        let mut committed = 0;
        for &root in roots {
            if let Some((u, v)) = self.candidate_edge[root].take() {
                if self.union_find.find(u) != self.union_find.find(v) {
                    self.union_find.union(u, v);
                    self.edges.push(Edge {
                        u,
                        v,
                        weight: self.candidate_dist[root],
                    });
                    committed += 1;
                }
            }
            self.candidate_dist[root] = T::infinity();
        }
        debug!(
            "Boruvka round {round}: {} components, {committed} edges added, {} in total",
            roots.len(),
            self.edges.len()
        );
        if committed == 0 {
            warn!(
                "No finite edge joins the remaining {} components; returning a spanning forest",
                roots.len()
            );
        }
        committed > 0
    }
}

// Sets the component of every node: a leaf's if all its points share one, an internal node's
// if both children share one.
fn update_components<T: Float, B: Bound<T>>(
    node: &mut BallTreeNode<T, B>,
    component: &[usize],
) -> Option<usize> {
    let node_component = match node.children_mut() {
        Some((left, right)) => {
            let left_component = update_components(left, component);
            let right_component = update_components(right, component);
            if left_component.is_some() && left_component == right_component {
                left_component
            } else {
                None
            }
        }
        None => {
            let first = component[node.begin()];
            node.range().all(|i| component[i] == first).then_some(first)
        }
    };
    node.bound_mut().ball_mut().set_component(node_component);
    node_component
}

struct PointSearch<'t, T, D, P> {
    data: &'t Dataset<T>,
    divergence: &'t D,
    policy: &'t P,
}

impl<T: Float, D: BregmanDivergence<T>, P: EdgePolicy<T>> PointSearch<'_, T, D, P> {
    fn search<B: Bound<T>>(
        &self,
        node: &BallTreeNode<T, B>,
        query: usize,
        query_gradient: &[T],
        state: &mut Boruvka<T>,
    ) {
        let query_component = state.component[query];
        let query_point = self.data.point(query);
        let (left, right) = match (node.left(), node.right()) {
            (Some(left), Some(right)) => (left, right),
            _ => {
                for j in node.range() {
                    if state.component[j] != query_component {
                        let weight = self
                            .policy
                            .edge_weight(self.divergence, query_point, self.data.point(j));
                        state.offer(query, j, weight);
                    }
                }
                return;
            }
        };

        let left_divergence = self.divergence.divergence(query_point, left.right_center());
        let right_divergence = self.divergence.divergence(query_point, right.right_center());
        let children = if left_divergence <= right_divergence {
            [(left, left_divergence), (right, right_divergence)]
        } else {
            [(right, right_divergence), (left, left_divergence)]
        };
        for (child, child_divergence) in children {
            if child.bound().ball().component() == Some(query_component) {
                continue;
            }
            if self.policy.can_prune_point(
                self.divergence,
                query_point,
                query_gradient,
                child.bound(),
                state.candidate(query),
                child_divergence,
            ) {
                continue;
            }
            self.search(child, query, query_gradient, state);
        }
    }
}

struct DualTraversal<'t, T, D, P> {
    data: &'t Dataset<T>,
    divergence: &'t D,
    policy: &'t P,
}

impl<T: Float, D: BregmanDivergence<T>, P: EdgePolicy<T>> DualTraversal<'_, T, D, P> {
    fn traverse<B: Bound<T>>(
        &self,
        query: &BallTreeNode<T, B>,
        reference: &BallTreeNode<T, B>,
        state: &mut Boruvka<T>,
    ) {
        let query_component = query.bound().ball().component();
        if query_component.is_some() && query_component == reference.bound().ball().component() {
            return;
        }
        let bound_distance = node_bound_distance(query, state);
        if self
            .policy
            .can_prune_bounds(self.divergence, query.bound(), reference.bound(), bound_distance)
        {
            return;
        }

        match (query.left().zip(query.right()), reference.left().zip(reference.right())) {
            (None, None) => self.base_case(query, reference, state),
            (None, Some(reference_children)) => {
                for child in self.nearest_first(query, reference_children) {
                    self.traverse(query, child, state);
                }
            }
            (Some((query_left, query_right)), None) => {
                self.traverse(query_left, reference, state);
                self.traverse(query_right, reference, state);
            }
            (Some((query_left, query_right)), Some(reference_children)) => {
                for query_child in [query_left, query_right] {
                    for child in self.nearest_first(query_child, reference_children) {
                        self.traverse(query_child, child, state);
                    }
                }
            }
        }
        refresh_node_bound(query, state);
    }

    fn base_case<B: Bound<T>>(
        &self,
        query: &BallTreeNode<T, B>,
        reference: &BallTreeNode<T, B>,
        state: &mut Boruvka<T>,
    ) {
        for i in query.range() {
            for j in reference.range() {
                if state.component[i] == state.component[j] {
                    continue;
                }
                let weight = self
                    .policy
                    .edge_weight(self.divergence, self.data.point(i), self.data.point(j));
                state.offer(i, j, weight);
                state.offer(j, i, weight);
            }
        }
    }

    fn nearest_first<'n, B: Bound<T>>(
        &self,
        query: &BallTreeNode<T, B>,
        (left, right): (&'n BallTreeNode<T, B>, &'n BallTreeNode<T, B>),
    ) -> [&'n BallTreeNode<T, B>; 2] {
        let left_weight = self
            .policy
            .edge_weight(self.divergence, query.right_center(), left.right_center());
        let right_weight = self
            .policy
            .edge_weight(self.divergence, query.right_center(), right.right_center());
        if right_weight < left_weight {
            [right, left]
        } else {
            [left, right]
        }
    }
}

// An upper bound on the candidates of the components of the node's points: an edge of at
// most this weight could still improve some component.
fn node_bound_distance<T: Float, B: Bound<T>>(node: &BallTreeNode<T, B>, state: &Boruvka<T>) -> T {
    if let Some(component) = node.bound().ball().component() {
        return state.candidate_dist[component];
    }
    match state.node_bounds.get(&(node.begin(), node.end())) {
        Some(&bound) => bound,
        None if node.is_leaf() => leaf_bound_distance(node, state),
        None => T::infinity(),
    }
}

fn leaf_bound_distance<T: Float, B: Bound<T>>(node: &BallTreeNode<T, B>, state: &Boruvka<T>) -> T {
    node.range()
        .map(|i| state.candidate(i))
        .fold(T::neg_infinity(), T::max)
}

// Tightens the cached bound of a mixed node once a traversal below it has lowered candidates.
fn refresh_node_bound<T: Float, B: Bound<T>>(node: &BallTreeNode<T, B>, state: &mut Boruvka<T>) {
    if node.bound().ball().component().is_some() {
        return;
    }
    let bound = match node.left().zip(node.right()) {
        Some((left, right)) => {
            node_bound_distance(left, state).max(node_bound_distance(right, state))
        }
        None => leaf_bound_distance(node, state),
    };
    state.node_bounds.insert((node.begin(), node.end()), bound);
}
