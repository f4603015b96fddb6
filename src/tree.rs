use crate::ball::{BregmanBall, Bound};
use crate::data_wrappers::Partition;
use crate::dataset::Dataset;
use crate::point;
use crate::splitter::{KMeansSplitter, Splitter};
use crate::validation::DataValidator;
use crate::{BregmanDivergence, BregmanError, TreeParams};
use log::debug;
use num_traits::Float;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ops::Range;

/// A node of a [`BregmanBallTree`]: a contiguous range of the tree's reordered dataset and the
/// bound of the points in it. Leaves have no children; internal nodes always have both.
#[derive(Debug, Clone)]
pub struct BallTreeNode<T, B = BregmanBall<T>> {
    begin: usize,
    end: usize,
    bound: B,
    left: Option<Box<BallTreeNode<T, B>>>,
    right: Option<Box<BallTreeNode<T, B>>>,
    _coordinate: PhantomData<T>,
}

impl<T: Float, B: Bound<T>> BallTreeNode<T, B> {
    fn new(begin: usize, end: usize, bound: B) -> Self {
        BallTreeNode {
            begin,
            end,
            bound,
            left: None,
            right: None,
            _coordinate: PhantomData,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn left(&self) -> Option<&BallTreeNode<T, B>> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&BallTreeNode<T, B>> {
        self.right.as_deref()
    }

    pub(crate) fn children_mut(
        &mut self,
    ) -> Option<(&mut BallTreeNode<T, B>, &mut BallTreeNode<T, B>)> {
        match (self.left.as_deref_mut(), self.right.as_deref_mut()) {
            (Some(left), Some(right)) => Some((left, right)),
            _ => None,
        }
    }

    /// The first stored position covered by the node.
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// One past the last stored position covered by the node.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn count(&self) -> usize {
        self.end - self.begin
    }

    pub fn range(&self) -> Range<usize> {
        self.begin..self.end
    }

    pub fn bound(&self) -> &B {
        &self.bound
    }

    pub fn bound_mut(&mut self) -> &mut B {
        &mut self.bound
    }

    pub fn right_center(&self) -> &[T] {
        self.bound.ball().right_centroid()
    }

    /// Only set when the tree was built with left bounds.
    pub fn left_center(&self) -> Option<&[T]> {
        self.bound.ball().left_centroid()
    }

    fn visit(&self, f: &mut impl FnMut(&BallTreeNode<T, B>, usize), depth: usize) {
        f(self, depth);
        if let Some(left) = self.left() {
            left.visit(f, depth + 1);
        }
        if let Some(right) = self.right() {
            right.visit(f, depth + 1);
        }
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut BallTreeNode<T, B>)) {
        f(self);
        if let Some((left, right)) = self.children_mut() {
            left.visit_mut(f);
            right.visit_mut(f);
        }
    }
}

/// A binary space partitioning tree whose nodes are bounded by Bregman balls, for nearest
/// neighbour search and minimum spanning trees under any Bregman divergence.
///
/// The tree takes a copy of the points and reorders it so that every node covers a contiguous
/// range; [`BregmanBallTree::permutation`] maps stored positions back to the caller's indices.
///
/// # Examples
/// ```
/// use bregman_tree::{BregmanBallTree, SquaredEuclidean, TreeParams};
///
/// let data: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64, (i % 7) as f64]).collect();
/// let params = TreeParams::builder().max_leaf_size(5).seed(1).build();
/// let tree: BregmanBallTree<f64, SquaredEuclidean> =
///     BregmanBallTree::build(&data, &params, SquaredEuclidean).unwrap();
/// assert_eq!(50, tree.root().count());
/// ```
#[derive(Debug, Clone)]
pub struct BregmanBallTree<T, D, B = BregmanBall<T>> {
    data: Dataset<T>,
    divergence: D,
    root: BallTreeNode<T, B>,
}

impl<T: Float, D: BregmanDivergence<T>, B: Bound<T>> BregmanBallTree<T, D, B> {
    /// Builds a tree, splitting nodes with Bregman 2-means.
    ///
    /// # Parameters
    /// * `data` - the points to index, all of the same dimensionality
    /// * `params` - the stopping rule and splitter settings
    /// * `divergence` - the divergence the tree is built and searched with
    ///
    /// # Returns
    /// * The tree, or an error if the parameters or the data are invalid
    pub fn build(
        data: &[Vec<T>],
        params: &TreeParams,
        divergence: D,
    ) -> Result<Self, BregmanError> {
        params.validate()?;
        let splitter = KMeansSplitter::new(2, params.kmeans_max_iterations, params.seed)?;
        Self::build_with_splitter(data, params, divergence, splitter)
    }

    /// Builds a tree with a custom splitter, which must split every node into two groups.
    pub fn build_with_splitter<S: Splitter<T, D>>(
        data: &[Vec<T>],
        params: &TreeParams,
        divergence: D,
        mut splitter: S,
    ) -> Result<Self, BregmanError> {
        params.validate()?;
        DataValidator::new(data, &divergence).validate_input_data()?;

        let mut dataset = Dataset::from_points(data);
        let n_samples = dataset.len();
        let stopping = StoppingRule::new(params);

        // Without a width to compare against, the root's ball comes from its children's partition
        let root_bound = match stopping {
            StoppingRule::MaxLeafSize(leaf_size) if n_samples > leaf_size => None,
            _ => Some(exact_bound::<T, D, B>(&dataset, 0..n_samples, &divergence)),
        };
        let root_splits = root_bound.as_ref().map_or(true, |bound| {
            stopping.should_split(n_samples, bound.ball().right_radius())
        });
        let mut root_pending = root_bound.is_none();
        let mut root = BallTreeNode::new(
            0,
            n_samples,
            root_bound.unwrap_or_else(|| {
                B::from_centroid(vec![T::zero(); dataset.n_dims()], T::zero(), &divergence)
            }),
        );

        let mut queue: VecDeque<&mut BallTreeNode<T, B>> = VecDeque::new();
        if root_splits {
            queue.push_back(&mut root);
        }
        while let Some(node) = queue.pop_front() {
            let range = node.range();
            let split = split_range(&mut dataset, &mut splitter, &divergence, range.clone())?;

            if root_pending && range == (0..n_samples) {
                let centroid = match &split {
                    Some((mid, partition)) => point::combine_means(
                        &partition.centers[0],
                        mid - range.start,
                        &partition.centers[1],
                        range.end - mid,
                    ),
                    None => dataset.mean(range.clone()),
                };
                let radius = max_divergence_to(&dataset, range.clone(), &centroid, &divergence);
                node.bound
                    .ball_mut()
                    .set_right_centroid(centroid, radius, &divergence);
                root_pending = false;
            }

            let Some((mid, partition)) = split else {
                continue;
            };
            let Partition { centers, radii, .. } = partition;
            let mut centers = centers.into_iter();
            let (Some(left_center), Some(right_center)) = (centers.next(), centers.next()) else {
                continue;
            };
            node.left = Some(Box::new(BallTreeNode::new(
                range.start,
                mid,
                B::from_centroid(left_center, radii[0], &divergence),
            )));
            node.right = Some(Box::new(BallTreeNode::new(
                mid,
                range.end,
                B::from_centroid(right_center, radii[1], &divergence),
            )));

            let BallTreeNode { left, right, .. } = node;
            for child in [left.as_deref_mut(), right.as_deref_mut()].into_iter().flatten() {
                let radius = child.bound.ball().right_radius();
                if child.count() > 1
                    && radius > T::zero()
                    && stopping.should_split(child.count(), radius)
                {
                    queue.push_back(child);
                }
            }
        }

        root.visit_mut(&mut |node| {
            node.bound.add_extra_stats(&dataset, node.range(), &divergence);
            if params.compute_left_bounds {
                let (centroid, radius) = left_bound(&dataset, node.range(), &divergence);
                node.bound
                    .ball_mut()
                    .set_left_centroid(centroid, radius, &divergence);
            }
        });

        let tree = BregmanBallTree {
            data: dataset,
            divergence,
            root,
        };
        debug!(
            "Built Bregman ball tree over {} points: {} nodes, {} leaves, depth {}",
            n_samples,
            tree.node_count(),
            tree.leaf_count(),
            tree.depth()
        );
        Ok(tree)
    }

    pub fn root(&self) -> &BallTreeNode<T, B> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut BallTreeNode<T, B> {
        &mut self.root
    }

    /// The points in tree order.
    pub fn dataset(&self) -> &Dataset<T> {
        &self.data
    }

    pub fn divergence(&self) -> &D {
        &self.divergence
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// For every stored position, the index of that point in the data the tree was built from.
    pub fn permutation(&self) -> &[usize] {
        self.data.permutation()
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |_, _| count += 1, 0);
        count
    }

    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(
            &mut |node, _| {
                if node.is_leaf() {
                    count += 1
                }
            },
            0,
        );
        count
    }

    /// The number of edges on the longest root to leaf path.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        self.root.visit(&mut |_, d| depth = depth.max(d), 0);
        depth
    }

    /// Clears the component annotations left on the bounds by a spanning tree computation.
    pub fn reset_components(&mut self) {
        self.root
            .visit_mut(&mut |node| node.bound.ball_mut().set_component(None));
    }

    pub(crate) fn parts_mut(&mut self) -> (&Dataset<T>, &D, &mut BallTreeNode<T, B>) {
        (&self.data, &self.divergence, &mut self.root)
    }
}

#[derive(Debug, Clone, Copy)]
enum StoppingRule<T> {
    MaxLeafSize(usize),
    MaxRadius(T),
}

impl<T: Float> StoppingRule<T> {
    // Assumes validated parameters
    fn new(params: &TreeParams) -> Self {
        if params.max_leaf_size > 0 {
            StoppingRule::MaxLeafSize(params.max_leaf_size)
        } else {
            let max_radius = T::from(params.min_ball_width / 2.0).unwrap_or_else(T::infinity);
            StoppingRule::MaxRadius(max_radius)
        }
    }

    fn should_split(&self, count: usize, radius: T) -> bool {
        match *self {
            StoppingRule::MaxLeafSize(leaf_size) => count > leaf_size,
            StoppingRule::MaxRadius(max_radius) => radius > max_radius,
        }
    }
}

// Splits and reorders a range. Returns None when the range can't be split into two non empty
// groups, in which case the node stays a leaf.
fn split_range<T, D, S>(
    dataset: &mut Dataset<T>,
    splitter: &mut S,
    divergence: &D,
    range: Range<usize>,
) -> Result<Option<(usize, Partition<T>)>, BregmanError>
where
    T: Float,
    D: BregmanDivergence<T>,
    S: Splitter<T, D>,
{
    if range.len() < 2 {
        return Ok(None);
    }
    let mut partition = match splitter.partition(dataset, range.clone(), divergence) {
        Ok(partition) => partition,
        Err(BregmanError::DegenerateInput(msg)) => {
            debug!("Leaving {} points unsplit: {msg}", range.len());
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    if partition.centers.len() != 2
        || partition.radii.len() != 2
        || partition.membership.len() != range.len()
        || partition.membership.iter().any(|&m| m > 1)
    {
        return Err(BregmanError::ConfigError(format!(
            "The splitter must divide a node into 2 groups, got {} centers",
            partition.centers.len()
        )));
    }
    let left_count = partition.count(0);
    if left_count == 0 || left_count == range.len() {
        return Ok(None);
    }
    let mid = dataset.partition(range, &mut partition.membership);
    Ok(Some((mid, partition)))
}

fn max_divergence_to<T: Float, D: BregmanDivergence<T>>(
    dataset: &Dataset<T>,
    range: Range<usize>,
    centroid: &[T],
    divergence: &D,
) -> T {
    dataset
        .points(range)
        .map(|x| divergence.divergence(x, centroid))
        .fold(T::zero(), T::max)
}

fn exact_bound<T: Float, D: BregmanDivergence<T>, B: Bound<T>>(
    dataset: &Dataset<T>,
    range: Range<usize>,
    divergence: &D,
) -> B {
    let centroid = dataset.mean(range.clone());
    let radius = max_divergence_to(dataset, range, &centroid, divergence);
    B::from_centroid(centroid, radius, divergence)
}

// The left centroid minimising Σ D(c, x) is the point whose gradient is the mean gradient.
fn left_bound<T: Float, D: BregmanDivergence<T>>(
    dataset: &Dataset<T>,
    range: Range<usize>,
    divergence: &D,
) -> (Vec<T>, T) {
    let mut mean_gradient = vec![T::zero(); dataset.n_dims()];
    for x in dataset.points(range.clone()) {
        point::add_assign(&mut mean_gradient, &divergence.gradient(x));
    }
    point::scale(
        &mut mean_gradient,
        T::one() / T::from(range.len()).unwrap_or_else(T::one),
    );
    let centroid = divergence.gradient_conjugate(&mean_gradient);
    let radius = dataset
        .points(range)
        .map(|x| divergence.divergence(&centroid, x))
        .fold(T::zero(), T::max);
    (centroid, radius)
}
