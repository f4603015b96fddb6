//! Bregman ball trees in Rust: exact nearest neighbour search and minimum spanning trees under
//! any Bregman divergence. Generic over floating point numeric types.
//!
//! A Bregman divergence `D_f(x, y) = f(x) - f(y) - <∇f(y), x - y>` generalises the squared
//! Euclidean distance to any strictly convex generator `f`. The Kullback-Leibler divergence,
//! generated by `f(x) = Σ xᵢ log xᵢ`, is the best known example. Bregman divergences are in
//! general neither symmetric nor do they satisfy the triangle inequality, so metric trees can't
//! prune with them. A Bregman ball tree bounds each node with a Bregman ball
//! `{x : D(x, μ) <= R}` instead, and prunes by searching the Bregman geodesic between the ball's
//! centroid and the query for a lower bound on the divergence of any point in the ball.
//!
//! The crate offers:
//!  1. [`BregmanBallTree`] - built top down by Bregman 2-means, stopping at a maximum leaf size or
//!     a minimum ball width;
//!  2. [`NearestNeighbourSearch`] - nearest and k-nearest neighbours, `argmin D(x, q)`, with
//!     exhaustive scans as oracles; and
//!  3. [`MinimumSpanningTree`] - Boruvka's algorithm in naive, single-tree and dual-tree form,
//!     weighting edges with the larger of the two directed divergences.
//!
//! # Examples
//! ```
//!use bregman_tree::{
//!    BregmanBallTree, KlDivergence, MinimumSpanningTree, NearestNeighbourSearch, TreeParams,
//!};
//!
//!let data: Vec<Vec<f64>> = vec![
//!    vec![0.7, 0.2, 0.1],
//!    vec![0.6, 0.3, 0.1],
//!    vec![0.1, 0.8, 0.1],
//!    vec![0.2, 0.7, 0.1],
//!    vec![0.1, 0.1, 0.8],
//!    vec![0.2, 0.1, 0.7],
//!];
//!let params = TreeParams::builder().max_leaf_size(2).seed(42).build();
//!let mut tree: BregmanBallTree<f64, KlDivergence> =
//!    BregmanBallTree::build(&data, &params, KlDivergence::new()).unwrap();
//!
//!let search = NearestNeighbourSearch::new(&tree);
//!assert_eq!(Some(1), search.compute_neighbour(&[0.55, 0.35, 0.1]).unwrap());
//!
//!let mut mst = MinimumSpanningTree::new(&mut tree);
//!assert_eq!(5, mst.compute_dtb().len());
//! ```
//!
//! # References
//! * [Cayton, L. Fast nearest neighbor retrieval for Bregman divergences.][cayton]
//! * [March, W.B.; Ram, P.; Gray, A.G. Fast Euclidean minimum spanning tree: algorithm,
//!   analysis, and applications.][march]
//!
//! [cayton]: https://doi.org/10.1145/1390156.1390171
//! [march]: https://doi.org/10.1145/1835804.1835882

pub use crate::ball::{Bound, BregmanBall};
pub use crate::data_wrappers::{Edge, Partition};
pub use crate::dataset::Dataset;
pub use crate::divergence::{
    BregmanDivergence, Counted, DivergenceCalls, DivergenceKind, KlDivergence, SquaredEuclidean,
};
pub use crate::edge_policy::{EdgePolicy, MstMaxEdge};
pub use crate::enhanced_ball::EnhancedBall;
pub use crate::error::BregmanError;
pub use crate::hyper_parameters::{TreeParamBuilder, TreeParams};
pub use crate::min_spanning_tree::MinimumSpanningTree;
pub use crate::nearest_neighbour::NearestNeighbourSearch;
pub use crate::splitter::{KMeansSplitter, Splitter};
pub use crate::tree::{BallTreeNode, BregmanBallTree};
pub use crate::union_find::UnionFind;

mod ball;
mod data_wrappers;
mod dataset;
mod divergence;
mod edge_policy;
mod enhanced_ball;
mod error;
mod hyper_parameters;
mod min_spanning_tree;
mod nearest_neighbour;
mod point;
mod splitter;
mod tree;
mod union_find;
pub mod util;
mod validation;
