#![allow(dead_code)]

use bregman_tree::{
    BallTreeNode, Bound, BregmanBallTree, BregmanDivergence, Edge, MinimumSpanningTree,
    NearestNeighbourSearch, TreeParams, UnionFind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub type Points = fn(usize, usize, u64) -> Vec<Vec<f64>>;

/// Points spread over a handful of Gaussian-ish blobs in the unit cube.
pub fn clustered_points(n: usize, n_dims: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<Vec<f64>> = (0..5)
        .map(|_| (0..n_dims).map(|_| rng.random_range(0.2..0.8)).collect())
        .collect();
    (0..n)
        .map(|_| {
            let center = &centers[rng.random_range(0..centers.len())];
            center
                .iter()
                .map(|&c| c + rng.random_range(-0.1..0.1))
                .collect()
        })
        .collect()
}

/// Points with strictly positive coordinates summing to one.
pub fn simplex_points(n: usize, n_dims: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let raw: Vec<f64> = (0..n_dims).map(|_| rng.random_range(0.05..1.0)).collect();
            let total: f64 = raw.iter().sum();
            raw.into_iter().map(|x| x / total).collect()
        })
        .collect()
}

fn build<D, B>(data: &[Vec<f64>], leaf_size: usize, divergence: D) -> BregmanBallTree<f64, D, B>
where
    D: BregmanDivergence<f64>,
    B: Bound<f64>,
{
    let params = TreeParams::builder().max_leaf_size(leaf_size).seed(99).build();
    BregmanBallTree::build(data, &params, divergence).unwrap()
}

fn nodes<'t, B: Bound<f64>>(
    node: &'t BallTreeNode<f64, B>,
    out: &mut Vec<&'t BallTreeNode<f64, B>>,
) {
    out.push(node);
    if let (Some(left), Some(right)) = (node.left(), node.right()) {
        nodes(left, out);
        nodes(right, out);
    }
}

pub fn tree_invariants<D, B>(divergence: D, points: Points)
where
    D: BregmanDivergence<f64> + Clone,
    B: Bound<f64>,
{
    for (n, leaf_size) in [(1, 3), (40, 1), (250, 7), (500, 25)] {
        let data = points(n, 3, n as u64);
        let tree: BregmanBallTree<f64, D, B> = build(&data, leaf_size, divergence.clone());

        let mut all_nodes = Vec::new();
        nodes(tree.root(), &mut all_nodes);
        for node in all_nodes {
            let mean = tree.dataset().mean(node.range());
            let squared_norm: f64 = mean
                .iter()
                .zip(node.right_center())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            assert!(squared_norm < 1e-10);

            let radius = tree
                .dataset()
                .points(node.range())
                .map(|x| divergence.divergence(x, node.right_center()))
                .fold(0.0, f64::max);
            assert!((radius - node.bound().ball().right_radius()).abs() < 1e-10);

            if node.is_leaf() {
                assert!(node.count() <= leaf_size || radius == 0.0);
            }
        }

        for i in 0..tree.len() {
            assert_eq!(data[tree.permutation()[i]].as_slice(), tree.dataset().point(i));
        }
    }
}

pub fn search_matches_naive<D, B>(divergence: D, points: Points)
where
    D: BregmanDivergence<f64>,
    B: Bound<f64>,
{
    let data = points(400, 4, 1);
    let queries = points(60, 4, 2);
    let tree: BregmanBallTree<f64, D, B> = build(&data, 10, divergence);
    let search = NearestNeighbourSearch::new(&tree);
    for query in queries.iter().chain(data.iter().take(10)) {
        let neighbour = search.compute_neighbour(query).unwrap();
        assert!(neighbour.is_some());
        assert_eq!(search.compute_neighbour_naive(query).unwrap(), neighbour);
    }
}

pub fn k_neighbours_match_naive<D, B>(divergence: D, points: Points)
where
    D: BregmanDivergence<f64>,
    B: Bound<f64>,
{
    let data = points(300, 3, 3);
    let queries = points(30, 3, 4);
    let tree: BregmanBallTree<f64, D, B> = build(&data, 8, divergence);
    let search = NearestNeighbourSearch::new(&tree);
    for query in &queries {
        let neighbours = search.compute_k_neighbours(query, 5).unwrap();
        let expected = search.compute_k_neighbours_naive(query, 5).unwrap();
        assert_eq!(5, neighbours.len());
        for (found, wanted) in neighbours.iter().zip(expected.iter()) {
            assert!((found.1 - wanted.1).abs() < 1e-12);
        }
        for w in neighbours.windows(2) {
            assert!(w[0].1 <= w[1].1);
        }
    }
}

fn total(edges: &[Edge<f64>]) -> f64 {
    edges.iter().map(|e| e.weight).sum()
}

fn assert_spanning(edges: &[Edge<f64>], n: usize) {
    assert_eq!(n - 1, edges.len());
    let mut union_find = UnionFind::new(n);
    for edge in edges {
        assert_ne!(union_find.find(edge.u), union_find.find(edge.v));
        union_find.union(edge.u, edge.v);
    }
}

pub fn mst_variants_agree<D, B>(divergence: D, points: Points)
where
    D: BregmanDivergence<f64>,
    B: Bound<f64>,
{
    let n = 150;
    let data = points(n, 3, 5);
    let mut tree: BregmanBallTree<f64, D, B> = build(&data, 6, divergence);
    let mut mst = MinimumSpanningTree::new(&mut tree);

    let naive = mst.compute_naive(false).to_vec();
    let matrix = mst.compute_naive(true).to_vec();
    let stb = mst.compute_stb().to_vec();
    let dtb = mst.compute_dtb().to_vec();

    for edges in [&naive, &matrix, &stb, &dtb] {
        assert_spanning(edges, n);
    }
    for (a, b) in naive.iter().zip(matrix.iter()) {
        assert!((a.weight - b.weight).abs() < 1e-6);
    }
    assert!((total(&naive) - total(&stb)).abs() < 1e-6);
    assert!((total(&naive) - total(&dtb)).abs() < 1e-6);
}
