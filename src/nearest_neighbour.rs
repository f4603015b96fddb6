use crate::ball::{BregmanBall, Bound};
use crate::tree::{BallTreeNode, BregmanBallTree};
use crate::validation::validate_query;
use crate::{BregmanDivergence, BregmanError};
use num_traits::Float;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Nearest neighbour queries against a [`BregmanBallTree`]. The neighbour of a query `q` is the
/// indexed point `x` minimising `D(x, q)`.
///
/// Indexed points at an infinite divergence from the query (e.g. under KL, points with a
/// positive coordinate where the query has a zero) are never neighbours, so a query may have
/// no neighbour at all.
#[derive(Debug)]
pub struct NearestNeighbourSearch<'a, T, D, B = BregmanBall<T>> {
    tree: &'a BregmanBallTree<T, D, B>,
}

impl<'a, T: Float, D: BregmanDivergence<T>, B: Bound<T>> NearestNeighbourSearch<'a, T, D, B> {
    pub fn new(tree: &'a BregmanBallTree<T, D, B>) -> Self {
        NearestNeighbourSearch { tree }
    }

    /// Finds the nearest neighbour of `query` with a best-first traversal of the tree.
    ///
    /// # Returns
    /// * The index of the neighbour in the data the tree was built from, or `None` if no
    ///   indexed point is at a finite divergence from the query.
    pub fn compute_neighbour(&self, query: &[T]) -> Result<Option<usize>, BregmanError> {
        Ok(self
            .compute_neighbour_with_divergence(query)?
            .map(|(index, _)| index))
    }

    /// As [`NearestNeighbourSearch::compute_neighbour`], also returning `D(neighbour, query)`.
    pub fn compute_neighbour_with_divergence(
        &self,
        query: &[T],
    ) -> Result<Option<(usize, T)>, BregmanError> {
        validate_query(query, self.tree.dataset().n_dims(), self.tree.divergence())?;
        let query_gradient = self.tree.divergence().gradient(query);
        let mut best = Best {
            divergence: T::infinity(),
            position: None,
        };
        self.search(self.tree.root(), query, &query_gradient, &mut best);
        Ok(best.position.map(|index| (index, best.divergence)))
    }

    /// Exhaustive scan over every indexed point.
    pub fn compute_neighbour_naive(&self, query: &[T]) -> Result<Option<usize>, BregmanError> {
        validate_query(query, self.tree.dataset().n_dims(), self.tree.divergence())?;
        let data = self.tree.dataset();
        let mut best = Best {
            divergence: T::infinity(),
            position: None,
        };
        for i in 0..data.len() {
            best.offer(
                self.tree.divergence().divergence(data.point(i), query),
                data.original_index(i),
            );
        }
        Ok(best.position)
    }

    /// Finds up to `k` nearest neighbours of `query`.
    ///
    /// # Returns
    /// * `(index, divergence)` pairs in ascending divergence, indices referring to the data
    ///   the tree was built from. Fewer than `k` pairs if fewer points are at a finite
    ///   divergence from the query.
    pub fn compute_k_neighbours(
        &self,
        query: &[T],
        k: usize,
    ) -> Result<Vec<(usize, T)>, BregmanError> {
        validate_k(k)?;
        validate_query(query, self.tree.dataset().n_dims(), self.tree.divergence())?;
        let query_gradient = self.tree.divergence().gradient(query);
        let mut heap = KBest {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        };
        self.search(self.tree.root(), query, &query_gradient, &mut heap);
        Ok(heap.into_sorted())
    }

    pub fn compute_k_neighbours_naive(
        &self,
        query: &[T],
        k: usize,
    ) -> Result<Vec<(usize, T)>, BregmanError> {
        validate_k(k)?;
        validate_query(query, self.tree.dataset().n_dims(), self.tree.divergence())?;
        let data = self.tree.dataset();
        let mut heap = KBest {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        };
        for i in 0..data.len() {
            heap.offer(
                self.tree.divergence().divergence(data.point(i), query),
                data.original_index(i),
            );
        }
        Ok(heap.into_sorted())
    }

    fn search<C: Candidates<T>>(
        &self,
        node: &BallTreeNode<T, B>,
        query: &[T],
        query_gradient: &[T],
        candidates: &mut C,
    ) {
        let divergence = self.tree.divergence();
        let (left, right) = match (node.left(), node.right()) {
            (Some(left), Some(right)) => (left, right),
            _ => {
                let data = self.tree.dataset();
                for i in node.range() {
                    candidates.offer(
                        divergence.divergence(data.point(i), query),
                        data.original_index(i),
                    );
                }
                return;
            }
        };

        let left_divergence = divergence.divergence(query, left.right_center());
        let right_divergence = divergence.divergence(query, right.right_center());
        let (near, far, far_divergence) = if left_divergence <= right_divergence {
            (left, right, right_divergence)
        } else {
            (right, left, left_divergence)
        };

        self.search(near, query, query_gradient, candidates);
        if !far.bound().can_prune_point(
            divergence,
            query,
            query_gradient,
            candidates.threshold(),
            far_divergence,
        ) {
            self.search(far, query, query_gradient, candidates);
        }
    }
}

fn validate_k(k: usize) -> Result<(), BregmanError> {
    if k == 0 {
        return Err(BregmanError::ConfigError(String::from(
            "At least one neighbour must be requested",
        )));
    }
    Ok(())
}

// The running result of a search. Points are offered by original index, and among points at
// equal divergence the lowest index wins, so the result doesn't depend on the visiting order.
// Only regions whose points are all strictly farther than the threshold can be pruned.
trait Candidates<T> {
    fn threshold(&self) -> T;

    fn offer(&mut self, divergence: T, index: usize);
}

struct Best<T> {
    divergence: T,
    position: Option<usize>,
}

impl<T: Float> Candidates<T> for Best<T> {
    fn threshold(&self) -> T {
        self.divergence
    }

    fn offer(&mut self, divergence: T, index: usize) {
        let improves = divergence < self.divergence
            || (divergence == self.divergence && self.position.is_some_and(|p| index < p));
        if improves {
            self.divergence = divergence;
            self.position = Some(index);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate<T> {
    divergence: T,
    position: usize,
}

impl<T: Float> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Float> Eq for Candidate<T> {}

impl<T: Float> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Only finite divergences are ever stored. Ties go to the lower original index.
impl<T: Float> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.divergence
            .partial_cmp(&other.divergence)
            .unwrap_or(Ordering::Equal)
            .then(self.position.cmp(&other.position))
    }
}

struct KBest<T> {
    k: usize,
    heap: BinaryHeap<Candidate<T>>,
}

impl<T: Float> Candidates<T> for KBest<T> {
    fn threshold(&self) -> T {
        if self.heap.len() < self.k {
            T::infinity()
        } else {
            self.heap.peek().map_or(T::infinity(), |c| c.divergence)
        }
    }

    fn offer(&mut self, divergence: T, index: usize) {
        if !(divergence < T::infinity()) {
            return;
        }
        let candidate = Candidate {
            divergence,
            position: index,
        };
        let accepted = self.heap.len() < self.k
            || self.heap.peek().is_some_and(|worst| candidate < *worst);
        if accepted {
            self.heap.push(candidate);
            if self.heap.len() > self.k {
                self.heap.pop();
            }
        }
    }
}

impl<T: Float> KBest<T> {
    fn into_sorted(self) -> Vec<(usize, T)> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.position, c.divergence))
            .collect()
    }
}
