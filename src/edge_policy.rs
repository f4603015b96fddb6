use crate::ball::Bound;
use crate::BregmanDivergence;
use num_traits::Float;

/// Defines the weight of an edge between two points for a minimum spanning tree, together with
/// conservative tests showing that no edge into a region of the tree can beat a candidate.
pub trait EdgePolicy<T: Float> {
    fn edge_weight<D: BregmanDivergence<T>>(&self, divergence: &D, x: &[T], y: &[T]) -> T;

    /// Returns true only if no point in `bound` is joined to `query` by an edge lighter than
    /// `candidate`.
    ///
    /// # Parameters
    /// * `query_gradient` - `∇f(query)`
    /// * `query_div_to_centroid` - `D(query, right centroid of bound)`
    fn can_prune_point<D: BregmanDivergence<T>, B: Bound<T>>(
        &self,
        divergence: &D,
        query: &[T],
        query_gradient: &[T],
        bound: &B,
        candidate: T,
        query_div_to_centroid: T,
    ) -> bool;

    /// Returns true only if no point in `query_bound` is joined to a point in
    /// `reference_bound` by an edge lighter than `bound_distance`.
    fn can_prune_bounds<D: BregmanDivergence<T>, B: Bound<T>>(
        &self,
        divergence: &D,
        query_bound: &B,
        reference_bound: &B,
        bound_distance: T,
    ) -> bool;
}

/// Edges weighted by the larger of the two directed divergences, `max(D(x, y), D(y, x))`,
/// which makes the weight symmetric for asymmetric divergences.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct MstMaxEdge;

impl<T: Float> EdgePolicy<T> for MstMaxEdge {
    fn edge_weight<D: BregmanDivergence<T>>(&self, divergence: &D, x: &[T], y: &[T]) -> T {
        divergence.divergence(x, y).max(divergence.divergence(y, x))
    }

    // The weight is at least D(x, query), which is what the bound's own test covers
    fn can_prune_point<D: BregmanDivergence<T>, B: Bound<T>>(
        &self,
        divergence: &D,
        query: &[T],
        query_gradient: &[T],
        bound: &B,
        candidate: T,
        query_div_to_centroid: T,
    ) -> bool {
        bound.can_prune_point(divergence, query, query_gradient, candidate, query_div_to_centroid)
    }

    fn can_prune_bounds<D: BregmanDivergence<T>, B: Bound<T>>(
        &self,
        divergence: &D,
        query_bound: &B,
        reference_bound: &B,
        bound_distance: T,
    ) -> bool {
        let centroid_divergence = divergence.divergence(
            query_bound.ball().right_centroid(),
            reference_bound.ball().right_centroid(),
        );
        query_bound.can_prune_bound(
            reference_bound,
            divergence,
            bound_distance,
            centroid_divergence,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ball::BregmanBall;
    use crate::{KlDivergence, SquaredEuclidean};

    #[test]
    fn max_edge_is_symmetric() {
        let kl = KlDivergence::new();
        let x = [0.7, 0.2, 0.1];
        let y = [0.3, 0.3, 0.4];
        let forward = MstMaxEdge.edge_weight(&kl, &x, &y);
        assert_eq!(forward, MstMaxEdge.edge_weight(&kl, &y, &x));
        assert!(forward >= kl.divergence(&x, &y));
        assert!(forward >= kl.divergence(&y, &x));
    }

    #[test]
    fn point_pruning_follows_the_ball() {
        let ball = BregmanBall::new(vec![0.0], 0.5, &SquaredEuclidean);
        let query = [3.0];
        let to_centroid = SquaredEuclidean.divergence(&query, &[0.0]);
        let prune = |candidate: f64| {
            MstMaxEdge.can_prune_point(
                &SquaredEuclidean,
                &query,
                &query,
                &ball,
                candidate,
                to_centroid,
            )
        };
        assert!(prune(1.9));
        assert!(!prune(2.0));
        assert!(!prune(2.1));
    }
}
