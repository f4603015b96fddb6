use crate::ball::{exceeds, BregmanBall, Bound};
use crate::dataset::Dataset;
use crate::point;
use crate::BregmanDivergence;
use num_traits::Float;
use std::ops::Range;

/// A [`BregmanBall`] that also remembers how far its points lie from the centroid in two
/// cheaper geometries, so that many queries can be pruned without the bisection:
/// * `l2_radius` - the largest `sqrt(½‖x - μ‖²)` over the points of the node.
/// * `jb_radius` - the largest `sqrt(JB(x, μ))` over the points of the node.
///
/// Both are zero until [`Bound::add_extra_stats`] has seen the node's points.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedBall<T> {
    ball: BregmanBall<T>,
    l2_radius: T,
    jb_radius: T,
}

impl<T: Float> EnhancedBall<T> {
    pub fn l2_radius(&self) -> T {
        self.l2_radius
    }

    pub fn jb_radius(&self) -> T {
        self.jb_radius
    }

    // σ * (s(q, μ) - l2_radius)² bounds D(x, q) from below for every x in the node, where
    // s is the metric sqrt(½‖·‖²).
    fn strong_convexity_bound<D: BregmanDivergence<T>>(&self, divergence: &D, query: &[T]) -> T {
        let sigma = divergence.strong_convexity_coefficient();
        if sigma <= T::zero() {
            return T::zero();
        }
        let gap = half_norm_distance(query, self.ball.right_centroid()) - self.l2_radius;
        if gap <= T::zero() {
            return T::zero();
        }
        sigma * gap * gap
    }

    // sqrt(JB) is a metric for CPD divergences and JB(x, q) <= D(x, q).
    fn jensen_bregman_bound<D: BregmanDivergence<T>>(&self, divergence: &D, query: &[T]) -> T {
        if !divergence.is_cpd() {
            return T::zero();
        }
        let jb = divergence.jensen_bregman_divergence(query, self.ball.right_centroid());
        let gap = jb.sqrt() - self.jb_radius;
        if gap.is_nan() || gap <= T::zero() {
            return T::zero();
        }
        gap * gap
    }
}

fn half_norm_distance<T: Float>(a: &[T], b: &[T]) -> T {
    let half = T::from(0.5).unwrap_or_else(T::zero);
    (half * point::squared_norm_of_difference(a, b)).sqrt()
}

impl<T: Float> Bound<T> for EnhancedBall<T> {
    fn from_centroid<D: BregmanDivergence<T>>(
        centroid: Vec<T>,
        radius: T,
        divergence: &D,
    ) -> Self {
        EnhancedBall {
            ball: BregmanBall::new(centroid, radius, divergence),
            l2_radius: T::zero(),
            jb_radius: T::zero(),
        }
    }

    fn add_extra_stats<D: BregmanDivergence<T>>(
        &mut self,
        data: &Dataset<T>,
        range: Range<usize>,
        divergence: &D,
    ) {
        let centroid = self.ball.right_centroid();
        let (l2_radius, jb_radius) =
            data.points(range)
                .fold((T::zero(), T::zero()), |(l2, jb), x| {
                    let x_l2 = half_norm_distance(x, centroid);
                    let x_jb = divergence
                        .jensen_bregman_divergence(x, centroid)
                        .max(T::zero())
                        .sqrt();
                    (l2.max(x_l2), jb.max(x_jb))
                });
        self.l2_radius = l2_radius;
        self.jb_radius = jb_radius;
    }

    fn ball(&self) -> &BregmanBall<T> {
        &self.ball
    }

    fn ball_mut(&mut self) -> &mut BregmanBall<T> {
        &mut self.ball
    }

    fn can_prune_point<D: BregmanDivergence<T>>(
        &self,
        divergence: &D,
        query: &[T],
        query_gradient: &[T],
        best: T,
        query_div_to_centroid: T,
    ) -> bool {
        if best.is_finite() {
            if exceeds(self.strong_convexity_bound(divergence, query), best) {
                return true;
            }
            if exceeds(self.jensen_bregman_bound(divergence, query), best) {
                return true;
            }
        }
        self.ball
            .can_prune_right_with(divergence, query, query_gradient, best, query_div_to_centroid)
    }

    fn can_prune_bound<D: BregmanDivergence<T>>(
        &self,
        other: &Self,
        divergence: &D,
        best: T,
        centroid_divergence: T,
    ) -> bool {
        let sigma = divergence.strong_convexity_coefficient();
        if best.is_finite() && sigma > T::zero() {
            let gap = half_norm_distance(self.ball.right_centroid(), other.ball.right_centroid())
                - self.l2_radius
                - other.l2_radius;
            if gap > T::zero() && exceeds(sigma * gap * gap, best) {
                return true;
            }
        }
        self.ball
            .can_prune_bound(&other.ball, divergence, best, centroid_divergence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KlDivergence, SquaredEuclidean};

    fn enhanced(
        points: &[Vec<f64>],
        divergence: &impl BregmanDivergence<f64>,
    ) -> EnhancedBall<f64> {
        let data = Dataset::from_points(points);
        let mean = data.mean(0..data.len());
        let radius = data
            .points(0..data.len())
            .map(|x| divergence.divergence(x, &mean))
            .fold(0.0, f64::max);
        let mut bound = EnhancedBall::from_centroid(mean, radius, divergence);
        bound.add_extra_stats(&data, 0..data.len(), divergence);
        bound
    }

    #[test]
    fn extra_stats_cover_points() {
        let bound = enhanced(&[vec![0.0, 0.0], vec![2.0, 0.0]], &SquaredEuclidean);
        // Both points are at Euclidean distance 1 from the mean (1, 0)
        assert!((bound.l2_radius() - 0.5_f64.sqrt()).abs() < 1e-12);
        assert!((bound.jb_radius() - 0.125_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn strong_convexity_prunes_distant_query() {
        let bound = enhanced(&[vec![0.0], vec![2.0]], &SquaredEuclidean);
        let query = [10.0];
        let gradient = SquaredEuclidean.gradient(&query);
        let to_centroid = SquaredEuclidean.divergence(&query, bound.ball().right_centroid());
        // The closest point is 2, at divergence 32
        assert!(bound.can_prune_point(&SquaredEuclidean, &query, &gradient, 31.0, to_centroid));
        assert!(!bound.can_prune_point(&SquaredEuclidean, &query, &gradient, 33.0, to_centroid));
    }

    #[test]
    fn tied_point_is_not_pruned() {
        // 1 is at divergence ⅛ from the query, the same as the candidate
        let bound = enhanced(&[vec![1.0], vec![2.0]], &SquaredEuclidean);
        let query = [0.5];
        let to_centroid = SquaredEuclidean.divergence(&query, bound.ball().right_centroid());
        assert!(!bound.can_prune_point(&SquaredEuclidean, &query, &query, 0.125, to_centroid));
        assert!(bound.can_prune_point(&SquaredEuclidean, &query, &query, 0.12, to_centroid));
    }

    #[test]
    fn kl_bounds_are_sound() {
        let kl = KlDivergence::bounded(1.0);
        let points = vec![vec![0.2, 0.3, 0.5], vec![0.25, 0.25, 0.5], vec![0.3, 0.3, 0.4]];
        let bound = enhanced(&points, &kl);
        let query = [0.8, 0.1, 0.1];
        let gradient = kl.gradient(&query);
        let to_centroid = kl.divergence(&query, bound.ball().right_centroid());
        let nearest = points
            .iter()
            .map(|x| kl.divergence(x, &query))
            .fold(f64::INFINITY, f64::min);
        assert!(!bound.can_prune_point(&kl, &query, &gradient, nearest * 1.000001, to_centroid));
    }

    #[test]
    fn separated_bounds_are_pruned() {
        let a = enhanced(&[vec![0.0], vec![1.0]], &SquaredEuclidean);
        let b = enhanced(&[vec![10.0], vec![11.0]], &SquaredEuclidean);
        let centroid_divergence =
            SquaredEuclidean.divergence(a.ball().right_centroid(), b.ball().right_centroid());
        // The closest pair is (1, 10), at divergence 40.5
        assert!(a.can_prune_bound(&b, &SquaredEuclidean, 40.0, centroid_divergence));
        assert!(!a.can_prune_bound(&b, &SquaredEuclidean, 41.0, centroid_divergence));
    }
}
