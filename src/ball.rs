use crate::dataset::Dataset;
use crate::point;
use crate::BregmanDivergence;
use num_traits::Float;
use std::ops::Range;

// The bisection over the mixing parameter stops after this many halvings at the latest.
const MAX_BISECTION_STEPS: usize = 64;

// A lower bound has to clear the candidate by a few ulps before it rules out a point tied with
// the candidate, since bounds are computed through square roots and dual coordinates.
pub(crate) fn exceeds<T: Float>(lower_bound: T, best: T) -> bool {
    let slack = T::epsilon() * T::from(16.0).unwrap_or_else(T::one) * best.abs();
    lower_bound > best + slack
}

/// A region bounding the points of a tree node. The tree, the nearest neighbour search and the
/// spanning tree computations are generic over this, so that richer bounds can layer cheaper
/// pruning tests on top of [`BregmanBall`].
pub trait Bound<T: Float>: Sized {
    /// Creates the bound of a ball around `centroid` with divergence radius `radius`.
    fn from_centroid<D: BregmanDivergence<T>>(
        centroid: Vec<T>,
        radius: T,
        divergence: &D,
    ) -> Self;

    /// Collects any extra statistics the bound needs from the points it bounds.
    fn add_extra_stats<D: BregmanDivergence<T>>(
        &mut self,
        _data: &Dataset<T>,
        _range: Range<usize>,
        _divergence: &D,
    ) {
    }

    fn ball(&self) -> &BregmanBall<T>;

    fn ball_mut(&mut self) -> &mut BregmanBall<T>;

    /// Returns true only if every point `x` inside the bound has `D(x, query) > best`, so that
    /// a point tied with the candidate is never pruned.
    ///
    /// # Parameters
    /// * `query_gradient` - `∇f(query)`, computed once per query by the caller.
    /// * `query_div_to_centroid` - `D(query, right centroid)`, usually already known from
    ///   prioritising the search.
    fn can_prune_point<D: BregmanDivergence<T>>(
        &self,
        divergence: &D,
        query: &[T],
        query_gradient: &[T],
        best: T,
        query_div_to_centroid: T,
    ) -> bool;

    /// Returns true only if every pair of points, one from each bound, is farther apart than
    /// `best`.
    fn can_prune_bound<D: BregmanDivergence<T>>(
        &self,
        other: &Self,
        divergence: &D,
        best: T,
        centroid_divergence: T,
    ) -> bool;
}

/// A Bregman ball: every point `x` it bounds satisfies `D(x, right_centroid) <= right_radius`.
///
/// The gradient of the centroid is cached since every pruning test needs it. Optionally the
/// ball also carries a left centroid with `D(left_centroid, x) <= left_radius`.
#[derive(Debug, Clone, PartialEq)]
pub struct BregmanBall<T> {
    right_centroid: Vec<T>,
    right_centroid_gradient: Vec<T>,
    right_radius: T,
    left: Option<LeftBall<T>>,
    component: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct LeftBall<T> {
    centroid: Vec<T>,
    centroid_gradient: Vec<T>,
    radius: T,
}

impl<T: Float> BregmanBall<T> {
    pub fn new<D: BregmanDivergence<T>>(
        right_centroid: Vec<T>,
        right_radius: T,
        divergence: &D,
    ) -> Self {
        let right_centroid_gradient = divergence.gradient(&right_centroid);
        BregmanBall {
            right_centroid,
            right_centroid_gradient,
            right_radius: right_radius.max(T::zero()),
            left: None,
            component: None,
        }
    }

    pub fn right_centroid(&self) -> &[T] {
        &self.right_centroid
    }

    pub fn right_centroid_gradient(&self) -> &[T] {
        &self.right_centroid_gradient
    }

    pub fn right_radius(&self) -> T {
        self.right_radius
    }

    pub fn left_centroid(&self) -> Option<&[T]> {
        self.left.as_ref().map(|left| left.centroid.as_slice())
    }

    pub fn left_centroid_gradient(&self) -> Option<&[T]> {
        self.left.as_ref().map(|left| left.centroid_gradient.as_slice())
    }

    pub fn left_radius(&self) -> Option<T> {
        self.left.as_ref().map(|left| left.radius)
    }

    /// Moves the ball, recomputing the cached gradient.
    pub fn set_right_centroid<D: BregmanDivergence<T>>(
        &mut self,
        right_centroid: Vec<T>,
        right_radius: T,
        divergence: &D,
    ) {
        self.right_centroid_gradient = divergence.gradient(&right_centroid);
        self.right_centroid = right_centroid;
        self.right_radius = right_radius.max(T::zero());
    }

    pub fn set_left_centroid<D: BregmanDivergence<T>>(
        &mut self,
        left_centroid: Vec<T>,
        left_radius: T,
        divergence: &D,
    ) {
        self.left = Some(LeftBall {
            centroid_gradient: divergence.gradient(&left_centroid),
            centroid: left_centroid,
            radius: left_radius.max(T::zero()),
        });
    }

    /// The connected component shared by all points of the node during a spanning tree
    /// computation, or `None` if unset or mixed.
    pub fn component(&self) -> Option<usize> {
        self.component
    }

    pub fn set_component(&mut self, component: Option<usize>) {
        self.component = component;
    }

    /// Returns true only if it is provably impossible for any point in the ball to be as
    /// close to `query` as `best`, i.e. to have `D(x, query) <= best`.
    pub fn can_prune_right<D: BregmanDivergence<T>>(
        &self,
        divergence: &D,
        query: &[T],
        best: T,
    ) -> bool {
        let query_div_to_centroid = divergence.divergence(query, &self.right_centroid);
        if !self.needs_bisection(query_div_to_centroid, best) {
            return false;
        }
        let query_gradient = divergence.gradient(query);
        self.bisect(divergence, query, &query_gradient, best)
    }

    /// As [`BregmanBall::can_prune_right`], reusing the query gradient and the already
    /// computed `D(query, right centroid)`.
    pub fn can_prune_right_with<D: BregmanDivergence<T>>(
        &self,
        divergence: &D,
        query: &[T],
        query_gradient: &[T],
        best: T,
        query_div_to_centroid: T,
    ) -> bool {
        self.needs_bisection(query_div_to_centroid, best)
            && self.bisect(divergence, query, query_gradient, best)
    }

    fn needs_bisection(&self, query_div_to_centroid: T, best: T) -> bool {
        // A query inside the ball, or closer to the centroid than to its candidate, can't be
        // pruned for any mixing parameter. Neither can a ball of (numerically) zero radius.
        !(query_div_to_centroid.is_nan()
            || query_div_to_centroid <= self.right_radius
            || query_div_to_centroid < best
            || self.right_radius <= T::epsilon())
    }

    // Searches the Bregman geodesic between the centroid and the query, parameterised in dual
    // coordinates by theta, for a Lagrangian lower bound on D(x, query) over the ball:
    //   L(theta) = D(x_theta, q) + theta / (1 - theta) * (D(x_theta, mu) - radius)
    fn bisect<D: BregmanDivergence<T>>(
        &self,
        divergence: &D,
        query: &[T],
        query_gradient: &[T],
        best: T,
    ) -> bool {
        let half = T::from(0.5).unwrap_or_else(T::zero);
        let tolerance = T::epsilon() * T::from(4.0).unwrap_or_else(T::one);
        let (mut theta_l, mut theta_r) = (T::zero(), T::one());

        for _ in 0..MAX_BISECTION_STEPS {
            let theta = half * (theta_l + theta_r);
            if theta <= T::zero() || theta >= T::one() || theta_r - theta_l < tolerance {
                return false;
            }

            let x_theta_gradient =
                point::mix(theta, &self.right_centroid_gradient, query_gradient);
            let x_theta = divergence.gradient_conjugate(&x_theta_gradient);
            let d_x_theta_mu = divergence.divergence(&x_theta, &self.right_centroid);
            let d_x_theta_q = divergence.divergence(&x_theta, query);
            if d_x_theta_mu.is_nan() || d_x_theta_q.is_nan() {
                return false;
            }

            let multiplier = theta / (T::one() - theta);
            let l_theta = d_x_theta_q + multiplier * (d_x_theta_mu - self.right_radius);

            if exceeds(l_theta, best) {
                return true;
            } else if d_x_theta_mu <= self.right_radius && d_x_theta_q <= best {
                // Found a point of the ball at least as close as the candidate
                return false;
            } else if d_x_theta_mu > self.right_radius {
                // Outside the ball, move towards the centroid
                theta_l = theta;
            } else {
                // Inside the ball, move towards the query
                theta_r = theta;
            }
        }
        false
    }
}

impl<T: Float> Bound<T> for BregmanBall<T> {
    fn from_centroid<D: BregmanDivergence<T>>(
        centroid: Vec<T>,
        radius: T,
        divergence: &D,
    ) -> Self {
        BregmanBall::new(centroid, radius, divergence)
    }

    fn ball(&self) -> &BregmanBall<T> {
        self
    }

    fn ball_mut(&mut self) -> &mut BregmanBall<T> {
        self
    }

    fn can_prune_point<D: BregmanDivergence<T>>(
        &self,
        divergence: &D,
        query: &[T],
        query_gradient: &[T],
        best: T,
        query_div_to_centroid: T,
    ) -> bool {
        self.can_prune_right_with(divergence, query, query_gradient, best, query_div_to_centroid)
    }

    fn can_prune_bound<D: BregmanDivergence<T>>(
        &self,
        other: &Self,
        _divergence: &D,
        _best: T,
        centroid_divergence: T,
    ) -> bool {
        if centroid_divergence - self.right_radius - other.right_radius < T::zero() {
            // The balls may intersect
            return false;
        }
        // TODO: derive the ball-vs-ball analogue of the geodesic bisection in `bisect`
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KlDivergence, SquaredEuclidean};

    fn q() -> Vec<f64> {
        vec![0.5, 0.1, 0.1, 0.1, 0.1]
    }

    fn mu() -> Vec<f64> {
        vec![0.2; 5]
    }

    #[test]
    fn kl_ball() {
        let kl = KlDivergence::new();
        let small = BregmanBall::new(mu(), 0.001, &kl);
        let large = BregmanBall::new(mu(), 0.25, &kl);
        assert!(small.can_prune_right(&kl, &q(), 0.05));
        assert!(!large.can_prune_right(&kl, &q(), 0.05));
    }

    #[test]
    fn l2_ball() {
        let small = BregmanBall::new(mu(), 0.001, &SquaredEuclidean);
        let large = BregmanBall::new(mu(), 10.0, &SquaredEuclidean);
        assert!(small.can_prune_right(&SquaredEuclidean, &q(), 0.03));
        assert!(!large.can_prune_right(&SquaredEuclidean, &q(), 0.03));
    }

    #[test]
    fn l2_ball_matches_closed_form() {
        // In 1-D the closest point of the ball [-1, 1] (radius ½) to 3 is 1, at divergence 2
        let ball = BregmanBall::new(vec![0.0], 0.5, &SquaredEuclidean);
        assert!(ball.can_prune_right(&SquaredEuclidean, &[3.0], 1.9));
        assert!(!ball.can_prune_right(&SquaredEuclidean, &[3.0], 2.1));
    }

    #[test]
    fn tied_candidate_is_not_pruned() {
        // 1 lies in the ball at exactly the candidate's divergence from 3
        let ball = BregmanBall::new(vec![0.0], 0.5, &SquaredEuclidean);
        assert!(!ball.can_prune_right(&SquaredEuclidean, &[3.0], 2.0));
    }

    #[test]
    fn query_inside_ball_is_never_pruned() {
        let ball = BregmanBall::new(mu(), 1.0, &SquaredEuclidean);
        assert!(!ball.can_prune_right(&SquaredEuclidean, &q(), 0.0));
    }

    #[test]
    fn zero_radius_is_never_pruned() {
        let ball = BregmanBall::new(mu(), 0.0, &SquaredEuclidean);
        assert!(!ball.can_prune_right(&SquaredEuclidean, &q(), 1e-6));
    }

    #[test]
    fn unknown_candidate_is_never_pruned() {
        let ball = BregmanBall::new(mu(), 0.001, &SquaredEuclidean);
        assert!(!ball.can_prune_right(&SquaredEuclidean, &q(), f64::INFINITY));
    }

    #[test]
    fn moving_centroid_refreshes_gradient() {
        let kl = KlDivergence::new();
        let mut ball = BregmanBall::new(mu(), 0.1, &kl);
        ball.set_right_centroid(q(), 0.2, &kl);
        let expected: Vec<f64> = kl.gradient(&q());
        assert_eq!(expected.as_slice(), ball.right_centroid_gradient());
        assert_eq!(0.2, ball.right_radius());
    }

    #[test]
    fn overlapping_balls_are_not_pruned() {
        let a = BregmanBall::new(vec![0.0], 1.0, &SquaredEuclidean);
        let b = BregmanBall::new(vec![1.0], 1.0, &SquaredEuclidean);
        assert!(!a.can_prune_bound(&b, &SquaredEuclidean, 0.1, 0.5));
    }
}
