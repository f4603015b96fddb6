use crate::point;
use crate::BregmanError;
use num_traits::Float;
use std::cell::Cell;
use std::str::FromStr;

/// A Bregman divergence `D_f(x, y) = f(x) - f(y) - <∇f(y), x - y>` generated by a strictly
/// convex function `f`.
///
/// Implementations expose the generator's gradient and the gradient of its convex conjugate
/// (the inverse of the gradient map) so that points on the Bregman geodesic between two points
/// can be computed in dual coordinates. The pruning tests of the ball tree rely on these two
/// maps being exact inverses of one another.
pub trait BregmanDivergence<T: Float> {
    /// The divergence of `x` from `y`. May be asymmetric and may be infinite at the domain
    /// boundary.
    fn divergence(&self, x: &[T], y: &[T]) -> T;

    /// `∇f(x)`
    fn gradient(&self, x: &[T]) -> Vec<T>;

    /// `∇f*(theta)`, the inverse of [`BregmanDivergence::gradient`].
    fn gradient_conjugate(&self, theta: &[T]) -> Vec<T>;

    /// `(f(x) + f(y)) / 2 - f((x + y) / 2)`
    fn jensen_bregman_divergence(&self, x: &[T], y: &[T]) -> T;

    /// Whether the divergence is conditionally positive definite, i.e. whether the square root
    /// of its Jensen-Bregman divergence is a metric.
    fn is_cpd(&self) -> bool;

    /// A coefficient `σ` such that `D(x, y) >= σ * ½‖x - y‖²` over the whole domain. Zero if
    /// no such global bound is known.
    fn strong_convexity_coefficient(&self) -> T;

    fn is_strictly_convex_of_legendre_type(&self) -> bool {
        true
    }

    /// Checks that a point lies inside the domain of the generator.
    fn check_domain(&self, _x: &[T]) -> Result<(), BregmanError> {
        Ok(())
    }
}

/// The squared Euclidean ("L2") divergence `D(x, y) = ½‖x - y‖²`.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct SquaredEuclidean;

impl<T: Float> BregmanDivergence<T> for SquaredEuclidean {
    fn divergence(&self, x: &[T], y: &[T]) -> T {
        half::<T>() * point::squared_norm_of_difference(x, y)
    }

    fn gradient(&self, x: &[T]) -> Vec<T> {
        x.to_vec()
    }

    fn gradient_conjugate(&self, theta: &[T]) -> Vec<T> {
        theta.to_vec()
    }

    fn jensen_bregman_divergence(&self, x: &[T], y: &[T]) -> T {
        let eighth = T::from(0.125).unwrap_or_else(T::zero);
        eighth * point::squared_norm_of_difference(x, y)
    }

    fn is_cpd(&self) -> bool {
        true
    }

    fn strong_convexity_coefficient(&self) -> T {
        T::one()
    }
}

/// The (generalised) Kullback-Leibler divergence, generated by `f(x) = Σ xᵢ log xᵢ`:
/// `D(x, y) = Σ xᵢ log(xᵢ / yᵢ) - xᵢ + yᵢ`. On the probability simplex this is the usual
/// KL divergence.
///
/// Zero coordinates are the boundary of the domain: `0 log 0 = 0`, and the divergence from a
/// reference with a zero coordinate where `x` is positive is `+∞`.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct KlDivergence {
    coordinate_upper_bound: Option<f64>,
}

impl KlDivergence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A KL divergence for data whose coordinates never exceed `upper_bound`. On that region
    /// the generator is `1 / upper_bound` strongly convex, which enables the cheap strong
    /// convexity pruning test. Use an upper bound of 1 for data on the simplex.
    pub fn bounded(upper_bound: f64) -> Self {
        Self {
            coordinate_upper_bound: Some(upper_bound),
        }
    }
}

impl<T: Float> BregmanDivergence<T> for KlDivergence {
    fn divergence(&self, x: &[T], y: &[T]) -> T {
        x.iter()
            .zip(y.iter())
            .map(|(&xi, &yi)| {
                if xi == T::zero() {
                    yi
                } else if yi == T::zero() {
                    T::infinity()
                } else {
                    xi * (xi / yi).ln() - xi + yi
                }
            })
            .fold(T::zero(), std::ops::Add::add)
    }

    fn gradient(&self, x: &[T]) -> Vec<T> {
        x.iter().map(|&xi| xi.ln() + T::one()).collect()
    }

    fn gradient_conjugate(&self, theta: &[T]) -> Vec<T> {
        theta.iter().map(|&ti| (ti - T::one()).exp()).collect()
    }

    fn jensen_bregman_divergence(&self, x: &[T], y: &[T]) -> T {
        x.iter()
            .zip(y.iter())
            .map(|(&xi, &yi)| {
                let mid = half::<T>() * (xi + yi);
                half::<T>() * (x_log_x(xi) + x_log_x(yi)) - x_log_x(mid)
            })
            .fold(T::zero(), std::ops::Add::add)
    }

    fn is_cpd(&self) -> bool {
        true
    }

    fn strong_convexity_coefficient(&self) -> T {
        match self.coordinate_upper_bound {
            Some(bound) if bound > 0.0 => T::from(1.0 / bound).unwrap_or_else(T::zero),
            _ => T::zero(),
        }
    }

    fn check_domain(&self, x: &[T]) -> Result<(), BregmanError> {
        if let Some(position) = x.iter().position(|&xi| xi < T::zero()) {
            return Err(BregmanError::DomainError(format!(
                "KL divergence is undefined for negative coordinates (dimension {position})"
            )));
        }
        if let Some(bound) = self.coordinate_upper_bound {
            let limit = T::from(bound).unwrap_or_else(T::infinity);
            if let Some(position) = x.iter().position(|&xi| xi > limit) {
                return Err(BregmanError::DomainError(format!(
                    "coordinate above the KL upper bound {bound} (dimension {position})"
                )));
            }
        }
        Ok(())
    }
}

fn x_log_x<T: Float>(x: T) -> T {
    if x == T::zero() {
        T::zero()
    } else {
        x * x.ln()
    }
}

fn half<T: Float>() -> T {
    T::from(0.5).unwrap_or_else(T::zero)
}

/// Runtime selectable divergences, e.g. from a command line flag.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum DivergenceKind {
    L2,
    KL,
}

impl FromStr for DivergenceKind {
    type Err = BregmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L2" | "l2" => Ok(DivergenceKind::L2),
            "KL" | "kl" => Ok(DivergenceKind::KL),
            other => Err(BregmanError::ConfigError(format!(
                "{other}-divergence is currently not supported"
            ))),
        }
    }
}

impl<T: Float> BregmanDivergence<T> for DivergenceKind {
    fn divergence(&self, x: &[T], y: &[T]) -> T {
        match *self {
            Self::L2 => SquaredEuclidean.divergence(x, y),
            Self::KL => KlDivergence::new().divergence(x, y),
        }
    }

    fn gradient(&self, x: &[T]) -> Vec<T> {
        match *self {
            Self::L2 => SquaredEuclidean.gradient(x),
            Self::KL => KlDivergence::new().gradient(x),
        }
    }

    fn gradient_conjugate(&self, theta: &[T]) -> Vec<T> {
        match *self {
            Self::L2 => SquaredEuclidean.gradient_conjugate(theta),
            Self::KL => KlDivergence::new().gradient_conjugate(theta),
        }
    }

    fn jensen_bregman_divergence(&self, x: &[T], y: &[T]) -> T {
        match *self {
            Self::L2 => SquaredEuclidean.jensen_bregman_divergence(x, y),
            Self::KL => KlDivergence::new().jensen_bregman_divergence(x, y),
        }
    }

    fn is_cpd(&self) -> bool {
        match *self {
            Self::L2 => <SquaredEuclidean as BregmanDivergence<T>>::is_cpd(&SquaredEuclidean),
            Self::KL => <KlDivergence as BregmanDivergence<T>>::is_cpd(&KlDivergence::new()),
        }
    }

    fn strong_convexity_coefficient(&self) -> T {
        match *self {
            Self::L2 => SquaredEuclidean.strong_convexity_coefficient(),
            Self::KL => KlDivergence::new().strong_convexity_coefficient(),
        }
    }

    fn check_domain(&self, x: &[T]) -> Result<(), BregmanError> {
        match *self {
            Self::L2 => SquaredEuclidean.check_domain(x),
            Self::KL => KlDivergence::new().check_domain(x),
        }
    }
}

/// Number of calls made to each method of a divergence.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DivergenceCalls {
    pub divergence: usize,
    pub gradient: usize,
    pub gradient_conjugate: usize,
    pub jensen_bregman: usize,
}

/// Wraps a divergence and counts the calls made through it. Read the counts with
/// [`Counted::calls`] after a search or spanning tree computation.
#[derive(Debug, Default)]
pub struct Counted<D> {
    inner: D,
    calls: Cell<DivergenceCalls>,
}

impl<D> Counted<D> {
    pub fn new(inner: D) -> Self {
        Counted {
            inner,
            calls: Cell::new(DivergenceCalls::default()),
        }
    }

    pub fn calls(&self) -> DivergenceCalls {
        self.calls.get()
    }

    pub fn reset(&self) {
        self.calls.set(DivergenceCalls::default());
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    fn record(&self, update: impl FnOnce(&mut DivergenceCalls)) {
        let mut calls = self.calls.get();
        update(&mut calls);
        self.calls.set(calls);
    }
}

impl<T: Float, D: BregmanDivergence<T>> BregmanDivergence<T> for Counted<D> {
    fn divergence(&self, x: &[T], y: &[T]) -> T {
        self.record(|c| c.divergence += 1);
        self.inner.divergence(x, y)
    }

    fn gradient(&self, x: &[T]) -> Vec<T> {
        self.record(|c| c.gradient += 1);
        self.inner.gradient(x)
    }

    fn gradient_conjugate(&self, theta: &[T]) -> Vec<T> {
        self.record(|c| c.gradient_conjugate += 1);
        self.inner.gradient_conjugate(theta)
    }

    fn jensen_bregman_divergence(&self, x: &[T], y: &[T]) -> T {
        self.record(|c| c.jensen_bregman += 1);
        self.inner.jensen_bregman_divergence(x, y)
    }

    fn is_cpd(&self) -> bool {
        self.inner.is_cpd()
    }

    fn strong_convexity_coefficient(&self) -> T {
        self.inner.strong_convexity_coefficient()
    }

    fn is_strictly_convex_of_legendre_type(&self) -> bool {
        self.inner.is_strictly_convex_of_legendre_type()
    }

    fn check_domain(&self, x: &[T]) -> Result<(), BregmanError> {
        self.inner.check_domain(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-8;

    fn x() -> Vec<f64> {
        vec![0.6, 0.1, 0.1, 0.1, 0.1]
    }

    fn y() -> Vec<f64> {
        vec![0.2; 5]
    }

    #[test]
    fn kl_on_simplex() {
        // 0.6 ln 3 + 0.4 ln 0.5
        let expected = 0.6 * 3.0_f64.ln() + 0.4 * 0.5_f64.ln();
        assert!((KlDivergence::new().divergence(&x(), &y()) - expected).abs() < EPS);
    }

    #[test]
    fn kl_zero_at_identical_points() {
        let kl = KlDivergence::new();
        assert_eq!(0.0, kl.divergence(&x(), &x()));
    }

    #[test]
    fn kl_domain_boundary() {
        let kl = KlDivergence::new();
        let a = vec![0.5, 0.5];
        let b = vec![1.0, 0.0];
        assert_eq!(f64::INFINITY, kl.divergence(&a, &b));
        let both_zero = kl.divergence(&[0.0, 1.0], &[0.0, 1.0]);
        assert_eq!(0.0, both_zero);
        assert!(!both_zero.is_nan());
    }

    #[test]
    fn kl_rejects_negative_coordinates() {
        let kl = KlDivergence::new();
        let result = BregmanDivergence::<f64>::check_domain(&kl, &[0.1, -0.2]);
        assert!(matches!(result, Err(BregmanError::DomainError(..))));
    }

    #[test]
    fn bounded_kl_rejects_large_coordinates() {
        let kl = KlDivergence::bounded(1.0);
        assert!(BregmanDivergence::<f64>::check_domain(&kl, &[0.0, 1.0]).is_ok());
        let result = BregmanDivergence::<f64>::check_domain(&kl, &[0.5, 1.25]);
        assert!(matches!(result, Err(BregmanError::DomainError(..))));
        let unbounded = KlDivergence::new();
        assert!(BregmanDivergence::<f64>::check_domain(&unbounded, &[0.5, 1.25]).is_ok());
    }

    #[test]
    fn gradient_round_trip() {
        let kl = KlDivergence::new();
        for p in [x(), y()] {
            let back = kl.gradient_conjugate(&kl.gradient(&p));
            p.iter().zip(back).for_each(|(a, b)| assert!((a - b).abs() < EPS));
            let back = SquaredEuclidean.gradient_conjugate(&SquaredEuclidean.gradient(&p));
            p.iter().zip(back).for_each(|(a, b)| assert!((a - b).abs() < EPS));
        }
    }

    #[test]
    fn l2_divergence_is_symmetric() {
        let forward = SquaredEuclidean.divergence(&x(), &y());
        assert!((forward - 0.5 * (0.16 + 4.0 * 0.01)).abs() < EPS);
        assert!((forward - SquaredEuclidean.divergence(&y(), &x())).abs() < EPS);
    }

    #[test]
    fn jensen_bregman_is_below_divergence() {
        let kl = KlDivergence::new();
        assert!(kl.jensen_bregman_divergence(&x(), &y()) <= kl.divergence(&x(), &y()));
        assert!(
            SquaredEuclidean.jensen_bregman_divergence(&x(), &y())
                <= SquaredEuclidean.divergence(&x(), &y())
        );
    }

    #[test]
    fn kind_dispatches() {
        let kind: DivergenceKind = "KL".parse().unwrap();
        assert_eq!(
            KlDivergence::new().divergence(&x(), &y()),
            kind.divergence(&x(), &y())
        );
        assert!(matches!(
            "L1".parse::<DivergenceKind>(),
            Err(BregmanError::ConfigError(..))
        ));
    }

    #[test]
    fn counted_records_calls() {
        let counted = Counted::new(SquaredEuclidean);
        counted.divergence(&x(), &y());
        counted.divergence(&y(), &x());
        let _ = counted.gradient(&x());
        let calls = counted.calls();
        assert_eq!(2, calls.divergence);
        assert_eq!(1, calls.gradient);
        counted.reset();
        assert_eq!(DivergenceCalls::default(), counted.calls());
    }
}
