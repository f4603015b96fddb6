//! Elementwise arithmetic over points stored as slices of floats.
//!
//! All helpers assume both operands share the same dimensionality; callers validate this
//! once at the boundary of the crate (see `validation.rs`).

use num_traits::Float;

pub(crate) fn squared_norm_of_difference<T: Float>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| ((*x) - (*y)) * ((*x) - (*y)))
        .fold(T::zero(), std::ops::Add::add)
}

pub(crate) fn add_assign<T: Float>(acc: &mut [T], other: &[T]) {
    acc.iter_mut().zip(other).for_each(|(a, b)| *a = *a + *b);
}

pub(crate) fn scale<T: Float>(point: &mut [T], scalar: T) {
    point.iter_mut().for_each(|a| *a = *a * scalar);
}

/// `theta * a + (1 - theta) * b`
pub(crate) fn mix<T: Float>(theta: T, a: &[T], b: &[T]) -> Vec<T> {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| theta * (*x) + (T::one() - theta) * (*y))
        .collect()
}

/// Count weighted combination of two means: the mean of the union of both groups.
pub(crate) fn combine_means<T: Float>(a: &[T], count_a: usize, b: &[T], count_b: usize) -> Vec<T> {
    let n_a = T::from(count_a).unwrap_or_else(T::zero);
    let n_b = T::from(count_b).unwrap_or_else(T::zero);
    let total = n_a + n_b;
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| ((*x) * n_a + (*y) * n_b) / total)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_norm() {
        assert_eq!(25.0, squared_norm_of_difference(&[1.0, 2.0], &[4.0, 6.0]));
    }

    #[test]
    fn mixing_endpoints() {
        let a = [1.0, 2.0];
        let b = [3.0, 6.0];
        assert_eq!(vec![1.0, 2.0], mix(1.0, &a, &b));
        assert_eq!(vec![3.0, 6.0], mix(0.0, &a, &b));
        assert_eq!(vec![2.0, 4.0], mix(0.5, &a, &b));
    }

    #[test]
    fn combined_mean_is_weighted() {
        let combined = combine_means(&[0.0], 3, &[4.0], 1);
        assert_eq!(vec![1.0], combined);
    }
}
