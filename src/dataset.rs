use num_traits::Float;
use std::ops::Range;

/// Points stored row-major in one contiguous buffer, together with the permutation that maps
/// each stored position back to the index the point had when it was handed in.
///
/// The tree reorders the rows in place while it is built so that every node covers a
/// contiguous range of rows. `original_index` is always a permutation of `0..n`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    values: Vec<T>,
    n_dims: usize,
    original_index: Vec<usize>,
}

impl<T: Float> Dataset<T> {
    /// Copies validated, equally sized points into a contiguous buffer.
    pub(crate) fn from_points(data: &[Vec<T>]) -> Self {
        let n_dims = data.first().map_or(0, Vec::len);
        let values = data.iter().flat_map(|p| p.iter().copied()).collect();
        Dataset {
            values,
            n_dims,
            original_index: (0..data.len()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.original_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original_index.is_empty()
    }

    pub fn n_dims(&self) -> usize {
        self.n_dims
    }

    /// The point at the stored (tree ordered) position `i`.
    pub fn point(&self, i: usize) -> &[T] {
        &self.values[i * self.n_dims..(i + 1) * self.n_dims]
    }

    /// The index the point at stored position `i` had in the caller's data.
    pub fn original_index(&self, i: usize) -> usize {
        self.original_index[i]
    }

    /// Stored position to original index, for every stored point.
    pub fn permutation(&self) -> &[usize] {
        &self.original_index
    }

    pub fn points(&self, range: Range<usize>) -> impl Iterator<Item = &[T]> + '_ {
        range.map(move |i| self.point(i))
    }

    /// The mean of the points in `range`.
    pub fn mean(&self, range: Range<usize>) -> Vec<T> {
        let count = T::from(range.len()).unwrap_or_else(T::one);
        let mut mean = vec![T::zero(); self.n_dims];
        for p in self.points(range) {
            crate::point::add_assign(&mut mean, p);
        }
        crate::point::scale(&mut mean, T::one() / count);
        mean
    }

    pub(crate) fn swap(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        for d in 0..self.n_dims {
            self.values.swap(i * self.n_dims + d, j * self.n_dims + d);
        }
        self.original_index.swap(i, j);
    }

    /// Reorders `range` so that points with membership 0 come first, followed by those with
    /// membership 1. `membership` is indexed relative to the start of the range and is kept in
    /// step with the points. Returns the first stored position of the second group.
    pub(crate) fn partition(&mut self, range: Range<usize>, membership: &mut [usize]) -> usize {
        let begin = range.start;
        let mut left = 0;
        let mut right = range.len();
        loop {
            while left < right && membership[left] == 0 {
                left += 1;
            }
            while left < right && membership[right - 1] != 0 {
                right -= 1;
            }
            if left >= right {
                break;
            }
            self.swap(begin + left, begin + right - 1);
            membership.swap(left, right - 1);
        }
        begin + left
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset<f64> {
        Dataset::from_points(&[
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![2.0, 2.0],
            vec![3.0, 3.0],
            vec![4.0, 4.0],
        ])
    }

    #[test]
    fn partition_groups_membership() {
        let mut data = dataset();
        let mut membership = vec![1, 0, 1, 0];
        let split = data.partition(1..5, &mut membership);
        assert_eq!(3, split);
        assert_eq!(vec![0, 0, 1, 1], membership);
        assert_eq!(&[0.0, 0.0], data.point(0));
        // Points 2 and 4 had membership 0
        for i in 1..3 {
            assert_eq!(0.0, data.point(i)[0] % 2.0);
        }
        for i in 3..5 {
            assert_eq!(1.0, data.point(i)[0] % 2.0);
        }
    }

    #[test]
    fn permutation_tracks_swaps() {
        let mut data = dataset();
        let mut membership = vec![1, 1, 0, 0, 0];
        data.partition(0..5, &mut membership);
        let mut seen = data.permutation().to_vec();
        for i in 0..data.len() {
            assert_eq!(data.original_index(i) as f64, data.point(i)[0]);
        }
        seen.sort_unstable();
        assert_eq!(vec![0, 1, 2, 3, 4], seen);
    }

    #[test]
    fn one_sided_partition() {
        let mut data = dataset();
        let mut membership = vec![0; 5];
        assert_eq!(5, data.partition(0..5, &mut membership));
        let mut membership = vec![1; 5];
        assert_eq!(0, data.partition(0..5, &mut membership));
    }

    #[test]
    fn mean_of_range() {
        assert_eq!(vec![2.5, 2.5], dataset().mean(1..5));
    }
}
