use crate::data_wrappers::Partition;
use crate::dataset::Dataset;
use crate::point;
use crate::{BregmanDivergence, BregmanError};
use log::warn;
use num_traits::Float;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;

/// Splits the points of a tree node into groups, each with a center and a radius bounding the
/// divergence of its members from that center.
pub trait Splitter<T: Float, D: BregmanDivergence<T>> {
    /// # Parameters
    /// * `data` - the tree's dataset
    /// * `range` - the stored positions of the node's points
    /// * `divergence` - the divergence members are measured with, as `D(x, center)`
    ///
    /// # Returns
    /// * the group of every point in `range`, with the centers and radii of the groups
    fn partition(
        &mut self,
        data: &Dataset<T>,
        range: Range<usize>,
        divergence: &D,
    ) -> Result<Partition<T>, BregmanError>;
}

/// Bregman k-means: the right centroid minimising `Σ D(x, c)` over a group is the arithmetic
/// mean of the group, for every Bregman divergence, so Lloyd's iterations carry over unchanged.
///
/// The first center is a uniformly random point of the node; every further center is the point
/// farthest from the centers chosen so far.
#[derive(Debug, Clone)]
pub struct KMeansSplitter {
    k: usize,
    max_iterations: usize,
    rng: StdRng,
}

impl KMeansSplitter {
    /// # Parameters
    /// * `k` - the number of groups, at least 2
    /// * `max_iterations` - the maximum number of Lloyd iterations per split
    /// * `seed` - makes the choice of first centers reproducible when given
    pub fn new(k: usize, max_iterations: usize, seed: Option<u64>) -> Result<Self, BregmanError> {
        if k < 2 {
            return Err(BregmanError::ConfigError(format!(
                "k-means needs at least 2 groups to split a node, got {k}"
            )));
        }
        let seed = seed.unwrap_or_else(|| rand::rng().random());
        Ok(KMeansSplitter {
            k,
            max_iterations,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn initial_centers<T: Float, D: BregmanDivergence<T>>(
        &mut self,
        data: &Dataset<T>,
        range: Range<usize>,
        divergence: &D,
    ) -> Result<Vec<Vec<T>>, BregmanError> {
        let first = self.rng.random_range(range.clone());
        let mut centers = vec![data.point(first).to_vec()];
        let mut closest: Vec<T> = data
            .points(range.clone())
            .map(|x| divergence.divergence(x, &centers[0]))
            .collect();

        while centers.len() < self.k {
            let farthest = closest
                .iter()
                .enumerate()
                .fold(None, |acc: Option<(usize, T)>, (i, &d)| match acc {
                    Some((_, best)) if !(d > best) => acc,
                    _ => Some((i, d)),
                });
            let candidate = match farthest {
                Some((i, d)) if d > T::zero() => data.point(range.start + i).to_vec(),
                _ => {
                    return Err(BregmanError::DegenerateInput(format!(
                        "Cannot obtain {} distinct points among {} points",
                        self.k,
                        range.len()
                    )))
                }
            };
            for (i, x) in data.points(range.clone()).enumerate() {
                closest[i] = closest[i].min(divergence.divergence(x, &candidate));
            }
            centers.push(candidate);
        }
        Ok(centers)
    }
}

impl<T: Float, D: BregmanDivergence<T>> Splitter<T, D> for KMeansSplitter {
    fn partition(
        &mut self,
        data: &Dataset<T>,
        range: Range<usize>,
        divergence: &D,
    ) -> Result<Partition<T>, BregmanError> {
        if range.len() < self.k {
            return Err(BregmanError::DegenerateInput(format!(
                "Cannot obtain {} distinct points among {} points",
                self.k,
                range.len()
            )));
        }
        let mut centers = self.initial_centers(data, range.clone(), divergence)?;
        let mut membership = vec![0; range.len()];

        let mut converged = false;
        for iteration in 0..self.max_iterations {
            let (assignment, objective) = assign(data, range.clone(), &centers, divergence);
            if objective == T::zero() || (iteration > 0 && assignment == membership) {
                membership = assignment;
                converged = true;
                break;
            }
            membership = assignment;
            centers = group_means(data, range.clone(), &membership, centers);
        }
        if !converged {
            warn!(
                "k-means did not converge within {} iterations for {} points",
                self.max_iterations,
                range.len()
            );
        }

        let centers = group_means(data, range.clone(), &membership, centers);
        let mut radii = vec![T::zero(); self.k];
        for (x, &group) in data.points(range).zip(membership.iter()) {
            radii[group] = radii[group].max(divergence.divergence(x, &centers[group]));
        }
        Ok(Partition {
            membership,
            centers,
            radii,
        })
    }
}

// Assigns each point to the center it has the smallest divergence to, the lowest index
// winning ties. Returns the assignment and the total divergence.
fn assign<T: Float, D: BregmanDivergence<T>>(
    data: &Dataset<T>,
    range: Range<usize>,
    centers: &[Vec<T>],
    divergence: &D,
) -> (Vec<usize>, T) {
    let mut objective = T::zero();
    let assignment = data
        .points(range)
        .map(|x| {
            let (group, d) = centers
                .iter()
                .map(|c| divergence.divergence(x, c))
                .enumerate()
                .fold((0, T::infinity()), |(best_group, best), (group, d)| {
                    if d < best {
                        (group, d)
                    } else {
                        (best_group, best)
                    }
                });
            objective = objective + d;
            group
        })
        .collect();
    (assignment, objective)
}

// Groups without members keep their previous center.
fn group_means<T: Float>(
    data: &Dataset<T>,
    range: Range<usize>,
    membership: &[usize],
    previous: Vec<Vec<T>>,
) -> Vec<Vec<T>> {
    let n_dims = data.n_dims();
    let mut sums = vec![vec![T::zero(); n_dims]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (x, &group) in data.points(range).zip(membership) {
        point::add_assign(&mut sums[group], x);
        counts[group] += 1;
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((mut sum, count), old)| {
            if count == 0 {
                old
            } else {
                point::scale(&mut sum, T::one() / T::from(count).unwrap_or_else(T::one));
                sum
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SquaredEuclidean;

    #[test]
    fn identical_points_share_a_group() {
        let values = [1.0, 1.0, 5.0, 5.0, 5.0, 9.0, 9.0, 1.0, 9.0, 5.0];
        let points: Vec<Vec<f64>> = values.iter().map(|&v| vec![v, v]).collect();
        let data = Dataset::from_points(&points);
        let mut splitter = KMeansSplitter::new(3, 10_000, Some(7)).unwrap();
        let partition = splitter.partition(&data, 0..10, &SquaredEuclidean).unwrap();

        assert_eq!(vec![0.0; 3], partition.radii);
        for i in 0..values.len() {
            for j in 0..values.len() {
                if values[i] == values[j] {
                    assert_eq!(partition.membership[i], partition.membership[j]);
                } else {
                    assert_ne!(partition.membership[i], partition.membership[j]);
                }
            }
        }
    }

    #[test]
    fn radii_bound_members() {
        let points: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![(i * i) as f64 / 7.0, (i % 3) as f64])
            .collect();
        let data = Dataset::from_points(&points);
        let mut splitter = KMeansSplitter::new(2, 10_000, Some(11)).unwrap();
        let partition = splitter.partition(&data, 0..20, &SquaredEuclidean).unwrap();
        for (x, &group) in points.iter().zip(partition.membership.iter()) {
            let d = SquaredEuclidean.divergence(x, &partition.centers[group]);
            assert!(d <= partition.radii[group] + 1e-12);
        }
        assert!(partition.count(0) > 0);
        assert!(partition.count(1) > 0);
    }

    #[test]
    fn too_few_distinct_points() {
        let points = vec![vec![0.5, 0.5]; 4];
        let data = Dataset::from_points(&points);
        let mut splitter = KMeansSplitter::new(2, 100, Some(1)).unwrap();
        let result = splitter.partition(&data, 0..4, &SquaredEuclidean);
        assert!(matches!(result, Err(BregmanError::DegenerateInput(..))));
    }

    #[test]
    fn k_must_split() {
        assert!(matches!(
            KMeansSplitter::new(1, 100, None),
            Err(BregmanError::ConfigError(..))
        ));
    }
}
