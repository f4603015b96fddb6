use crate::BregmanError;
use num_traits::Float;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;
use std::str::FromStr;

/// Reads points from a text file with one point per line, coordinates separated by commas
/// and/or whitespace. Blank lines and lines starting with `#` are skipped.
pub fn read_points<T, P>(path: P) -> Result<Vec<Vec<T>>, BregmanError>
where
    T: Float + FromStr,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| BregmanError::Io(format!("{}: {e}", path.display())))?;
    parse_points(&contents).map_err(|msg| BregmanError::Io(format!("{}: {msg}", path.display())))
}

fn parse_points<T: Float + FromStr>(contents: &str) -> Result<Vec<Vec<T>>, String> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(n, line)| {
            line.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|token| !token.is_empty())
                .map(|token| {
                    token
                        .parse::<T>()
                        .map_err(|_| format!("line {}: '{token}' is not a number", n + 1))
                })
                .collect()
        })
        .collect()
}

/// Randomly splits `points` into queries and references, with `ceil(split_ratio * n)` queries.
///
/// # Returns
/// * `(queries, references)`, or a `ConfigError` unless `0 < split_ratio < 1`
pub fn split_set<T: Clone, R: Rng + ?Sized>(
    points: &[Vec<T>],
    split_ratio: f64,
    rng: &mut R,
) -> Result<(Vec<Vec<T>>, Vec<Vec<T>>), BregmanError> {
    if !(split_ratio > 0.0 && split_ratio < 1.0) {
        return Err(BregmanError::ConfigError(format!(
            "split_ratio ({split_ratio}) must lie strictly between 0 and 1"
        )));
    }
    let n_queries = (split_ratio * points.len() as f64).ceil() as usize;
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.shuffle(rng);
    let queries = order[..n_queries].iter().map(|&i| points[i].clone()).collect();
    let references = order[n_queries..].iter().map(|&i| points[i].clone()).collect();
    Ok((queries, references))
}

/// Whether any coordinate of `point` is zero, i.e. whether it lies on the boundary of the KL
/// divergence's domain.
pub fn point_has_zero<T: Float>(point: &[T]) -> bool {
    point.iter().any(|&x| x == T::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn parses_mixed_separators() {
        let points: Vec<Vec<f64>> = parse_points("# header\n1.0, 2.0\n\n3 4\n5.5,6\t7\n").unwrap();
        assert_eq!(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.5, 6.0, 7.0]], points);
    }

    #[test]
    fn reports_bad_tokens() {
        let result = parse_points::<f64>("1.0 2.0\n3.0 x\n");
        assert!(result.unwrap_err().contains("line 2"));
    }

    #[test]
    fn missing_file() {
        let result = read_points::<f64, _>("/definitely/not/a/file.txt");
        assert!(matches!(result, Err(BregmanError::Io(..))));
    }

    #[test]
    fn split_sizes() {
        let points: Vec<Vec<f64>> = (0..25).map(|i| vec![i as f64]).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let (queries, references) = split_set(&points, 0.1, &mut rng).unwrap();
        assert_eq!(3, queries.len());
        assert_eq!(22, references.len());
        let mut all: Vec<f64> = queries.iter().chain(references.iter()).map(|p| p[0]).collect();
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!((0..25).map(|i| i as f64).collect::<Vec<_>>(), all);
    }

    #[test]
    fn split_ratio_bounds() {
        let points = vec![vec![1.0]; 4];
        let mut rng = StdRng::seed_from_u64(0);
        for ratio in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                split_set(&points, ratio, &mut rng),
                Err(BregmanError::ConfigError(..))
            ));
        }
    }

    #[test]
    fn zero_coordinates() {
        assert!(point_has_zero(&[0.5, 0.0]));
        assert!(!point_has_zero(&[0.5, 0.1]));
    }
}
