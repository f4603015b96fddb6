use crate::{BregmanDivergence, BregmanError};
use num_traits::Float;

pub(crate) struct DataValidator<'a, T, D> {
    data: &'a [Vec<T>],
    divergence: &'a D,
}

impl<'a, T: Float, D: BregmanDivergence<T>> DataValidator<'a, T, D> {
    pub(crate) fn new(data: &'a [Vec<T>], divergence: &'a D) -> Self {
        Self { data, divergence }
    }

    pub(crate) fn validate_input_data(&self) -> Result<(), BregmanError> {
        if self.data.is_empty() {
            return Err(BregmanError::EmptyDataset);
        }
        let dims_0th = self.data[0].len();
        if dims_0th == 0 {
            return Err(BregmanError::DomainError(String::from(
                "Points must have at least one dimension",
            )));
        }
        for (n, datapoint) in self.data.iter().enumerate() {
            let dims_nth = datapoint.len();
            if dims_nth != dims_0th {
                return Err(BregmanError::DomainError(format!(
                    "0th data point has {dims_0th} dimensions, but {n}th has {dims_nth}"
                )));
            }
            validate_point(datapoint, n, self.divergence)?;
        }
        Ok(())
    }
}

/// Validates a single query point against the dimensionality of the indexed data.
pub(crate) fn validate_query<T: Float, D: BregmanDivergence<T>>(
    query: &[T],
    n_dims: usize,
    divergence: &D,
) -> Result<(), BregmanError> {
    if query.len() != n_dims {
        return Err(BregmanError::DomainError(format!(
            "Query has {} dimensions, but the indexed points have {n_dims}",
            query.len()
        )));
    }
    validate_point(query, 0, divergence)
}

fn validate_point<T: Float, D: BregmanDivergence<T>>(
    datapoint: &[T],
    n: usize,
    divergence: &D,
) -> Result<(), BregmanError> {
    if datapoint.iter().any(|element| !element.is_finite()) {
        return Err(BregmanError::NonFiniteCoordinate(format!(
            "{n}th vector contains non-finite element(s)"
        )));
    }
    divergence.check_domain(datapoint)
}
