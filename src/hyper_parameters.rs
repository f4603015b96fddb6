use crate::BregmanError;
use log::warn;

// Defaults for parameters
const MAX_LEAF_SIZE_DEFAULT: usize = 10;
const MIN_BALL_WIDTH_DEFAULT: f64 = 0.0;
const KMEANS_MAX_ITERATIONS_DEFAULT: usize = 10_000;
const COMPUTE_LEFT_BOUNDS_DEFAULT: bool = false;

// Valid minimums/left bounds of parameters
const MIN_BALL_WIDTH_MINIMUM: f64 = 0.0;

/// The parameters controlling how a Bregman ball tree is built.
/// Use `TreeParams::default()` for leaf size based construction with 10 points per leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    pub(crate) max_leaf_size: usize,
    pub(crate) min_ball_width: f64,
    pub(crate) kmeans_max_iterations: usize,
    pub(crate) seed: Option<u64>,
    pub(crate) compute_left_bounds: bool,
}

/// Builder object to set custom tree parameters.
#[derive(Debug, Clone, Default)]
pub struct TreeParamBuilder {
    max_leaf_size: Option<usize>,
    min_ball_width: Option<f64>,
    kmeans_max_iterations: Option<usize>,
    seed: Option<u64>,
    compute_left_bounds: Option<bool>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TreeParams {
    /// Enters the builder pattern, allowing custom parameters to be set using
    /// various setter methods.
    ///
    /// # Returns
    /// * the tree parameter builder
    pub fn builder() -> TreeParamBuilder {
        TreeParamBuilder::default()
    }

    pub fn max_leaf_size(&self) -> usize {
        self.max_leaf_size
    }

    pub fn min_ball_width(&self) -> f64 {
        self.min_ball_width
    }

    /// Exactly one of the two stopping rules must be active.
    pub(crate) fn validate(&self) -> Result<(), BregmanError> {
        match (self.max_leaf_size > 0, self.min_ball_width > 0.0) {
            (true, false) | (false, true) => Ok(()),
            (true, true) => Err(BregmanError::ConfigError(format!(
                "Only one of max_leaf_size ({}) and min_ball_width ({}) may be set",
                self.max_leaf_size, self.min_ball_width
            ))),
            (false, false) => Err(BregmanError::ConfigError(String::from(
                "One of max_leaf_size and min_ball_width must be positive",
            ))),
        }
    }
}

impl TreeParamBuilder {
    /// Sets the maximum number of points in a leaf. Nodes with more points than this are
    /// split further. Defaults to 10, unless a minimum ball width is set.
    ///
    /// # Parameters
    /// * max_leaf_size - the maximum leaf size
    ///
    /// # Returns
    /// * the tree parameter builder
    pub fn max_leaf_size(mut self, max_leaf_size: usize) -> TreeParamBuilder {
        self.max_leaf_size = Some(max_leaf_size);
        self
    }

    /// Sets the minimum ball width. Nodes whose radius exceeds half of this width are split
    /// further. Mutually exclusive with the maximum leaf size.
    ///
    /// # Parameters
    /// * min_ball_width - the minimum width of a ball
    ///
    /// # Returns
    /// * the tree parameter builder
    pub fn min_ball_width(mut self, min_ball_width: f64) -> TreeParamBuilder {
        let valid_min_ball_width = TreeParamBuilder::validate_input_left_bound(
            min_ball_width,
            MIN_BALL_WIDTH_MINIMUM,
            "min_ball_width",
        );
        self.min_ball_width = Some(valid_min_ball_width);
        self
    }

    /// Sets the maximum number of k-means iterations used when splitting a node.
    /// Defaults to 10000.
    pub fn kmeans_max_iterations(mut self, max_iterations: usize) -> TreeParamBuilder {
        self.kmeans_max_iterations = Some(max_iterations);
        self
    }

    /// Seeds the random choice of the first k-means center, making construction
    /// deterministic. By default the seed is drawn from the operating system.
    pub fn seed(mut self, seed: u64) -> TreeParamBuilder {
        self.seed = Some(seed);
        self
    }

    /// Sets whether every node also stores a left centroid and left radius. Defaults to false.
    pub fn compute_left_bounds(mut self, compute_left_bounds: bool) -> TreeParamBuilder {
        self.compute_left_bounds = Some(compute_left_bounds);
        self
    }

    /// Finishes the building of the tree parameters.
    ///
    /// # Returns
    /// * The completed tree parameters.
    pub fn build(self) -> TreeParams {
        let min_ball_width = self.min_ball_width.unwrap_or(MIN_BALL_WIDTH_DEFAULT);
        let default_leaf_size = if self.min_ball_width.is_some() {
            0
        } else {
            MAX_LEAF_SIZE_DEFAULT
        };
        TreeParams {
            max_leaf_size: self.max_leaf_size.unwrap_or(default_leaf_size),
            min_ball_width,
            kmeans_max_iterations: self
                .kmeans_max_iterations
                .unwrap_or(KMEANS_MAX_ITERATIONS_DEFAULT),
            seed: self.seed,
            compute_left_bounds: self
                .compute_left_bounds
                .unwrap_or(COMPUTE_LEFT_BOUNDS_DEFAULT),
        }
    }

    fn validate_input_left_bound(input_param: f64, left_bound: f64, param: &str) -> f64 {
        if input_param < left_bound || input_param.is_nan() {
            warn!(
                "{param} ({input_param}) cannot be lower than {left_bound}. Set to {left_bound}."
            );
            left_bound
        } else {
            input_param
        }
    }
}
