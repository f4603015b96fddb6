/// An undirected edge of a minimum spanning tree between two points, identified by the
/// indices they had in the caller's data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge<T> {
    pub u: usize,
    pub v: usize,
    pub weight: T,
}

/// The outcome of splitting the points of a node into two groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    /// The group (0 or 1) of every point, in the order of the node's range.
    pub membership: Vec<usize>,
    pub centers: Vec<Vec<T>>,
    /// For each group, the largest divergence of a member from its center.
    pub radii: Vec<T>,
}

impl<T> Partition<T> {
    pub(crate) fn count(&self, group: usize) -> usize {
        self.membership.iter().filter(|&&m| m == group).count()
    }
}
