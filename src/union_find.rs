/// Disjoint sets over `0..n`, with union by rank and path compression.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    pub fn new(n_samples: usize) -> Self {
        UnionFind {
            parent: (0..n_samples).collect(),
            rank: vec![0; n_samples],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// The representative of the set containing `n`. Two elements are connected if and only if
    /// they have the same representative.
    pub fn find(&mut self, n: usize) -> usize {
        let mut root = n;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut p = n;
        while self.parent[p] != root {
            let next = self.parent[p];
            self.parent[p] = root;
            p = next;
        }
        root
    }

    /// Merges the sets containing `m` and `n`, doing nothing if they are already connected.
    pub fn union(&mut self, m: usize, n: usize) {
        let m_root = self.find(m);
        let n_root = self.find(n);
        if m_root == n_root {
            return;
        }
        match self.rank[m_root].cmp(&self.rank[n_root]) {
            std::cmp::Ordering::Less => self.parent[m_root] = n_root,
            std::cmp::Ordering::Greater => self.parent[n_root] = m_root,
            std::cmp::Ordering::Equal => {
                self.parent[n_root] = m_root;
                self.rank[m_root] += 1;
            }
        }
    }

    pub fn reset(&mut self) {
        self.parent
            .iter_mut()
            .enumerate()
            .for_each(|(i, parent)| *parent = i);
        self.rank.iter_mut().for_each(|rank| *rank = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn singletons() {
        let mut uf = UnionFind::new(4);
        for i in 0..4 {
            assert_eq!(i, uf.find(i));
        }
    }

    #[test]
    fn union_connects_transitively() {
        let mut uf = UnionFind::new(6);
        uf.union(0, 1);
        uf.union(2, 3);
        uf.union(1, 3);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(4));
        assert_ne!(uf.find(4), uf.find(5));
        uf.reset();
        assert_ne!(uf.find(0), uf.find(1));
    }

    #[test]
    fn agrees_with_labelling() {
        // Track components by relabelling, the slow way
        let n = 50;
        let mut rng = StdRng::seed_from_u64(21);
        let mut uf = UnionFind::new(n);
        let mut label: Vec<usize> = (0..n).collect();
        for _ in 0..40 {
            let (a, b) = (rng.random_range(0..n), rng.random_range(0..n));
            uf.union(a, b);
            let (from, to) = (label[b], label[a]);
            label.iter_mut().filter(|l| **l == from).for_each(|l| *l = to);
        }
        for i in 0..n {
            for j in 0..n {
                assert_eq!(label[i] == label[j], uf.find(i) == uf.find(j));
            }
        }
    }
}
