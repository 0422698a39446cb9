//! Union-find over entity indices, used by the matcher to fold
//! pairwise merge decisions into a partition.
//!
//! Path halving plus union by rank. Entities are addressed by their
//! position in the matcher's entity slice, so the whole structure is
//! two flat vectors.

/// Disjoint set union over the indices `0..len`.
#[derive(Debug, Clone)]
pub struct Dsu {
    parent: Vec<usize>,
    rank: Vec<u32>,
    set_count: usize,
}

impl Dsu {
    /// Create a DSU where every index starts as its own singleton set.
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
            set_count: len,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of disjoint sets currently tracked.
    pub fn set_count(&self) -> usize {
        self.set_count
    }

    /// Find the root of `x`, compressing the path by halving: every
    /// other node on the way up is pointed at its grandparent.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            let grandparent = self.parent[self.parent[x]];
            self.parent[x] = grandparent;
            x = grandparent;
        }
        x
    }

    pub fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Merge the sets containing `a` and `b`. Returns false if they
    /// were already in the same set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        if self.rank[root_a] < self.rank[root_b] {
            self.parent[root_a] = root_b;
        } else if self.rank[root_a] > self.rank[root_b] {
            self.parent[root_b] = root_a;
        } else {
            self.parent[root_a] = root_b;
            self.rank[root_b] += 1;
        }
        self.set_count -= 1;
        true
    }

    /// Extract the partition as sorted index groups. Groups are ordered
    /// by their smallest member so the output is deterministic.
    pub fn clusters(&mut self) -> Vec<Vec<usize>> {
        let len = self.parent.len();
        let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); len];
        for idx in 0..len {
            let root = self.find(idx);
            by_root[root].push(idx);
        }
        let mut clusters: Vec<Vec<usize>> =
            by_root.into_iter().filter(|c| !c.is_empty()).collect();
        clusters.sort_by_key(|c| c[0]);
        clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons() {
        let mut dsu = Dsu::new(3);
        assert_eq!(dsu.set_count(), 3);
        assert_eq!(dsu.clusters(), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_union_and_find() {
        let mut dsu = Dsu::new(4);
        assert!(dsu.union(0, 2));
        assert!(dsu.same_set(0, 2));
        assert!(!dsu.same_set(0, 1));
        assert_eq!(dsu.set_count(), 3);
        // Second union of the same pair is a no-op.
        assert!(!dsu.union(2, 0));
        assert_eq!(dsu.set_count(), 3);
    }

    #[test]
    fn test_transitive_merge() {
        let mut dsu = Dsu::new(5);
        dsu.union(0, 1);
        dsu.union(1, 2);
        dsu.union(3, 4);
        assert!(dsu.same_set(0, 2));
        assert!(!dsu.same_set(2, 3));
        assert_eq!(dsu.clusters(), vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_partition_covers_every_index() {
        let mut dsu = Dsu::new(10);
        dsu.union(0, 9);
        dsu.union(3, 4);
        dsu.union(4, 5);
        let clusters = dsu.clusters();
        let mut seen: Vec<usize> = clusters.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }
}
