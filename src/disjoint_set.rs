//! Disjoint-set forest (union-find) shared by the labeling, segmentation and connectivity code.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    parent: u32,
    rank: u32,
    size: u32,
}

/// Union-find over `0..n` with union by rank and single-level path compression in `find()`.
///
/// Out-of-range indices are programming errors and panic.
#[derive(Debug, Clone)]
pub struct DisjointSetForest {
    nodes: Vec<Node>,
    num_sets: usize,
}

impl DisjointSetForest {
    /// Creates `size` singleton sets.
    pub fn new(size: usize) -> Self {
        assert!(size < u32::MAX as usize, "Size must be smaller than {}", u32::MAX);
        DisjointSetForest {
            nodes: (0..size as u32)
                .map(|i| Node {
                    parent: i,
                    rank: 0,
                    size: 1,
                })
                .collect(),
            num_sets: size,
        }
    }

    /// Empty forest with room for `capacity` sets before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        DisjointSetForest {
            nodes: Vec::with_capacity(capacity),
            num_sets: 0,
        }
    }

    /// Appends a new singleton set and returns its index.
    pub fn make_set(&mut self) -> u32 {
        let index = self.nodes.len() as u32;
        assert!(index < u32::MAX, "Forest is full");
        self.nodes.push(Node {
            parent: index,
            rank: 0,
            size: 1,
        });
        self.num_sets += 1;
        index
    }

    /// Number of elements (not sets) in the forest.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the root of `x`. The node `x` is re-attached directly to the root.
    #[inline]
    pub fn find(&mut self, x: u32) -> u32 {
        let root = self.find_root(x);
        self.nodes[x as usize].parent = root;
        root
    }

    /// Root lookup without compression, usable through a shared reference.
    #[inline]
    pub fn find_root(&self, x: u32) -> u32 {
        let mut y = x;
        while y != self.nodes[y as usize].parent {
            y = self.nodes[y as usize].parent;
        }
        y
    }

    /// Merges the sets of `x` and `y`. Returns `false` when they already share a root.
    ///
    /// The lower-rank root goes under the higher-rank one. On equal ranks the root of `y` goes
    /// under the root of `x` and the rank of `x` grows by one.
    pub fn union(&mut self, x: u32, y: u32) -> bool {
        let root_x = self.find(x) as usize;
        let root_y = self.find(y) as usize;
        if root_x == root_y {
            return false;
        }
        let (parent, child) = if self.nodes[root_x].rank >= self.nodes[root_y].rank {
            (root_x, root_y)
        } else {
            (root_y, root_x)
        };
        if self.nodes[parent].rank == self.nodes[child].rank {
            self.nodes[parent].rank += 1;
        }
        self.nodes[child].parent = parent as u32;
        self.nodes[parent].size += self.nodes[child].size;
        self.num_sets -= 1;
        true
    }

    /// Size of the set `x` belongs to.
    pub fn size(&self, x: u32) -> u32 {
        self.nodes[self.find_root(x) as usize].size
    }

    /// Number of disjoint sets currently in the forest.
    pub fn no_of_elements(&self) -> usize {
        self.num_sets
    }

    /// Maps every root to a dense index `0..no_of_elements()`, numbered in the order the roots
    /// are first reached when walking the elements from 0 upwards.
    ///
    /// The returned vector holds the dense index of every element.
    pub fn flatten(&mut self) -> Vec<u32> {
        let mut substitute = vec![u32::MAX; self.nodes.len()];
        let mut next = 0;
        (0..self.nodes.len() as u32)
            .map(|i| {
                let root = self.find(i) as usize;
                if substitute[root] == u32::MAX {
                    substitute[root] = next;
                    next += 1;
                }
                substitute[root]
            })
            .collect()
    }

    #[cfg(test)]
    fn rank(&self, x: u32) -> u32 {
        self.nodes[x as usize].rank
    }

    #[cfg(test)]
    fn parent(&self, x: u32) -> u32 {
        self.nodes[x as usize].parent
    }
}
