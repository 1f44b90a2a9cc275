use std::cmp::Ordering;

use crate::f64_from_usize;
use crate::utils::Combinations;
pub mod cluster;

use cluster::Cluster;
use cluster::ClusterVec;

/// Pairwise distances between the active nodes of a [`Linkage`]
///
/// Each node occupies one slot of a dense square matrix. When two nodes
/// are merged, the new cluster takes over the lower slot and the higher
/// slot is deactivated.
#[derive(Debug, Default)]
struct DistanceMatrix {
    len: usize,
    values: Vec<f64>,
    /// The node that currently occupies each slot
    nodes: Vec<Option<usize>>,
}

impl DistanceMatrix {
    fn new(len: usize) -> Self {
        Self {
            len,
            values: vec![0.0; len * len],
            nodes: (0..len).map(Some).collect(),
        }
    }

    fn get(&self, slot1: usize, slot2: usize) -> f64 {
        self.values[slot1 * self.len + slot2]
    }

    fn insert(&mut self, slot1: usize, slot2: usize, value: f64) {
        self.values[slot1 * self.len + slot2] = value;
        self.values[slot2 * self.len + slot1] = value;
    }

    fn active_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| node.map(|_| slot))
    }

    /// Active slots together with the node occupying them
    fn active_nodes(&self) -> Vec<(usize, usize)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| node.map(|node| (slot, node)))
            .collect()
    }
}

/// Relative difference below which two distances are considered equal
const TIE_TOLERANCE: f64 = 1e-12;

fn compare_distances(a: f64, b: f64) -> Ordering {
    if a.is_finite() && b.is_finite() && (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs()) {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Average linkage (UPGMA) hierarchical clustering
///
/// # Examples
///
/// ```rust
/// use gopca::stats::Linkage;
/// use gopca::utils::Combinations;
///
/// fn distance(combs: Combinations<f64>) -> Vec<f64> {
///     combs.map(|(a, b)| (a - b).abs()).collect()
/// }
///
/// let points = [0.0, 5.0, 1.0, 6.0];
/// let linkage = Linkage::average(&points, distance);
///
/// let mut clusters = linkage.cluster();
/// let first = clusters.next().unwrap();
/// assert_eq!((first.lhs(), first.rhs()), (0, 2));
/// assert_eq!(clusters.next().unwrap().len(), 2);
/// assert_eq!(clusters.next().unwrap().len(), 4);
/// assert!(clusters.next().is_none());
///
/// let order = linkage.leaf_order(|a, b| points[a].total_cmp(&points[b]));
/// assert_eq!(order, vec![0, 2, 1, 3]);
/// ```
pub struct Linkage {
    distance_matrix: DistanceMatrix,
    initial_len: usize,
    clusters: ClusterVec,
    /// For every node, the observation that represents it in tie-breaks
    representatives: Vec<usize>,
}

impl Linkage {
    /// Performs average linkage clustering of `observations`
    ///
    /// The `distance` function receives all pairwise [`Combinations`] of the
    /// observations and must return one distance per pair, in the same order.
    ///
    /// In each iteration, the 2 closest nodes are merged into a new cluster.
    /// The distance of the new cluster to every other node is the average
    /// distance between their observations (Lance-Williams update).
    ///
    /// Equal distances are merged in the order of the observation indices,
    /// see [`Linkage::average_by`] to break ties by content instead.
    pub fn average<T, F>(observations: &[T], distance: F) -> Self
    where
        F: Fn(Combinations<'_, T>) -> Vec<f64>,
    {
        Self::average_by(observations, distance, |a, b| a.cmp(&b))
    }

    /// Performs average linkage clustering of `observations`, breaking ties
    /// between equal distances with `cmp`
    ///
    /// Every node is represented by its smallest observation according to
    /// `cmp`. Of several pairs of nodes with the same distance, the pair
    /// with the smallest representatives is merged first. If `cmp` only
    /// depends on the content of the observations, so does the dendrogram.
    ///
    /// ```
    /// use gopca::stats::Linkage;
    /// use gopca::utils::Combinations;
    ///
    /// fn distance(combs: Combinations<f64>) -> Vec<f64> {
    ///     combs.map(|(a, b)| (a - b).abs()).collect()
    /// }
    ///
    /// // 1.0 is equally close to 0.0 and 2.0
    /// let points = [2.0, 1.0, 0.0];
    /// let linkage = Linkage::average_by(&points, distance, |a, b| points[a].total_cmp(&points[b]));
    /// let first = linkage.cluster().next().unwrap();
    /// assert_eq!((first.lhs(), first.rhs()), (1, 2));
    /// ```
    pub fn average_by<T, F, C>(observations: &[T], distance: F, cmp: C) -> Self
    where
        F: Fn(Combinations<'_, T>) -> Vec<f64>,
        C: Fn(usize, usize) -> Ordering,
    {
        let mut s = Self::new(observations, distance);
        s.next_clusters(&cmp);
        s
    }

    /// Returns an Iterator of [`Cluster`] references, in merge order
    pub fn cluster(&self) -> cluster::Iter<'_> {
        self.clusters.iter()
    }

    /// Returns an Iterator of owned [`Cluster`], in merge order
    pub fn into_cluster(self) -> cluster::IntoIter {
        self.clusters.into_iter()
    }

    /// The number of clustered observations
    pub fn n_observations(&self) -> usize {
        self.initial_len
    }

    /// Returns the order of the observations in the dendrogram
    ///
    /// The dendrogram is traversed depth-first, visiting the smaller child
    /// first. Children of equal size are ordered by comparing their first
    /// observations with `cmp`, and by index if `cmp` considers them equal.
    /// This makes the order independent of the order of the input whenever
    /// the merge sequence is unambiguous.
    pub fn leaf_order<C>(&self, cmp: C) -> Vec<usize>
    where
        C: Fn(usize, usize) -> Ordering,
    {
        let mut nodes: Vec<Option<Vec<usize>>> = (0..self.initial_len)
            .map(|idx| Some(vec![idx]))
            .collect();

        for cluster in &self.clusters {
            let mut left = nodes[cluster.lhs()]
                .take()
                .expect("every node is merged exactly once");
            let mut right = nodes[cluster.rhs()]
                .take()
                .expect("every node is merged exactly once");

            let ordering = left
                .len()
                .cmp(&right.len())
                .then_with(|| cmp(left[0], right[0]))
                .then_with(|| left[0].cmp(&right[0]));
            if ordering == Ordering::Greater {
                std::mem::swap(&mut left, &mut right);
            }
            left.append(&mut right);
            nodes.push(Some(left));
        }

        nodes.pop().flatten().unwrap_or_default()
    }

    fn new<T, F>(observations: &[T], distance: F) -> Self
    where
        F: Fn(Combinations<'_, T>) -> Vec<f64>,
    {
        let len = observations.len();
        let mut s = Self {
            distance_matrix: DistanceMatrix::new(len),
            initial_len: len,
            clusters: ClusterVec::with_capacity(len.saturating_sub(1)),
            representatives: (0..len).collect(),
        };
        // initial calculation of all distances
        s.calculate_initial_distances(observations, distance);
        s
    }

    /// Fills the `DistanceMatrix` with the distances of all `Combinations`
    fn calculate_initial_distances<T, F>(&mut self, observations: &[T], func: F)
    where
        F: Fn(Combinations<'_, T>) -> Vec<f64>,
    {
        let distances = func(Combinations::new(observations));
        let index: Vec<usize> = (0..observations.len()).collect();
        for ((idx1, idx2), dist) in Combinations::new(&index).zip(distances) {
            self.distance_matrix.insert(*idx1, *idx2, dist);
        }
    }

    /// Returns the two active slots with the smallest distance and their nodes
    ///
    /// Distances within `TIE_TOLERANCE` are ties, which are resolved by the
    /// representatives of the nodes and finally by slot order.
    fn closest<C>(&self, cmp: &C) -> Option<((usize, usize), (usize, usize), f64)>
    where
        C: Fn(usize, usize) -> Ordering,
    {
        let active = self.distance_matrix.active_nodes();
        let mut best: Option<((usize, usize), (usize, usize), f64)> = None;
        for (i, first) in active.iter().enumerate() {
            for second in &active[i + 1..] {
                let dist = self.distance_matrix.get(first.0, second.0);
                let closer = match best {
                    None => true,
                    Some((b1, b2, best_dist)) => match compare_distances(dist, best_dist) {
                        Ordering::Less => true,
                        Ordering::Greater => false,
                        Ordering::Equal => {
                            self.pair_order((first.1, second.1), (b1.1, b2.1), cmp)
                                == Ordering::Less
                        }
                    },
                };
                if closer {
                    best = Some((*first, *second, dist));
                }
            }
        }
        best
    }

    /// Compares two pairs of nodes by their representatives, the smaller
    /// representative of each pair first
    fn pair_order<C>(&self, pair1: (usize, usize), pair2: (usize, usize), cmp: &C) -> Ordering
    where
        C: Fn(usize, usize) -> Ordering,
    {
        let sorted = |(node1, node2): (usize, usize)| {
            let rep1 = self.representatives[node1];
            let rep2 = self.representatives[node2];
            if cmp(rep1, rep2) == Ordering::Greater {
                (rep2, rep1)
            } else {
                (rep1, rep2)
            }
        };
        let (lo1, hi1) = sorted(pair1);
        let (lo2, hi2) = sorted(pair2);
        cmp(lo1, lo2).then_with(|| cmp(hi1, hi2))
    }

    /// Iteratively clusters all nodes until only one is left
    ///
    /// - Finds the 2 nodes with smallest distance
    /// - records their merge as a new `Cluster`
    /// - updates the distances of the merged node to all other active nodes
    fn next_clusters<C>(&mut self, cmp: &C)
    where
        C: Fn(usize, usize) -> Ordering,
    {
        while let Some(((slot1, node1), (slot2, node2), dist)) = self.closest(cmp) {
            let size1 = self.size_of_node(node1);
            let size2 = self.size_of_node(node2);

            self.clusters.push(Cluster::new(
                node1.min(node2),
                node1.max(node2),
                dist,
                size1 + size2,
            ));

            let weight1 = f64_from_usize(size1);
            let weight2 = f64_from_usize(size2);
            let others: Vec<usize> = self
                .distance_matrix
                .active_slots()
                .filter(|slot| *slot != slot1 && *slot != slot2)
                .collect();
            for other in others {
                let merged = (weight1 * self.distance_matrix.get(slot1, other)
                    + weight2 * self.distance_matrix.get(slot2, other))
                    / (weight1 + weight2);
                self.distance_matrix.insert(slot1, other, merged);
            }

            let rep1 = self.representatives[node1];
            let rep2 = self.representatives[node2];
            self.representatives.push(if cmp(rep1, rep2) == Ordering::Greater {
                rep2
            } else {
                rep1
            });

            let new_node = self.initial_len + self.clusters.len() - 1;
            self.distance_matrix.nodes[slot1] = Some(new_node);
            self.distance_matrix.nodes[slot2] = None;
        }
    }

    /// Returns the number of observations within a node
    fn size_of_node(&self, node: usize) -> usize {
        if node < self.initial_len {
            1
        } else {
            self.clusters
                .get(node - self.initial_len)
                .expect("idx is guaranteed to be in cluster")
                .len()
        }
    }
}

impl<'a> IntoIterator for &'a Linkage {
    type Item = &'a Cluster;
    type IntoIter = cluster::Iter<'a>;
    fn into_iter(self) -> Self::IntoIter {
        self.cluster()
    }
}

impl IntoIterator for Linkage {
    type Item = Cluster;
    type IntoIter = cluster::IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        self.into_cluster()
    }
}
