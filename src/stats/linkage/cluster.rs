//! A merge step of an agglomerative clustering
//!
//! A cluster joins two nodes, each being either a single observation
//! or a previously formed cluster.

/// A combination of 2 nodes of a dendrogram
///
/// This `struct` is created by the [`Linkage`](`crate::stats::Linkage`) struct and yielded
/// by the [`Linkage::into_cluster`](`crate::stats::Linkage::into_cluster`) and
/// [`Linkage::cluster`](`crate::stats::Linkage::cluster`) iterators.
///
/// Node indices below the number of observations refer to observations,
/// index `n_observations + i` refers to the `i`-th cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    idx1: usize,
    idx2: usize,
    distance: f64,
    size: usize,
}

impl Cluster {
    /// Creates a new `Cluster`
    pub(super) fn new(idx1: usize, idx2: usize, distance: f64, size: usize) -> Self {
        Self {
            idx1,
            idx2,
            distance,
            size,
        }
    }

    /// Returns the index of the left hand side node
    pub fn lhs(&self) -> usize {
        self.idx1
    }

    /// Returns the index of the right hand side node
    pub fn rhs(&self) -> usize {
        self.idx2
    }

    /// Returns the distance of the two nodes
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Returns the total number of observations in the cluster
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.size
    }
}

#[derive(Debug, Default)]
pub(super) struct ClusterVec(Vec<Cluster>);

impl ClusterVec {
    pub(super) fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub(super) fn push(&mut self, value: Cluster) {
        self.0.push(value);
    }

    pub(super) fn get(&self, index: usize) -> Option<&Cluster> {
        self.0.get(index)
    }

    pub(super) fn len(&self) -> usize {
        self.0.len()
    }

    pub(super) fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }
}

impl IntoIterator for ClusterVec {
    type Item = Cluster;
    type IntoIter = IntoIter;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.0.into_iter())
    }
}

impl<'a> IntoIterator for &'a ClusterVec {
    type Item = &'a Cluster;
    type IntoIter = Iter<'a>;
    fn into_iter(self) -> Self::IntoIter {
        Iter::new(self.0.iter())
    }
}

/// Iterates [`Cluster`] references in merge order
///
/// This `struct` is yielded by the [`Linkage::cluster`](`crate::stats::Linkage::cluster`) method
pub struct Iter<'a> {
    iter: std::slice::Iter<'a, Cluster>,
}

impl<'a> Iter<'a> {
    fn new(iter: std::slice::Iter<'a, Cluster>) -> Self {
        Self { iter }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Cluster;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {
    fn len(&self) -> usize {
        self.iter.len()
    }
}

/// Iterates owned [`Cluster`]s in merge order
///
/// This `struct` is yielded by the [`Linkage::into_cluster`](`crate::stats::Linkage::into_cluster`) method
#[derive(Debug)]
pub struct IntoIter {
    iter: std::vec::IntoIter<Cluster>,
}

impl IntoIter {
    fn new(iter: std::vec::IntoIter<Cluster>) -> Self {
        Self { iter }
    }
}

impl Iterator for IntoIter {
    type Item = Cluster;
    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

impl ExactSizeIterator for IntoIter {
    fn len(&self) -> usize {
        self.iter.len()
    }
}
