//! Agglomerative hierarchical clustering.
//!
//! # Algorithm
//!
//! Merges are found with the nearest-neighbour chain (Murtagh, 1983): follow
//! nearest neighbours from an arbitrary cluster until two clusters are each
//! other's nearest neighbour, merge them, and continue from the remaining
//! chain. Distances to the merged cluster come from the Lance-Williams update
//! of the chosen [`Linkage`]. All supported rules are *reducible*, which is
//! what makes the chain valid; for them it returns the same hierarchy as the
//! naive closest-pair loop in O(n²) time instead of O(n³).
//!
//! Merges are then sorted by height (stable, so ties keep discovery order)
//! and numbered the usual way: ids `< n` are points, id `n + k` is the cluster
//! formed by the `k`-th merge.
//!
//! ## Ward on non-Euclidean input
//!
//! Ward's update assumes Euclidean distances. Applied to MCS distances it is a
//! heuristic that still yields compact clusters; heights stay non-negative
//! because the update is clamped at zero before the square root.
//!
//! ## Determinism
//!
//! The chain starts from the lowest active index and scans neighbours in
//! index order with strict comparison, so a fixed matrix and linkage always
//! give the same tree.
//!
//! ## References
//!
//! Murtagh, F. (1983). "A survey of recent advances in hierarchical clustering
//! algorithms." The Computer Journal 26(4).
//!
//! Müllner, D. (2011). "Modern hierarchical, agglomerative clustering
//! algorithms." arXiv:1109.2378.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::criterion::CutCriterion;
use super::matrix::DistanceMatrix;
use super::util::{relabel_by_first_appearance, UnionFind};
use crate::error::{Error, Result};

/// Rule for the distance between a merged cluster and the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum pairwise distance.
    Single,
    /// Maximum pairwise distance.
    Complete,
    /// Mean pairwise distance (UPGMA).
    #[default]
    Average,
    /// Ward's minimum-variance criterion.
    Ward,
}

impl Linkage {
    /// Lance-Williams update: distance from cluster `k` to `x ∪ y`.
    #[inline]
    fn update(self, d_kx: f64, d_ky: f64, d_xy: f64, n_x: f64, n_y: f64, n_k: f64) -> f64 {
        match self {
            Linkage::Single => d_kx.min(d_ky),
            Linkage::Complete => d_kx.max(d_ky),
            Linkage::Average => (n_x * d_kx + n_y * d_ky) / (n_x + n_y),
            Linkage::Ward => {
                let t = 1.0 / (n_x + n_y + n_k);
                let sq = (n_k + n_x) * t * d_kx * d_kx + (n_k + n_y) * t * d_ky * d_ky
                    - n_k * t * d_xy * d_xy;
                sq.max(0.0).sqrt()
            }
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Ward => "ward",
        })
    }
}

/// One agglomeration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    /// Smaller of the two merged cluster ids.
    pub left: usize,
    /// Larger of the two merged cluster ids.
    pub right: usize,
    /// Linkage distance at which the merge happened.
    pub distance: f64,
    /// Number of points in the merged cluster.
    pub size: usize,
}

/// Merge tree produced by agglomerative clustering.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    n: usize,
    linkage: Linkage,
    merges: Vec<Merge>,
    // A point from each side of every merge, aligned with `merges`; enough to
    // replay any prefix with a union-find.
    representatives: Vec<(usize, usize)>,
}

impl Dendrogram {
    /// Run agglomerative clustering over `matrix`.
    ///
    /// Needs at least two points; callers with fewer should not build a tree.
    pub fn from_matrix(matrix: &DistanceMatrix, linkage: Linkage) -> Result<Self> {
        if matrix.len() < 2 {
            return Err(Error::EmptyInput {
                n_items: matrix.len(),
            });
        }
        Ok(Self::build(matrix, linkage))
    }

    pub(crate) fn build(matrix: &DistanceMatrix, linkage: Linkage) -> Self {
        let n = matrix.len();
        let mut steps = nn_chain(matrix, linkage);
        steps.sort_by(|a, b| a.2.total_cmp(&b.2));

        let mut uf = UnionFind::new(n);
        let mut cluster_of_root: Vec<usize> = (0..n).collect();
        let mut merges = Vec::with_capacity(steps.len());
        let mut representatives = Vec::with_capacity(steps.len());

        for (k, &(x, y, distance)) in steps.iter().enumerate() {
            let cx = cluster_of_root[uf.find(x)];
            let cy = cluster_of_root[uf.find(y)];
            let root = uf.union(x, y);
            cluster_of_root[root] = n + k;
            merges.push(Merge {
                left: cx.min(cy),
                right: cx.max(cy),
                distance,
                size: uf.set_size(root),
            });
            representatives.push((x, y));
        }

        Self {
            n,
            linkage,
            merges,
            representatives,
        }
    }

    /// Number of clustered points.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Merges sorted by height.
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Flat cluster labels, one per point, numbered from 0 in order of first
    /// appearance.
    pub fn cut(&self, criterion: CutCriterion) -> Result<Vec<usize>> {
        criterion.validate()?;
        Ok(self.assign(criterion))
    }

    /// [`Dendrogram::cut`] for an already validated criterion.
    pub(crate) fn assign(&self, criterion: CutCriterion) -> Vec<usize> {
        let heights: Vec<f64> = self.merges.iter().map(|m| m.distance).collect();
        self.labels_after(criterion.merges_to_apply(&heights, self.n))
    }

    fn labels_after(&self, applied: usize) -> Vec<usize> {
        let mut uf = UnionFind::new(self.n);
        for &(x, y) in &self.representatives[..applied] {
            uf.union(x, y);
        }
        relabel_by_first_appearance((0..self.n).map(|i| uf.find(i)))
    }
}

/// Nearest-neighbour chain. Returns `(x, y, height)` per merge in discovery
/// order, `x` and `y` being points representing the merged clusters.
fn nn_chain(matrix: &DistanceMatrix, linkage: Linkage) -> Vec<(usize, usize, f64)> {
    let n = matrix.len();
    let mut d: Vec<f64> = (0..n).flat_map(|i| matrix.row(i).iter().copied()).collect();
    let mut size = vec![1usize; n];
    let mut active = vec![true; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut steps = Vec::with_capacity(n.saturating_sub(1));

    for _ in 1..n {
        if chain.is_empty() {
            if let Some(first) = active.iter().position(|&a| a) {
                chain.push(first);
            }
        }

        let (x, y, height) = loop {
            let x = chain[chain.len() - 1];
            let prev = chain.len().checked_sub(2).map(|p| chain[p]);

            // Ties prefer the previous chain element, which guarantees that
            // the chain terminates.
            let (mut nearest, mut best) = match prev {
                Some(p) => (p, d[x * n + p]),
                None => (usize::MAX, f64::INFINITY),
            };
            for i in 0..n {
                if !active[i] || i == x {
                    continue;
                }
                let di = d[x * n + i];
                if nearest == usize::MAX || di < best {
                    nearest = i;
                    best = di;
                }
            }

            if Some(nearest) == prev {
                chain.truncate(chain.len() - 2);
                break (x.min(nearest), x.max(nearest), best);
            }
            chain.push(nearest);
        };

        // The merged cluster lives on in slot `y`.
        let (n_x, n_y) = (size[x] as f64, size[y] as f64);
        for k in 0..n {
            if !active[k] || k == x || k == y {
                continue;
            }
            let updated =
                linkage.update(d[k * n + x], d[k * n + y], height, n_x, n_y, size[k] as f64);
            d[k * n + y] = updated;
            d[y * n + k] = updated;
        }
        active[x] = false;
        size[y] += size[x];
        steps.push((x, y, height));
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(points: &[f64]) -> DistanceMatrix {
        let n = points.len();
        let mut m = DistanceMatrix::zeros(n);
        for i in 0..n {
            for j in (i + 1)..n {
                m.set(i, j, (points[i] - points[j]).abs());
            }
        }
        m
    }

    #[test]
    fn needs_two_points() {
        assert!(Dendrogram::from_matrix(&DistanceMatrix::zeros(0), Linkage::Average).is_err());
        assert!(Dendrogram::from_matrix(&DistanceMatrix::zeros(1), Linkage::Ward).is_err());
        assert!(Dendrogram::from_matrix(&DistanceMatrix::zeros(2), Linkage::Ward).is_ok());
    }

    #[test]
    fn average_linkage_heights() {
        // Points on a line: 0, 1, 5.
        let tree = Dendrogram::from_matrix(&matrix(&[0.0, 1.0, 5.0]), Linkage::Average).unwrap();
        let merges = tree.merges();
        assert_eq!(merges.len(), 2);
        assert_eq!((merges[0].left, merges[0].right), (0, 1));
        assert_eq!(merges[0].distance, 1.0);
        assert_eq!(merges[0].size, 2);
        // Mean of 5 and 4.
        assert_eq!((merges[1].left, merges[1].right), (2, 3));
        assert!((merges[1].distance - 4.5).abs() < 1e-12);
        assert_eq!(merges[1].size, 3);
    }

    #[test]
    fn single_and_complete_linkage_heights() {
        let m = matrix(&[0.0, 1.0, 5.0]);
        let single = Dendrogram::from_matrix(&m, Linkage::Single).unwrap();
        assert_eq!(single.merges()[1].distance, 4.0);
        let complete = Dendrogram::from_matrix(&m, Linkage::Complete).unwrap();
        assert_eq!(complete.merges()[1].distance, 5.0);
    }

    #[test]
    fn ward_linkage_heights() {
        // {0, 1} against {5}: sqrt((2*25 + 2*16 - 1*1) / 3) = sqrt(27).
        let tree = Dendrogram::from_matrix(&matrix(&[0.0, 1.0, 5.0]), Linkage::Ward).unwrap();
        assert_eq!(tree.merges()[0].distance, 1.0);
        assert!((tree.merges()[1].distance - 27.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn heights_are_sorted() {
        let points = [0.0, 0.3, 0.35, 2.0, 2.1, 7.0, 7.5, 7.6];
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Ward] {
            let tree = Dendrogram::from_matrix(&matrix(&points), linkage).unwrap();
            assert_eq!(tree.merges().len(), points.len() - 1);
            assert!(tree.merges().windows(2).all(|w| w[0].distance <= w[1].distance));
            assert_eq!(tree.merges().last().unwrap().size, points.len());
        }
    }

    #[test]
    fn cuts() {
        let m = matrix(&[0.0, 0.1, 5.0, 5.1, 20.0]);
        let tree = Dendrogram::from_matrix(&m, Linkage::Average).unwrap();

        let labels = tree.cut(CutCriterion::Threshold(0.5)).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1, 2]);

        let labels = tree.cut(CutCriterion::Threshold(0.0)).unwrap();
        assert_eq!(labels, vec![0, 1, 2, 3, 4]);

        let labels = tree.cut(CutCriterion::MaxClusters(2)).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 0, 1]);

        let labels = tree.cut(CutCriterion::MaxClusters(1)).unwrap();
        assert_eq!(labels, vec![0; 5]);

        assert!(tree.cut(CutCriterion::MaxClusters(0)).is_err());
        assert!(tree.cut(CutCriterion::Threshold(-1.0)).is_err());
    }

    #[test]
    fn duplicates_merge_at_zero() {
        let tree = Dendrogram::from_matrix(&matrix(&[1.0, 1.0, 3.0]), Linkage::Ward).unwrap();
        assert_eq!(tree.merges()[0].distance, 0.0);
        assert_eq!(tree.cut(CutCriterion::Threshold(0.0)).unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn deterministic_across_runs() {
        let m = matrix(&[0.0, 0.2, 0.2, 0.4, 0.9, 1.1, 1.1]);
        let first = Dendrogram::from_matrix(&m, Linkage::Average).unwrap();
        for _ in 0..5 {
            let again = Dendrogram::from_matrix(&m, Linkage::Average).unwrap();
            assert_eq!(first.merges(), again.merges());
        }
    }
}
