//! Centroid selection: one representative member per cluster.
//!
//! - **MCS**: the member with the smallest mean MCS distance to the cluster's
//!   members. The intra-cluster distances are recomputed by default, or sliced
//!   from the full matrix with [`SubMatrixSource::Slice`].
//! - **Tanimoto**: the member whose fingerprint is closest, in Euclidean
//!   distance, to the element-wise mean fingerprint of the cluster. The mean
//!   is only a comparison target; the centroid is always a real member.
//!
//! A singleton is its own centroid. Ties go to the member that comes first in
//! the fragment list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::cluster::util::squared_euclidean;
use crate::cluster::{pairwise_distances, DistanceMatrix};
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::similarity::{Dissimilarity, Fingerprint, MetricKind, MetricParams, PreparedMetric};

/// Where intra-cluster MCS distances come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubMatrixSource {
    /// Run the MCS search again for every pair inside the cluster.
    #[default]
    Recompute,
    /// Reuse entries of the full distance matrix.
    Slice,
}

/// The representative of one cluster.
#[derive(Debug, Clone)]
pub struct Centroid {
    /// Position of the centroid in the fragment list.
    pub index: usize,
    pub fragment: Fragment,
}

/// Cluster id to centroid, ordered by cluster id.
pub type CentroidMap = BTreeMap<usize, Centroid>;

/// Members of each cluster, as fragment positions in ascending order.
pub fn group_members(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(idx);
    }
    groups
}

/// Pick one centroid per distinct label.
///
/// Prepares `kind` against `fragments` (fingerprints are computed here for
/// Tanimoto) and recomputes intra-cluster MCS distances. Callers that already
/// hold a [`PreparedMetric`], for instance the one the distance matrix was
/// built from, should use [`CentroidSelector::new`] with it instead so the
/// fingerprints are not computed twice:
///
/// ```rust
/// use fragclump::cluster::pairwise_distances;
/// use fragclump::{cluster, CentroidSelector, CutCriterion, Fragment, Linkage};
/// use fragclump::{MetricKind, MetricParams, PreparedMetric};
///
/// let fragments: Vec<Fragment> = ["c1ccccc1O", "c1ccccc1N", "CCCCO", "CCCCN"]
///     .iter()
///     .map(|s| s.parse().unwrap())
///     .collect();
/// let metric = PreparedMetric::new(MetricKind::Tanimoto, &fragments, &MetricParams::default());
/// let matrix = pairwise_distances(&metric);
/// let labels = cluster(&matrix, CutCriterion::MaxClusters(2), Linkage::Average).unwrap();
/// let centroids = CentroidSelector::new(&metric)
///     .select_all(&fragments, &labels)
///     .unwrap();
/// assert!((1..=2).contains(&centroids.len()));
/// ```
pub fn select_centroids(
    fragments: &[Fragment],
    labels: &[usize],
    kind: MetricKind,
    params: &MetricParams,
) -> Result<CentroidMap> {
    check_aligned(fragments, labels)?;
    params.validate()?;
    let metric = PreparedMetric::new(kind, fragments, params);
    CentroidSelector::new(&metric).select_all(fragments, labels)
}

fn check_aligned(fragments: &[Fragment], labels: &[usize]) -> Result<()> {
    if labels.len() != fragments.len() {
        return Err(Error::LabelMismatch {
            labels: labels.len(),
            fragments: fragments.len(),
        });
    }
    Ok(())
}

/// Centroid rule bound to a prepared metric.
#[derive(Debug, Clone, Copy)]
pub struct CentroidSelector<'m, 'a> {
    metric: &'m PreparedMetric<'a>,
    full: Option<&'m DistanceMatrix>,
}

impl<'m, 'a> CentroidSelector<'m, 'a> {
    pub fn new(metric: &'m PreparedMetric<'a>) -> Self {
        Self { metric, full: None }
    }

    /// Use `matrix` for MCS sub-matrices instead of recomputing them.
    /// Has no effect for fingerprint metrics.
    pub fn with_full_matrix(mut self, matrix: &'m DistanceMatrix) -> Self {
        self.full = Some(matrix);
        self
    }

    /// Centroid of every cluster in `labels`.
    pub fn select_all(&self, fragments: &[Fragment], labels: &[usize]) -> Result<CentroidMap> {
        check_aligned(fragments, labels)?;
        if self.metric.len() != labels.len() {
            return Err(Error::LabelMismatch {
                labels: labels.len(),
                fragments: self.metric.len(),
            });
        }
        if let Some(full) = self.full {
            if full.len() != labels.len() {
                return Err(Error::DimensionMismatch {
                    expected: labels.len(),
                    found: full.len(),
                });
            }
        }

        Ok(group_members(labels)
            .into_iter()
            .map(|(label, members)| {
                let index = self.pick(&members);
                let centroid = Centroid {
                    index,
                    fragment: fragments[index].clone(),
                };
                (label, centroid)
            })
            .collect())
    }

    /// Fragment position of the centroid of `members` (non-empty, ascending).
    pub fn pick(&self, members: &[usize]) -> usize {
        if members.len() <= 1 {
            return members.first().copied().unwrap_or(0);
        }

        let scores: Vec<f64> = match self.metric {
            PreparedMetric::Fingerprint(m) => {
                let fps: Vec<&Fingerprint> = members.iter().map(|&i| m.cache().get(i)).collect();
                distances_to_mean(&fps)
            }
            PreparedMetric::Mcs(_) => {
                let sub = match self.full {
                    Some(full) => full.select(members),
                    None => pairwise_distances(&Subset {
                        inner: self.metric,
                        members,
                    }),
                };
                sub.row_means()
            }
        };

        let best = argmin(&scores);
        trace!(size = members.len(), centroid = members[best], "centroid picked");
        members[best]
    }
}

/// Euclidean distance of each fingerprint to the element-wise mean.
fn distances_to_mean(fps: &[&Fingerprint]) -> Vec<f64> {
    let n_bits = fps.first().map_or(0, |f| f.n_bits());
    let dense: Vec<Vec<f64>> = fps
        .iter()
        .map(|fp| {
            let mut v = vec![0.0; n_bits];
            for bit in fp.ones() {
                v[bit] = 1.0;
            }
            v
        })
        .collect();

    let mut mean = vec![0.0; n_bits];
    for v in &dense {
        for (m, x) in mean.iter_mut().zip(v) {
            *m += x;
        }
    }
    let k = dense.len() as f64;
    for m in &mut mean {
        *m /= k;
    }

    dense
        .iter()
        .map(|v| squared_euclidean(v, &mean).sqrt())
        .collect()
}

/// First index of the smallest value.
fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v < values[best] {
            best = i;
        }
    }
    best
}

/// A metric restricted to a subset of positions.
struct Subset<'s, M: ?Sized> {
    inner: &'s M,
    members: &'s [usize],
}

impl<M: Dissimilarity + ?Sized> Dissimilarity for Subset<'_, M> {
    fn len(&self) -> usize {
        self.members.len()
    }

    fn dissimilarity(&self, i: usize, j: usize) -> f64 {
        self.inner.dissimilarity(self.members[i], self.members[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::compute_distance_matrix;

    fn frags(smiles: &[&str]) -> Vec<Fragment> {
        smiles.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn label_mismatch_is_an_error() {
        let fragments = frags(&["CC", "CCC"]);
        let params = MetricParams::default();
        let err = select_centroids(&fragments, &[0], MetricKind::Tanimoto, &params);
        assert!(matches!(err, Err(Error::LabelMismatch { labels: 1, fragments: 2 })));
    }

    #[test]
    fn empty_input_gives_empty_map() {
        let out = select_centroids(&[], &[], MetricKind::Mcs, &MetricParams::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn singleton_is_its_own_centroid() {
        let fragments = frags(&["c1ccccc1"]);
        let out =
            select_centroids(&fragments, &[0], MetricKind::Mcs, &MetricParams::default()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[&0].index, 0);
        assert_eq!(out[&0].fragment.smiles(), "c1ccccc1");
    }

    #[test]
    fn mcs_centroid_is_the_most_central_member() {
        // Propane overlaps both neighbours best: CC with ethane, CCC with butane.
        let fragments = frags(&["CC", "CCC", "CCCCCC", "N#N"]);
        let labels = [0, 0, 0, 1];
        let params = MetricParams::default();
        let out = select_centroids(&fragments, &labels, MetricKind::Mcs, &params).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[&0].index, 1);
        assert_eq!(out[&1].index, 3);
    }

    #[test]
    fn slice_and_recompute_agree() {
        let fragments = frags(&["CCO", "CCCO", "CCCCO", "c1ccccc1", "c1ccccc1C"]);
        let labels = [0, 0, 0, 1, 1];
        let params = MetricParams::default();
        let metric = PreparedMetric::new(MetricKind::Mcs, &fragments, &params);
        let full = compute_distance_matrix(&fragments, MetricKind::Mcs, &params).unwrap();

        let recomputed = CentroidSelector::new(&metric).select_all(&fragments, &labels).unwrap();
        let sliced = CentroidSelector::new(&metric)
            .with_full_matrix(&full)
            .select_all(&fragments, &labels)
            .unwrap();
        for label in [0, 1] {
            assert_eq!(recomputed[&label].index, sliced[&label].index);
        }
        assert_eq!(recomputed[&0].index, 1);
    }

    #[test]
    fn fingerprint_centroid_is_a_member_of_its_cluster() {
        let fragments = frags(&["Cc1ccccc1", "CCc1ccccc1", "Oc1ccccc1", "CCCC", "CCCCC"]);
        let labels = [3, 3, 3, 8, 8];
        let params = MetricParams::default();
        let out = select_centroids(&fragments, &labels, MetricKind::Tanimoto, &params).unwrap();
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![3, 8]);
        assert!([0, 1, 2].contains(&out[&3].index));
        assert!([3, 4].contains(&out[&8].index));
    }

    #[test]
    fn identical_fingerprints_tie_to_first_member() {
        let fragments = frags(&["CCO", "CCO", "OCC"]);
        let params = MetricParams::default();
        let out = select_centroids(&fragments, &[0, 0, 0], MetricKind::Tanimoto, &params).unwrap();
        assert_eq!(out[&0].index, 0);
    }

    #[test]
    fn group_members_orders_by_label() {
        let groups = group_members(&[2, 0, 2, 1]);
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(groups[&2], vec![0, 2]);
    }

    #[test]
    fn argmin_prefers_first() {
        assert_eq!(argmin(&[0.5, 0.2, 0.2, 0.9]), 1);
        assert_eq!(argmin(&[1.0]), 0);
    }
}
