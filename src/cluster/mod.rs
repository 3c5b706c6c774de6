//! Hierarchical clustering of fragments.
//!
//! The pipeline has three steps, each usable on its own:
//!
//! 1. [`compute_distance_matrix`]: every unordered fragment pair through a
//!    [`MetricKind`], giving an `n x n` [`DistanceMatrix`].
//! 2. [`Dendrogram::from_matrix`]: agglomerative merge tree under a
//!    [`Linkage`] rule.
//! 3. [`Dendrogram::cut`]: flat labels under a [`CutCriterion`].
//!
//! [`cluster`] runs steps 2 and 3 and handles the trivial sizes (`n = 0` and
//! `n = 1`) without building a tree.
//!
//! ## Linkage per metric
//!
//! Unless told otherwise the pipeline pairs Ward with MCS distances and
//! average linkage with Tanimoto distances ([`MetricKind::default_linkage`]).
//! Both choices are configurable.
//!
//! ## Cluster ids
//!
//! Labels are opaque: they are numbered `0, 1, 2, ...` in order of first
//! appearance along the fragment list, and only their grouping matters.
//!
//! ## Usage
//!
//! ```rust
//! use fragclump::cluster::{cluster, compute_distance_matrix, CutCriterion};
//! use fragclump::{Fragment, MetricKind, MetricParams};
//!
//! let fragments: Vec<Fragment> = ["c1ccccc1O", "c1ccccc1O", "C#N", "FC(F)F"]
//!     .iter()
//!     .map(|s| s.parse().unwrap())
//!     .collect();
//!
//! let params = MetricParams::default();
//! let matrix = compute_distance_matrix(&fragments, MetricKind::Tanimoto, &params).unwrap();
//! assert_eq!(matrix.get(0, 1), 0.0);
//!
//! let labels = cluster(
//!     &matrix,
//!     CutCriterion::Threshold(0.01),
//!     MetricKind::Tanimoto.default_linkage(),
//! )
//! .unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[2], labels[3]);
//! ```

mod criterion;
mod linkage;
mod matrix;
pub(crate) mod util;

pub use criterion::CutCriterion;
pub use linkage::{Dendrogram, Linkage, Merge};
pub use matrix::{pairwise_distances, DistanceMatrix};

use crate::error::Result;
use crate::fragment::Fragment;
use crate::similarity::{MetricKind, MetricParams, PreparedMetric};

/// Pairwise distance matrix of `fragments` under `kind`.
///
/// An empty list gives a `0 x 0` matrix. Timed-out MCS pairs are recorded as
/// distance 1 and never reported as errors.
pub fn compute_distance_matrix(
    fragments: &[Fragment],
    kind: MetricKind,
    params: &MetricParams,
) -> Result<DistanceMatrix> {
    params.validate()?;
    let metric = PreparedMetric::new(kind, fragments, params);
    Ok(pairwise_distances(&metric))
}

/// Flat cluster labels for `matrix`, aligned with its rows.
///
/// The criterion is checked before any work. Zero points give no labels and
/// one point gives a single cluster.
pub fn cluster(
    matrix: &DistanceMatrix,
    criterion: CutCriterion,
    linkage: Linkage,
) -> Result<Vec<usize>> {
    criterion.validate()?;
    match matrix.len() {
        0 => Ok(Vec::new()),
        1 => Ok(vec![0]),
        _ => Dendrogram::build(matrix, linkage).cut(criterion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn trivial_sizes() {
        let empty = DistanceMatrix::zeros(0);
        let labels = cluster(&empty, CutCriterion::Threshold(0.5), Linkage::Ward).unwrap();
        assert!(labels.is_empty());
        let single = DistanceMatrix::zeros(1);
        let labels = cluster(&single, CutCriterion::MaxClusters(3), Linkage::Ward).unwrap();
        assert_eq!(labels, vec![0]);
    }

    #[test]
    fn criterion_is_checked_even_for_trivial_sizes() {
        let empty = DistanceMatrix::zeros(0);
        let err = cluster(&empty, CutCriterion::Threshold(-1.0), Linkage::Average);
        assert!(matches!(err, Err(Error::InvalidCriterion { .. })));
        let single = DistanceMatrix::zeros(1);
        let err = cluster(&single, CutCriterion::MaxClusters(0), Linkage::Average);
        assert!(matches!(err, Err(Error::InvalidCriterion { .. })));
    }

    #[test]
    fn empty_fragment_list_gives_empty_matrix() {
        let m = compute_distance_matrix(&[], MetricKind::Mcs, &MetricParams::default()).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn bad_metric_params_are_rejected() {
        let mut params = MetricParams::default();
        params.fingerprint.n_bits = 0;
        let fragments: Vec<Fragment> = vec!["CC".parse().unwrap()];
        assert!(compute_distance_matrix(&fragments, MetricKind::Tanimoto, &params).is_err());
    }

    #[test]
    fn identical_pair_groups_at_small_threshold() {
        let fragments: Vec<Fragment> = ["c1ccccc1O", "c1ccccc1O", "C#N", "FC(F)F"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let m = compute_distance_matrix(&fragments, MetricKind::Tanimoto, &MetricParams::default())
            .unwrap();
        assert_eq!(m.get(0, 1), 0.0);
        assert!(m.is_symmetric());

        let labels = cluster(&m, CutCriterion::Threshold(0.01), Linkage::Average).unwrap();
        assert_eq!(labels[0], labels[1]);
        assert_ne!(labels[0], labels[2]);
        assert_ne!(labels[0], labels[3]);
        assert_ne!(labels[2], labels[3]);
    }

    #[test]
    fn mcs_matrix_is_bounded() {
        let fragments: Vec<Fragment> = ["CCO", "CCN", "c1ccccc1", ""]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let m =
            compute_distance_matrix(&fragments, MetricKind::Mcs, &MetricParams::default()).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                let d = m.get(i, j);
                assert!((0.0..=1.0).contains(&d));
            }
        }
        // Zero-atom fragment is maximally distant.
        assert_eq!(m.get(0, 3), 1.0);
    }
}
