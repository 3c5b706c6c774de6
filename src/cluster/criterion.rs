use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How to cut a merge tree into flat clusters.
///
/// In TOML this reads as `criterion = { threshold = 0.4 }` or
/// `criterion = { max_clusters = 12 }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutCriterion {
    /// Keep every merge whose height is at most this distance.
    Threshold(f64),
    /// Produce at most this many clusters.
    MaxClusters(usize),
}

impl Default for CutCriterion {
    fn default() -> Self {
        CutCriterion::Threshold(0.5)
    }
}

impl CutCriterion {
    pub fn validate(&self) -> Result<()> {
        match *self {
            // `!(t >= 0.0)` also rejects NaN.
            CutCriterion::Threshold(t) if !(t >= 0.0) => Err(Error::InvalidCriterion {
                name: "threshold",
                message: "must be a non-negative number",
            }),
            CutCriterion::MaxClusters(0) => Err(Error::InvalidCriterion {
                name: "max_clusters",
                message: "must be at least 1",
            }),
            _ => Ok(()),
        }
    }

    /// Number of leading merges to apply, given merge heights sorted
    /// ascending over `n` points.
    ///
    /// For `MaxClusters(k)` every merge not higher than merge `n - k` is kept,
    /// so ties at that height can leave fewer than `k` clusters.
    pub(crate) fn merges_to_apply(&self, heights: &[f64], n: usize) -> usize {
        match *self {
            CutCriterion::Threshold(t) => heights.partition_point(|&h| h <= t),
            CutCriterion::MaxClusters(k) => {
                if k >= n || heights.is_empty() {
                    return 0;
                }
                let cut = heights[(n - k - 1).min(heights.len() - 1)];
                heights.partition_point(|&h| h <= cut)
            }
        }
    }
}

impl fmt::Display for CutCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CutCriterion::Threshold(t) => write!(f, "distance <= {t}"),
            CutCriterion::MaxClusters(k) => write!(f, "at most {k} clusters"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert!(CutCriterion::Threshold(0.0).validate().is_ok());
        assert!(CutCriterion::Threshold(-0.1).validate().is_err());
        assert!(CutCriterion::Threshold(f64::NAN).validate().is_err());
        assert!(CutCriterion::MaxClusters(1).validate().is_ok());
        assert!(CutCriterion::MaxClusters(0).validate().is_err());
    }

    #[test]
    fn merge_counts() {
        let heights = [0.1, 0.2, 0.2, 0.7];
        assert_eq!(CutCriterion::Threshold(0.0).merges_to_apply(&heights, 5), 0);
        assert_eq!(CutCriterion::Threshold(0.2).merges_to_apply(&heights, 5), 3);
        assert_eq!(CutCriterion::Threshold(5.0).merges_to_apply(&heights, 5), 4);

        assert_eq!(CutCriterion::MaxClusters(1).merges_to_apply(&heights, 5), 4);
        assert_eq!(CutCriterion::MaxClusters(4).merges_to_apply(&heights, 5), 1);
        // Merges 2 and 3 tie, so asking for 3 clusters yields 2.
        assert_eq!(CutCriterion::MaxClusters(3).merges_to_apply(&heights, 5), 3);
        assert_eq!(CutCriterion::MaxClusters(5).merges_to_apply(&heights, 5), 0);
        assert_eq!(CutCriterion::MaxClusters(9).merges_to_apply(&heights, 5), 0);
    }
}
