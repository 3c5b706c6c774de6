//! Pluggable fragment dissimilarity.
//!
//! Two metrics are available, selected by [`MetricKind`]:
//!
//! - **MCS** ([`McsMetric`]): `1 - common_atoms / max(atoms_a, atoms_b)`, where
//!   `common_atoms` is the size of the maximum connected common substructure.
//!   Each pair search has a time budget; a pair that runs out of time counts as
//!   maximally dissimilar.
//! - **Tanimoto** ([`FingerprintMetric`]): `1 - Tanimoto` over Morgan
//!   fingerprints (radius 2, 2048 bits by default). Fingerprints are computed
//!   once per fragment into a [`FingerprintCache`].
//!
//! A metric is *prepared* against one fragment list ([`PreparedMetric`]) and
//! then addressed by fragment position, so per-fragment work happens once per
//! invocation.

mod fingerprint;
mod mcs;

pub use fingerprint::{
    morgan_fingerprint, Fingerprint, FingerprintCache, FingerprintMetric, FingerprintParams,
};
pub use mcs::{maximum_common_substructure, mcs_distance, McsMetric, McsOutcome, McsParams};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::Linkage;
use crate::error::Result;
use crate::fragment::Fragment;

/// Dissimilarity between positions of a prepared fragment list.
pub trait Dissimilarity: Sync {
    /// Number of fragments the metric was prepared for.
    fn len(&self) -> usize;

    /// Dissimilarity in `[0, 1]` between fragments `i` and `j`.
    fn dissimilarity(&self, i: usize, j: usize) -> f64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which metric to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Maximum common substructure overlap.
    Mcs,
    /// Morgan fingerprint Tanimoto distance.
    #[default]
    Tanimoto,
}

impl MetricKind {
    /// Linkage rule paired with this metric unless overridden: Ward for MCS,
    /// average for Tanimoto.
    pub fn default_linkage(self) -> Linkage {
        match self {
            MetricKind::Mcs => Linkage::Ward,
            MetricKind::Tanimoto => Linkage::Average,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Mcs => f.write_str("MCS"),
            MetricKind::Tanimoto => f.write_str("Tanimoto"),
        }
    }
}

/// Parameters for both metrics; only the chosen metric's part is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricParams {
    pub mcs: McsParams,
    pub fingerprint: FingerprintParams,
}

impl MetricParams {
    pub fn validate(&self) -> Result<()> {
        self.mcs.validate()?;
        self.fingerprint.validate()
    }
}

/// A metric bound to one fragment list.
#[derive(Debug)]
pub enum PreparedMetric<'a> {
    Mcs(McsMetric<'a>),
    Fingerprint(FingerprintMetric),
}

impl<'a> PreparedMetric<'a> {
    /// Prepare `kind` for `fragments`. For Tanimoto this computes every
    /// fingerprint up front.
    pub fn new(kind: MetricKind, fragments: &'a [Fragment], params: &MetricParams) -> Self {
        match kind {
            MetricKind::Mcs => PreparedMetric::Mcs(McsMetric::new(fragments, params.mcs)),
            MetricKind::Tanimoto => {
                PreparedMetric::Fingerprint(FingerprintMetric::new(fragments, params.fingerprint))
            }
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            PreparedMetric::Mcs(_) => MetricKind::Mcs,
            PreparedMetric::Fingerprint(_) => MetricKind::Tanimoto,
        }
    }

    /// Fingerprints, when the metric is fingerprint based.
    pub fn fingerprints(&self) -> Option<&FingerprintCache> {
        match self {
            PreparedMetric::Fingerprint(m) => Some(m.cache()),
            PreparedMetric::Mcs(_) => None,
        }
    }
}

impl Dissimilarity for PreparedMetric<'_> {
    fn len(&self) -> usize {
        match self {
            PreparedMetric::Mcs(m) => m.len(),
            PreparedMetric::Fingerprint(m) => m.len(),
        }
    }

    fn dissimilarity(&self, i: usize, j: usize) -> f64 {
        match self {
            PreparedMetric::Mcs(m) => m.dissimilarity(i, j),
            PreparedMetric::Fingerprint(m) => m.dissimilarity(i, j),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pairing() {
        assert_eq!(MetricKind::Mcs.default_linkage(), Linkage::Ward);
        assert_eq!(MetricKind::Tanimoto.default_linkage(), Linkage::Average);
    }

    #[test]
    fn prepared_metric_dispatch() {
        let fragments: Vec<Fragment> = ["CCO", "CCN"].iter().map(|s| s.parse().unwrap()).collect();
        let params = MetricParams::default();

        let fp = PreparedMetric::new(MetricKind::Tanimoto, &fragments, &params);
        assert_eq!(fp.kind(), MetricKind::Tanimoto);
        assert_eq!(fp.fingerprints().map(FingerprintCache::len), Some(2));

        let mcs = PreparedMetric::new(MetricKind::Mcs, &fragments, &params);
        assert_eq!(mcs.kind(), MetricKind::Mcs);
        assert!(mcs.fingerprints().is_none());
        // CC is shared out of three atoms.
        assert!((mcs.dissimilarity(0, 1) - 1.0 / 3.0).abs() < 1e-12);
    }
}
