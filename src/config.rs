//! Run configuration and the configured clustering facade.
//!
//! ```toml
//! metric = "mcs"
//! criterion = { max_clusters = 20 }
//! linkage = "ward"            # optional; defaults per metric
//! mcs_timeout_ms = 5000
//! centroid_distances = "recompute"
//!
//! [fingerprint]
//! radius = 2
//! n_bits = 2048
//!
//! [filter]
//! min_atoms = 5
//! max_atoms = 100
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::centroid::SubMatrixSource;
use crate::cluster::{CutCriterion, Linkage};
use crate::error::Result;
use crate::fragment::{dedup_fragments, Fragment, FragmentFilter};
use crate::progress::{ClusterReport, ClusterRun, Progress};
use crate::similarity::{FingerprintParams, McsParams, MetricKind, MetricParams};

/// Everything one clustering run needs besides the fragments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub metric: MetricKind,
    pub criterion: CutCriterion,
    /// Overrides the metric's default linkage when set.
    pub linkage: Option<Linkage>,
    /// Per-pair MCS time budget in milliseconds.
    pub mcs_timeout_ms: u64,
    /// Source of intra-cluster MCS distances for centroid selection.
    pub centroid_distances: SubMatrixSource,
    pub fingerprint: FingerprintParams,
    pub filter: FragmentFilter,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            metric: MetricKind::default(),
            criterion: CutCriterion::default(),
            linkage: None,
            mcs_timeout_ms: McsParams::default().timeout_ms,
            centroid_distances: SubMatrixSource::default(),
            fingerprint: FingerprintParams::default(),
            filter: FragmentFilter::default(),
        }
    }
}

impl ClusterConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading cluster config");
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Set the metric.
    pub fn with_metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    /// Set the cut criterion.
    pub fn with_criterion(mut self, criterion: CutCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Force a linkage rule regardless of metric.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = Some(linkage);
        self
    }

    /// Set the per-pair MCS budget.
    pub fn with_mcs_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.mcs_timeout_ms = timeout_ms;
        self
    }

    /// Choose how MCS centroid sub-matrices are obtained.
    pub fn with_centroid_distances(mut self, source: SubMatrixSource) -> Self {
        self.centroid_distances = source;
        self
    }

    /// Linkage in effect: the override, or the metric's default.
    pub fn linkage(&self) -> Linkage {
        self.linkage.unwrap_or_else(|| self.metric.default_linkage())
    }

    pub fn metric_params(&self) -> MetricParams {
        MetricParams {
            mcs: McsParams {
                timeout_ms: self.mcs_timeout_ms,
            },
            fingerprint: self.fingerprint,
        }
    }

    /// Check every knob; nothing expensive runs before this passes.
    pub fn validate(&self) -> Result<()> {
        self.criterion.validate()?;
        self.metric_params().validate()?;
        self.filter.validate()
    }
}

/// Configured entry point: filter, cluster, and pick centroids.
#[derive(Debug, Clone, Default)]
pub struct FragmentClusterer {
    config: ClusterConfig,
}

impl FragmentClusterer {
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Apply the size filter, then drop structures already seen.
    pub fn prepare_fragments(
        &self,
        fragments: impl IntoIterator<Item = Fragment>,
    ) -> Vec<Fragment> {
        dedup_fragments(self.config.filter.apply(fragments))
    }

    /// Lazy run over `fragments`; pull it to advance the computation.
    pub fn run<'a>(&self, fragments: &'a [Fragment]) -> Result<ClusterRun<'a>> {
        ClusterRun::new(fragments, self.config.clone())
    }

    /// Run to completion and return the report.
    pub fn cluster_fragments(&self, fragments: &[Fragment]) -> Result<ClusterReport> {
        Ok(self.run(fragments)?.finish())
    }

    /// Run to completion, handing every stage message to `on_stage`.
    pub fn cluster_fragments_with(
        &self,
        fragments: &[Fragment],
        mut on_stage: impl FnMut(&str),
    ) -> Result<ClusterReport> {
        let mut report = None;
        for event in self.run(fragments)? {
            match event {
                Progress::Stage(message) => on_stage(&message),
                Progress::Finished(r) => report = Some(r),
            }
        }
        Ok(report.unwrap_or_default())
    }
}
