//! Pull-driven clustering runs.
//!
//! A [`ClusterRun`] is an iterator of [`Progress`] events. Every call to
//! `next` performs one stage of the pipeline (distances, tree, cut, one
//! centroid) and reports it; nothing runs between pulls. The last event is
//! always [`Progress::Finished`] with the [`ClusterReport`], after which the
//! iterator is exhausted. A caller that stops pulling simply drops the run.
//!
//! Every stage message is also emitted as a `tracing` event at `INFO`.

use std::collections::btree_map;
use std::iter::FusedIterator;
use std::mem;
use std::time::Instant;

use tracing::info;

use crate::centroid::{group_members, Centroid, CentroidMap, CentroidSelector, SubMatrixSource};
use crate::cluster::{pairwise_distances, Dendrogram, DistanceMatrix, Linkage};
use crate::config::ClusterConfig;
use crate::error::Result;
use crate::fragment::Fragment;
use crate::similarity::PreparedMetric;

/// One event of a lazy computation: a stage message or the final result.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress<T> {
    Stage(String),
    Finished(T),
}

impl<T> Progress<T> {
    pub fn is_finished(&self) -> bool {
        matches!(self, Progress::Finished(_))
    }

    /// The stage message, if this is one.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Progress::Stage(message) => Some(message),
            Progress::Finished(_) => None,
        }
    }

    pub fn into_result(self) -> Option<T> {
        match self {
            Progress::Finished(value) => Some(value),
            Progress::Stage(_) => None,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct ClusterReport {
    /// Cluster label per fragment, numbered from 0 by first appearance.
    pub labels: Vec<usize>,
    pub centroids: CentroidMap,
    /// The full pairwise distance matrix.
    pub matrix: DistanceMatrix,
    pub linkage: Linkage,
    /// MCS searches that hit their deadline, centroid recomputation included.
    pub mcs_timeouts: usize,
}

impl ClusterReport {
    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Centroid fragments in cluster-id order.
    pub fn centroid_fragments(&self) -> Vec<Fragment> {
        self.centroids.values().map(|c| c.fragment.clone()).collect()
    }
}

enum State<'a> {
    Start,
    Distances,
    Tree {
        metric: PreparedMetric<'a>,
        matrix: DistanceMatrix,
    },
    Cut {
        metric: PreparedMetric<'a>,
        matrix: DistanceMatrix,
        tree: Option<Dendrogram>,
    },
    Centroids {
        metric: PreparedMetric<'a>,
        matrix: DistanceMatrix,
        labels: Vec<usize>,
        groups: btree_map::IntoIter<usize, Vec<usize>>,
        centroids: CentroidMap,
    },
    Done,
}

/// Lazy clustering of one fragment list under one configuration.
pub struct ClusterRun<'a> {
    fragments: &'a [Fragment],
    config: ClusterConfig,
    state: State<'a>,
}

impl<'a> ClusterRun<'a> {
    /// Validate `config` and set up a run. No distances are computed yet.
    pub fn new(fragments: &'a [Fragment], config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fragments,
            config,
            state: State::Start,
        })
    }

    /// Pull every remaining event and return the report.
    pub fn finish(self) -> ClusterReport {
        self.filter_map(Progress::into_result)
            .last()
            .unwrap_or_default()
    }

    fn step(&mut self) -> Option<Progress<ClusterReport>> {
        let n = self.fragments.len();
        let (next, event) = match mem::replace(&mut self.state, State::Done) {
            State::Start => (
                State::Distances,
                Progress::Stage(format!(
                    "computing pairwise {} distances for {n} fragments",
                    self.config.metric
                )),
            ),
            State::Distances => {
                let start = Instant::now();
                let params = self.config.metric_params();
                let metric = PreparedMetric::new(self.config.metric, self.fragments, &params);
                let matrix = pairwise_distances(&metric);
                let mut message = format!(
                    "pairwise {} distances done in {:.2}s",
                    self.config.metric,
                    start.elapsed().as_secs_f64()
                );
                let timeouts = timeouts(&metric);
                if timeouts > 0 {
                    message.push_str(&format!(" ({timeouts} MCS searches timed out)"));
                }
                (State::Tree { metric, matrix }, Progress::Stage(message))
            }
            State::Tree { metric, matrix } => {
                let linkage = self.config.linkage();
                let (tree, message) = if n < 2 {
                    (None, format!("{n} fragment(s), no linkage tree needed"))
                } else {
                    let tree = Dendrogram::build(&matrix, linkage);
                    let merges = tree.merges().len();
                    let message = format!("{linkage} linkage tree built with {merges} merges");
                    (Some(tree), message)
                };
                (
                    State::Cut {
                        metric,
                        matrix,
                        tree,
                    },
                    Progress::Stage(message),
                )
            }
            State::Cut {
                metric,
                matrix,
                tree,
            } => {
                let labels = match &tree {
                    Some(tree) => tree.assign(self.config.criterion),
                    None => vec![0; n],
                };
                let groups = group_members(&labels);
                let message = format!(
                    "assigned {} clusters ({})",
                    groups.len(),
                    self.config.criterion
                );
                (
                    State::Centroids {
                        metric,
                        matrix,
                        labels,
                        groups: groups.into_iter(),
                        centroids: CentroidMap::new(),
                    },
                    Progress::Stage(message),
                )
            }
            State::Centroids {
                metric,
                matrix,
                labels,
                mut groups,
                mut centroids,
            } => match groups.next() {
                Some((label, members)) => {
                    let mut selector = CentroidSelector::new(&metric);
                    if self.config.centroid_distances == SubMatrixSource::Slice {
                        selector = selector.with_full_matrix(&matrix);
                    }
                    let index = selector.pick(&members);
                    let message = format!(
                        "cluster {label}: centroid is fragment {index} of {} members",
                        members.len()
                    );
                    centroids.insert(
                        label,
                        Centroid {
                            index,
                            fragment: self.fragments[index].clone(),
                        },
                    );
                    (
                        State::Centroids {
                            metric,
                            matrix,
                            labels,
                            groups,
                            centroids,
                        },
                        Progress::Stage(message),
                    )
                }
                None => {
                    let report = ClusterReport {
                        labels,
                        centroids,
                        matrix,
                        linkage: self.config.linkage(),
                        mcs_timeouts: timeouts(&metric),
                    };
                    (State::Done, Progress::Finished(report))
                }
            },
            State::Done => return None,
        };

        self.state = next;
        if let Progress::Stage(message) = &event {
            info!(metric = %self.config.metric, "{message}");
        }
        Some(event)
    }
}

fn timeouts(metric: &PreparedMetric<'_>) -> usize {
    match metric {
        PreparedMetric::Mcs(m) => m.timeouts(),
        PreparedMetric::Fingerprint(_) => 0,
    }
}

impl Iterator for ClusterRun<'_> {
    type Item = Progress<ClusterReport>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

impl FusedIterator for ClusterRun<'_> {}

impl std::fmt::Debug for ClusterRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self.state {
            State::Start => "start",
            State::Distances => "distances",
            State::Tree { .. } => "tree",
            State::Cut { .. } => "cut",
            State::Centroids { .. } => "centroids",
            State::Done => "done",
        };
        f.debug_struct("ClusterRun")
            .field("fragments", &self.fragments.len())
            .field("metric", &self.config.metric)
            .field("stage", &stage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::CutCriterion;
    use crate::error::Error;
    use crate::similarity::MetricKind;

    fn frags(smiles: &[&str]) -> Vec<Fragment> {
        smiles.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn tanimoto(criterion: CutCriterion) -> ClusterConfig {
        ClusterConfig::default()
            .with_metric(MetricKind::Tanimoto)
            .with_criterion(criterion)
    }

    #[test]
    fn empty_input_finishes_with_empty_report() {
        let events: Vec<_> = ClusterRun::new(&[], ClusterConfig::default()).unwrap().collect();
        assert!(events.last().unwrap().is_finished());
        let report = events.into_iter().last().unwrap().into_result().unwrap();
        assert!(report.labels.is_empty());
        assert!(report.centroids.is_empty());
        assert!(report.matrix.is_empty());
    }

    #[test]
    fn single_fragment_is_one_cluster() {
        let fragments = frags(&["c1ccccc1O"]);
        let config = ClusterConfig::default().with_metric(MetricKind::Mcs);
        let report = ClusterRun::new(&fragments, config).unwrap().finish();
        assert_eq!(report.labels, vec![0]);
        assert_eq!(report.centroids[&0].index, 0);
        assert_eq!(report.linkage, Linkage::Ward);
    }

    #[test]
    fn stages_precede_exactly_one_result() {
        let fragments = frags(&["CCO", "CCN", "c1ccccc1", "c1ccccc1C"]);
        let events: Vec<_> = ClusterRun::new(&fragments, tanimoto(CutCriterion::MaxClusters(2)))
            .unwrap()
            .collect();

        let finished = events.iter().filter(|e| e.is_finished()).count();
        assert_eq!(finished, 1);
        assert!(events[0].stage().unwrap().starts_with("computing pairwise Tanimoto"));

        let n_clusters = events.last().cloned().unwrap().into_result().unwrap().n_clusters();
        // distances x2, tree, cut, one per cluster, result
        assert_eq!(events.len(), 4 + n_clusters + 1);
    }

    #[test]
    fn run_is_fused() {
        let fragments = frags(&["CC", "CCC"]);
        let mut run = ClusterRun::new(&fragments, ClusterConfig::default()).unwrap();
        while run.next().is_some() {}
        assert!(run.next().is_none());
        assert!(run.next().is_none());
    }

    #[test]
    fn invalid_config_fails_before_any_work() {
        let fragments = frags(&["CC", "CCC"]);
        let err = ClusterRun::new(&fragments, tanimoto(CutCriterion::Threshold(-0.1)));
        assert!(matches!(err, Err(Error::InvalidCriterion { .. })));
    }

    #[test]
    fn identical_pair_scenario() {
        let fragments = frags(&["c1ccccc1O", "c1ccccc1O", "C#N", "FC(F)F"]);
        let report = ClusterRun::new(&fragments, tanimoto(CutCriterion::Threshold(0.01)))
            .unwrap()
            .finish();
        assert_eq!(report.labels, vec![0, 0, 1, 2]);
        assert_eq!(report.n_clusters(), 3);
        assert_eq!(report.centroids[&0].index, 0);
        assert_eq!(report.centroids[&1].fragment.smiles(), "C#N");
        assert_eq!(report.centroid_fragments().len(), 3);
    }

    #[test]
    fn slice_policy_matches_recompute() {
        let fragments = frags(&["CCO", "CCCO", "CCCCO", "c1ccccc1", "c1ccccc1C"]);
        let base = ClusterConfig::default()
            .with_metric(MetricKind::Mcs)
            .with_criterion(CutCriterion::MaxClusters(2));
        let recomputed = ClusterRun::new(&fragments, base.clone()).unwrap().finish();
        let sliced = ClusterRun::new(
            &fragments,
            base.with_centroid_distances(SubMatrixSource::Slice),
        )
        .unwrap()
        .finish();
        assert_eq!(recomputed.labels, sliced.labels);
        for (label, c) in &recomputed.centroids {
            assert_eq!(c.index, sliced.centroids[label].index);
        }
    }

    #[test]
    fn progress_accessors() {
        let stage: Progress<u8> = Progress::Stage("x".into());
        assert_eq!(stage.stage(), Some("x"));
        assert_eq!(stage.into_result(), None);
        assert_eq!(Progress::Finished(3u8).into_result(), Some(3));
    }
}
