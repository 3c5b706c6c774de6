//! Clustering of molecular fragments.
//!
//! `fragclump` groups small molecules (fragments, given as SMILES) by
//! structural similarity and picks one representative per group.
//!
//! - [`similarity`]: maximum-common-substructure and Morgan/Tanimoto
//!   dissimilarities
//! - [`cluster`]: pairwise distance matrices, agglomerative clustering and
//!   flat cuts
//! - [`centroid`]: one representative fragment per cluster
//! - [`progress`]: the whole pipeline as a pull-driven sequence of stage
//!   events
//!
//! [`FragmentClusterer`] ties these together behind a [`ClusterConfig`] that
//! can be loaded from TOML.
//!
//! ```rust
//! use fragclump::{ClusterConfig, CutCriterion, Fragment, FragmentClusterer, MetricKind};
//!
//! let fragments: Vec<Fragment> = ["c1ccccc1O", "c1ccccc1N", "CCCCO", "CCCCN"]
//!     .iter()
//!     .map(|s| s.parse().unwrap())
//!     .collect();
//!
//! let config = ClusterConfig::default()
//!     .with_metric(MetricKind::Mcs)
//!     .with_criterion(CutCriterion::MaxClusters(2));
//! let report = FragmentClusterer::new(config)
//!     .unwrap()
//!     .cluster_fragments(&fragments)
//!     .unwrap();
//!
//! assert_eq!(report.labels.len(), 4);
//! assert!(report.n_clusters() <= 2);
//! ```

#![forbid(unsafe_code)]

pub mod centroid;
pub mod cluster;
pub mod config;
pub mod error;
pub mod fragment;
pub mod molecule;
pub mod progress;
pub mod similarity;

pub use centroid::{select_centroids, Centroid, CentroidMap, CentroidSelector, SubMatrixSource};
pub use cluster::{
    cluster, compute_distance_matrix, CutCriterion, Dendrogram, DistanceMatrix, Linkage,
};
pub use config::{ClusterConfig, FragmentClusterer};
pub use error::{Error, Result};
pub use fragment::{dedup_fragments, Fragment, FragmentFilter};
pub use molecule::{export_sdf, write_sdf, Molecule};
pub use progress::{ClusterReport, ClusterRun, Progress};
pub use similarity::{Dissimilarity, MetricKind, MetricParams, PreparedMetric};
