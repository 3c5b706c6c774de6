use std::collections::BTreeSet;

use fragclump::{
    cluster, compute_distance_matrix, select_centroids, ClusterConfig, CutCriterion, Fragment,
    FragmentClusterer, Linkage, MetricKind, MetricParams,
};
use proptest::prelude::*;

const PIECES: &[&str] = &["C", "N", "O", "CC", "C(C)", "C(=O)", "c1ccccc1", "C#N", "c1ccncc1"];

fn smiles(max_pieces: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(PIECES), 1..max_pieces)
        .prop_map(|parts| parts.concat())
}

/// Between 2 and `max - 1` fragments of up to `max_pieces - 1` pieces each.
fn fragments_of(max: usize, max_pieces: usize) -> impl Strategy<Value = Vec<Fragment>> {
    prop::collection::vec(smiles(max_pieces), 2..max).prop_map(|all| {
        all.iter()
            .map(|s| s.parse().expect("generated SMILES parse"))
            .collect()
    })
}

fn fragments(max: usize) -> impl Strategy<Value = Vec<Fragment>> {
    fragments_of(max, 5)
}

fn is_first_appearance_numbered(labels: &[usize]) -> bool {
    let mut next = 0;
    for &l in labels {
        if l > next {
            return false;
        }
        if l == next {
            next += 1;
        }
    }
    true
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_tanimoto_matrix_is_a_distance_matrix(frags in fragments(12)) {
        let params = MetricParams::default();
        let m = compute_distance_matrix(&frags, MetricKind::Tanimoto, &params).unwrap();
        prop_assert_eq!(m.len(), frags.len());
        prop_assert!(m.is_symmetric());
        for i in 0..m.len() {
            for j in 0..m.len() {
                prop_assert!((0.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }

    #[test]
    fn prop_labels_align_and_are_normalized(
        frags in fragments(12),
        k in 1usize..6,
        threshold in 0.0f64..1.5,
    ) {
        let params = MetricParams::default();
        let m = compute_distance_matrix(&frags, MetricKind::Tanimoto, &params).unwrap();
        for criterion in [CutCriterion::MaxClusters(k), CutCriterion::Threshold(threshold)] {
            let labels = cluster(&m, criterion, Linkage::Average).unwrap();
            prop_assert_eq!(labels.len(), frags.len());
            prop_assert!(is_first_appearance_numbered(&labels));
        }
    }

    #[test]
    fn prop_max_clusters_is_an_upper_bound(frags in fragments(12), k in 1usize..6) {
        let params = MetricParams::default();
        let m = compute_distance_matrix(&frags, MetricKind::Tanimoto, &params).unwrap();
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Ward] {
            let labels = cluster(&m, CutCriterion::MaxClusters(k), linkage).unwrap();
            let distinct: BTreeSet<_> = labels.iter().collect();
            prop_assert!(distinct.len() <= k);
            let one = cluster(&m, CutCriterion::MaxClusters(1), linkage).unwrap();
            prop_assert!(one.iter().all(|&l| l == 0));
        }
    }

    #[test]
    fn prop_raising_threshold_never_adds_clusters(
        frags in fragments(12),
        lo in 0.0f64..1.0,
        delta in 0.0f64..1.0,
    ) {
        let params = MetricParams::default();
        let m = compute_distance_matrix(&frags, MetricKind::Tanimoto, &params).unwrap();
        let count = |t: f64| {
            let labels = cluster(&m, CutCriterion::Threshold(t), Linkage::Average).unwrap();
            labels.iter().collect::<BTreeSet<_>>().len()
        };
        prop_assert!(count(lo + delta) <= count(lo));
    }

    #[test]
    fn prop_zero_threshold_only_joins_identical_fingerprints(frags in fragments(10)) {
        let params = MetricParams::default();
        let m = compute_distance_matrix(&frags, MetricKind::Tanimoto, &params).unwrap();
        let labels = cluster(&m, CutCriterion::Threshold(0.0), Linkage::Average).unwrap();
        for i in 0..frags.len() {
            for j in 0..frags.len() {
                if labels[i] == labels[j] {
                    prop_assert_eq!(m.get(i, j), 0.0);
                }
            }
        }
    }

    #[test]
    fn prop_centroids_belong_to_their_clusters(frags in fragments_of(8, 3), k in 1usize..4) {
        for kind in [MetricKind::Tanimoto, MetricKind::Mcs] {
            let params = MetricParams::default();
            let m = compute_distance_matrix(&frags, kind, &params).unwrap();
            let labels = cluster(&m, CutCriterion::MaxClusters(k), kind.default_linkage()).unwrap();
            let centroids = select_centroids(&frags, &labels, kind, &params).unwrap();

            let distinct: BTreeSet<usize> = labels.iter().copied().collect();
            prop_assert_eq!(centroids.keys().copied().collect::<BTreeSet<_>>(), distinct);
            for (label, c) in &centroids {
                prop_assert_eq!(labels[c.index], *label);
                prop_assert_eq!(c.fragment.smiles(), frags[c.index].smiles());
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_mcs_runs_are_deterministic(frags in fragments_of(7, 3)) {
        let config = ClusterConfig::default()
            .with_metric(MetricKind::Mcs)
            .with_criterion(CutCriterion::Threshold(0.5));
        let clusterer = FragmentClusterer::new(config).unwrap();
        let a = clusterer.cluster_fragments(&frags).unwrap();
        let b = clusterer.cluster_fragments(&frags).unwrap();
        prop_assert_eq!(&a.matrix, &b.matrix);
        prop_assert_eq!(&a.labels, &b.labels);
        prop_assert_eq!(
            a.centroids.values().map(|c| c.index).collect::<Vec<_>>(),
            b.centroids.values().map(|c| c.index).collect::<Vec<_>>()
        );
        for i in 0..frags.len() {
            prop_assert_eq!(a.matrix.get(i, i), 0.0);
        }
    }
}
