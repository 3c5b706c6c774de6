//! Cluster a SMILES file and write the centroids to SDF.
//!
//! ```text
//! cargo run --example cluster_smiles -- fragments.smi [config.toml] [centroids.sdf]
//! ```
//!
//! The input has one SMILES per line; anything after the first whitespace is
//! ignored, as are blank lines and lines starting with `#`. Set `RUST_LOG` to
//! change verbosity.

use std::process::ExitCode;

use fragclump::{export_sdf, ClusterConfig, Fragment, FragmentClusterer, Progress};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> fragclump::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        eprintln!("usage: cluster_smiles <fragments.smi> [config.toml] [centroids.sdf]");
        return Ok(());
    };
    let config = match args.next() {
        Some(path) => ClusterConfig::from_path(path)?,
        None => ClusterConfig::default(),
    };
    let output = args.next().unwrap_or_else(|| "centroids.sdf".to_string());

    let text = std::fs::read_to_string(&input)?;
    let mut parsed = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let Some(smiles) = line.split_whitespace().next() else {
            continue;
        };
        if smiles.starts_with('#') {
            continue;
        }
        match smiles.parse::<Fragment>() {
            Ok(fragment) => parsed.push(fragment),
            Err(e) => warn!(line = line_no + 1, %smiles, "skipping unparsable SMILES: {e}"),
        }
    }

    let clusterer = FragmentClusterer::new(config)?;
    let fragments = clusterer.prepare_fragments(parsed);
    println!("{} fragments after filtering and deduplication", fragments.len());

    let mut report = None;
    for event in clusterer.run(&fragments)? {
        match event {
            Progress::Stage(message) => println!("  {message}"),
            Progress::Finished(r) => report = Some(r),
        }
    }
    let Some(report) = report else {
        return Ok(());
    };

    for (label, centroid) in &report.centroids {
        let size = report.labels.iter().filter(|&&l| l == *label).count();
        println!("cluster {label:3} ({size:4} members): {}", centroid.fragment);
    }
    export_sdf(&output, &report.centroid_fragments())?;
    println!("wrote {} centroids to {output}", report.n_clusters());
    Ok(())
}
