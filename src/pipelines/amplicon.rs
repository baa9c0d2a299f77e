/// Amplicon (16S/18S) branch: manifest, import, demultiplex summary, and
/// the separate export phase (denoise through tree export).

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use crate::cli::DataType;
use crate::config::defs::{PipelineError, RunConfig, RunLayout, BIOM_TAG, QIIME_TAG};
use crate::utils::command::{amplicon_tools, biom, check_versions, qiime, run_tool};
use crate::utils::file::{absolutize, dir_is_empty};
use crate::utils::manifest::write_manifest;
use crate::utils::metadata::RunMetadata;
use crate::utils::samples::ReadSet;
use crate::utils::table::{otu_to_csv, tax_to_csv};
use crate::utils::tree::pad_otu_with_tree_leaves;

pub fn classifier_download_url() -> String {
    "https://data.qiime2.org/2023.2/common/gg-13-8-99-nb-classifier.qza".to_string()
}

fn classified_artifact_name(data_type: DataType) -> &'static str {
    if data_type == DataType::SixteenS {
        "gg-13-8-99-nb-classified.qza"
    } else {
        "silva-132-99-nb-classifier.qza"
    }
}

fn demux_artifact_name(paired: bool) -> String {
    format!("demux-{}-end.qza", if paired { "paired" } else { "single" })
}

/// Import half of the branch: write the manifest, import the reads, and
/// summarize the demultiplexed artifact for inspection.
pub async fn run(layout: &RunLayout, read_set: &ReadSet) -> Result<(), PipelineError> {
    println!("\n-------------\n Amplicon\n-------------\n");

    check_versions(&amplicon_tools()).await?;

    let fastq_dir = layout.fastq_dir();
    if dir_is_empty(&fastq_dir) {
        warn!("No reads under {:?}; nothing to import.", fastq_dir);
        return Ok(());
    }

    let manifest_path = write_manifest(layout, read_set)?;

    let paired = read_set.is_paired();
    let qza_out = layout.qza_dir().join(demux_artifact_name(paired));
    run_tool(
        QIIME_TAG,
        &qiime::import_args(paired, &manifest_path, &qza_out),
        None,
    )
    .await;

    let vis_path = layout.vis_dir().join(format!("{}.qzv", layout.dataset_id));
    run_tool(QIIME_TAG, &qiime::demux_summarize_args(&qza_out, &vis_path), None).await;

    info!("Amplicon import finished; run the export module once trim/trunc are chosen.");
    Ok(())
}

fn classifier_exists(path: &Path) -> Result<(), PipelineError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::InvalidConfig(format!(
            "Classifier not found at {:?}! Download it from: {}",
            path,
            classifier_download_url()
        )))
    }
}

/// Paired reads want `forward,reverse` pairs for trim and trunc; single
/// reads want plain integers. Anything else is a configuration error.
fn check_trim_trunc(paired: bool, trim: &str, trunc: &str) -> Result<(), PipelineError> {
    let check = |name: &str, value: &str| -> Result<(), PipelineError> {
        if paired {
            let parts: Vec<&str> = value.split(',').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.trim().parse::<u32>().is_err()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "--{} must be two comma-separated integers for paired reads, got '{}'",
                    name, value
                )));
            }
        } else if value.trim().parse::<u32>().is_err() {
            return Err(PipelineError::InvalidConfig(format!(
                "--{} must be an integer for single-end reads, got '{}'",
                name, value
            )));
        }
        Ok(())
    };
    check("trim", trim)?;
    check("trunc", trunc)
}

/// Export phase: denoise, cluster, classify, filter, then export tables
/// and the phylogenetic tree. Individual stage failures are reported and
/// the sequence continues; only configuration problems abort.
pub async fn export(config: Arc<RunConfig>, layout: &RunLayout) -> Result<(), PipelineError> {
    println!("\n-------------\n Amplicon Export\n-------------\n");

    check_versions(&amplicon_tools()).await?;

    let metadata = RunMetadata::load(&layout.base_dir).map_err(|e| {
        PipelineError::InvalidConfig(format!(
            "No usable run metadata under {:?} ({}); run the import phase first.",
            layout.base_dir, e
        ))
    })?;
    let read_set = metadata.read_set();
    let paired = read_set.is_paired();
    let data_type = config.args.data_type;

    let classifier = match &config.args.classifier {
        Some(c) => absolutize(Path::new(c), &config.cwd),
        None => {
            return Err(PipelineError::InvalidConfig(
                "--classifier is required for the export module".to_string(),
            ))
        }
    };
    classifier_exists(&classifier)?;

    let (trim, trunc) = match (&config.args.trim, &config.args.trunc) {
        (Some(trim), Some(trunc)) => (trim.clone(), trunc.clone()),
        _ => {
            return Err(PipelineError::InvalidConfig(
                "--trim and --trunc are required for the export module".to_string(),
            ))
        }
    };
    check_trim_trunc(paired, &trim, &trunc)?;

    let qza_dir = layout.qza_dir();
    let demux_path = qza_dir.join(demux_artifact_name(paired));
    if !demux_path.exists() {
        warn!(
            "Demultiplexed artifact {:?} not found; run the import phase first.",
            demux_path
        );
        return Ok(());
    }

    info!("Running DADA2...");
    run_tool(
        QIIME_TAG,
        &qiime::dada2_args(paired, &demux_path, &qza_dir, &trim, &trunc, config.threads),
        None,
    )
    .await;

    info!("Clustering features...");
    run_tool(QIIME_TAG, &qiime::cluster_args(&qza_dir), None).await;

    let classified = classified_artifact_name(data_type);
    info!("Assigning taxonomy...");
    run_tool(QIIME_TAG, &qiime::classify_args(&qza_dir, &classifier, classified), None).await;

    layout.scaffold_exports()?;

    info!("Cleaning taxonomy...");
    run_tool(QIIME_TAG, &qiime::filter_taxa_args(&qza_dir, classified), None).await;
    run_tool(QIIME_TAG, &qiime::filter_features_args(&qza_dir), None).await;

    info!("Exporting OTU & taxonomy...");
    export_otu(layout).await;
    export_taxonomy(layout, classified).await;

    info!("Exporting phylogeny & tree...");
    export_phylogeny(layout).await;
    export_tree(layout).await;

    convert_tables(layout);
    pad_otu(layout);

    info!("Export finished.");
    Ok(())
}

async fn export_otu(layout: &RunLayout) {
    let exports = layout.exports_dir();
    run_tool(
        QIIME_TAG,
        &qiime::export_args(
            &layout.qza_dir().join("feature-frequency-filtered-table.qza"),
            &exports,
        ),
        None,
    )
    .await;
    run_tool(
        BIOM_TAG,
        &biom::convert_to_tsv_args(&exports.join("feature-table.biom"), &exports.join("otu.tsv")),
        None,
    )
    .await;
}

async fn export_taxonomy(layout: &RunLayout, classified: &str) {
    // the exporter treats the output path as a directory; the table
    // lands at exports/tax.tsv/taxonomy.tsv
    run_tool(
        QIIME_TAG,
        &qiime::export_args(
            &layout.qza_dir().join(classified),
            &layout.exports_dir().join("tax.tsv"),
        ),
        None,
    )
    .await;
}

async fn export_phylogeny(layout: &RunLayout) {
    let qza_dir = layout.qza_dir();
    let exports = layout.exports_dir();

    let aligned = qza_dir.join("aligned-rep-seqs.qza");
    run_tool(
        QIIME_TAG,
        &qiime::mafft_args(&qza_dir.join("rep-seqs-dn-99.qza"), &aligned),
        None,
    )
    .await;

    let tree = exports.join("fasttree-tree.qza");
    run_tool(QIIME_TAG, &qiime::fasttree_args(&aligned, &tree), None).await;

    run_tool(
        QIIME_TAG,
        &qiime::midpoint_root_args(&tree, &exports.join("fasttree-tree-rooted.qza")),
        None,
    )
    .await;
}

async fn export_tree(layout: &RunLayout) {
    // unpacks the rooted artifact; the tree itself lands at exports/tree.nwk
    let exports = layout.exports_dir();
    run_tool(
        QIIME_TAG,
        &qiime::export_args(&exports.join("fasttree-tree-rooted.qza"), &exports),
        None,
    )
    .await;
}

fn convert_tables(layout: &RunLayout) {
    let exports = layout.exports_dir();
    if let Err(e) = otu_to_csv(&exports.join("otu.tsv"), &exports.join("otu.csv")) {
        warn!("Could not convert OTU table to CSV: {}", e);
    }
    let tax_dir = exports.join("tax.tsv");
    if let Err(e) = tax_to_csv(&tax_dir.join("taxonomy.tsv"), &tax_dir.join("taxonomy.csv")) {
        warn!("Could not convert taxonomy table to CSV: {}", e);
    }
}

fn pad_otu(layout: &RunLayout) {
    let exports = layout.exports_dir();
    if let Err(e) = pad_otu_with_tree_leaves(
        &exports.join("otu.csv"),
        &exports.join("tree.nwk"),
        &exports.join("otu_padding.csv"),
    ) {
        warn!("Could not pad OTU table from tree: {}", e);
    }
}
