/// Shotgun branch: per-sample taxonomic profiling, profile merge, tabular
/// export, and optional functional pathway inference.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::config::defs::{
    PipelineError, RunConfig, RunLayout, HUMANN_TAG, MERGE_TABLES_TAG, METAPHLAN_TAG,
};
use crate::utils::command::{check_versions, humann, metaphlan, run_tool, shotgun_tools};
use crate::utils::file::{ensure_dir, extension_remover};
use crate::utils::samples::{discover_samples, ReadSet};
use crate::utils::table::profile_to_csv;

pub async fn run(
    config: Arc<RunConfig>,
    layout: &RunLayout,
    read_set: &ReadSet,
) -> Result<(), PipelineError> {
    println!("\n-------------\n Shotgun\n-------------\n");

    check_versions(&shotgun_tools(config.args.pathways)).await?;

    metaphlan_extraction(&config, layout, read_set).await?;

    let merged = merge_profiles(layout).await?;
    match merged {
        Some(final_path) => {
            let csv_path = layout
                .export_dir()
                .join(format!("{}_final_table.csv", layout.dataset_id));
            if let Err(e) = profile_to_csv(&final_path, &csv_path) {
                warn!("Could not convert merged profile to CSV: {}", e);
            }
        }
        None => warn!("No merged profile produced; skipping tabular export."),
    }

    if config.args.pathways {
        run_pathways(&config, layout).await?;
    }

    info!("Shotgun analysis finished.");
    Ok(())
}

/// Profiles every sample with metaphlan. In paired mode a sample missing
/// its mate is skipped with a warning; nothing here aborts the run.
async fn metaphlan_extraction(
    config: &RunConfig,
    layout: &RunLayout,
    read_set: &ReadSet,
) -> Result<(), PipelineError> {
    let fastq_dir = layout.fastq_dir();
    if !fastq_dir.exists() {
        warn!("Reads directory {:?} does not exist; skipping profiling.", fastq_dir);
        return Ok(());
    }
    ensure_dir(&layout.qza_dir())?;
    ensure_dir(&layout.export_dir())?;

    let discovery = discover_samples(&fastq_dir)?;
    for (key, files) in &discovery.inconsistent {
        warn!("Sample {} groups {} files; skipping it.", key, files.len());
    }
    if discovery.is_empty() {
        warn!("No read files under {:?}; nothing to profile.", fastq_dir);
        return Ok(());
    }
    info!("Profiling {} samples.", discovery.samples.len());

    for (key, sample) in &discovery.samples {
        let (forward, reverse) = if read_set.is_paired() {
            let forward = match &sample.forward {
                Some(f) => f,
                None => {
                    warn!("Sample {} has no forward read file; skipping.", key);
                    continue;
                }
            };
            match &sample.reverse {
                Some(r) => (forward, Some(r.as_path())),
                None => {
                    warn!("Sample {} is missing its reverse mate; skipping.", key);
                    continue;
                }
            }
        } else {
            match sample.primary() {
                Some(f) => (f, None),
                None => continue,
            }
        };

        let bowtie2_out = fastq_dir.join(format!("{}.bowtie2.bz2", key));
        let profile_out = layout.qza_dir().join(format!("{}_profile.txt", key));
        let options = metaphlan::arg_generator(
            forward,
            reverse,
            &bowtie2_out,
            &profile_out,
            config.threads,
        );
        info!("Profiling sample {}", key);
        run_tool(METAPHLAN_TAG, &options, None).await;
    }

    Ok(())
}

fn collect_profiles(qza_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut profiles: Vec<PathBuf> = std::fs::read_dir(qza_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with("_profile.txt"))
                .unwrap_or(false)
        })
        .collect();
    profiles.sort();
    Ok(profiles)
}

/// Merges all per-sample profiles into `export/<dataset>_final.txt`.
/// Returns None when there is nothing to merge or the merge tool left no
/// output behind.
async fn merge_profiles(layout: &RunLayout) -> Result<Option<PathBuf>, PipelineError> {
    let profiles = collect_profiles(&layout.qza_dir())?;
    if profiles.is_empty() {
        warn!("No taxonomic profiles under {:?}; skipping merge.", layout.qza_dir());
        return Ok(None);
    }

    ensure_dir(&layout.export_dir())?;
    let final_path = layout
        .export_dir()
        .join(format!("{}_final.txt", layout.dataset_id));
    run_tool(
        MERGE_TABLES_TAG,
        &metaphlan::merge_args(&profiles, &final_path),
        None,
    )
    .await;

    if final_path.exists() {
        Ok(Some(final_path))
    } else {
        warn!("Profile merge left no output at {:?}.", final_path);
        Ok(None)
    }
}

/// Locates the taxonomic profile for a sample, trying a short ordered
/// list of naming patterns; the first existing candidate wins.
pub fn find_profile(qza_dir: &Path, key: &str, first_file: Option<&Path>) -> Option<PathBuf> {
    let mut candidates = vec![
        qza_dir.join(format!("{}_profile.txt", key)),
        qza_dir.join(format!("{}_1_profile.txt", key)),
    ];
    if let Some(file) = first_file {
        let (stem, _) = extension_remover(file);
        if let Some(stem_name) = stem.file_name().and_then(|s| s.to_str()) {
            candidates.push(qza_dir.join(format!("{}_profile.txt", stem_name)));
        }
    }
    candidates.into_iter().find(|c| c.exists())
}

fn concat_files(inputs: &[&Path], output: &Path) -> io::Result<()> {
    let mut out = std::fs::File::create(output)?;
    for input in inputs {
        let mut file = std::fs::File::open(input)?;
        io::copy(&mut file, &mut out)?;
    }
    Ok(())
}

/// Functional pathway inference per sample. Needs the sample's taxonomic
/// profile as a second input; samples without one are skipped. Paired
/// reads are concatenated into one temporary input, removed afterward.
pub async fn run_pathways(config: &RunConfig, layout: &RunLayout) -> Result<(), PipelineError> {
    let fastq_dir = layout.fastq_dir();
    let qza_dir = layout.qza_dir();
    let humann_dir = layout.humann_dir();
    ensure_dir(&humann_dir)?;

    info!("Starting pathway inference for dataset: {}", layout.dataset_id);

    if !fastq_dir.exists() {
        warn!("Reads directory {:?} does not exist; skipping pathway inference.", fastq_dir);
        return Ok(());
    }
    let discovery = discover_samples(&fastq_dir)?;
    info!("Found {} samples to process.", discovery.samples.len());

    for (key, sample) in &discovery.samples {
        info!("Processing sample: {}", key);

        let profile = match find_profile(&qza_dir, key, sample.primary().map(|p| p.as_path())) {
            Some(p) => p,
            None => {
                warn!("No taxonomic profile found for {}; skipping.", key);
                continue;
            }
        };

        let forward = match sample.primary() {
            Some(f) => f,
            None => continue,
        };

        let mut temp_cat: Option<PathBuf> = None;
        let input = if let (Some(fwd), Some(rev)) = (&sample.forward, &sample.reverse) {
            let merged = humann_dir.join(format!("{}_merged.fastq", key));
            info!("Merging paired reads to {:?}", merged);
            if let Err(e) = concat_files(&[fwd.as_path(), rev.as_path()], &merged) {
                warn!("Could not merge paired reads for {}: {}; skipping.", key, e);
                continue;
            }
            temp_cat = Some(merged.clone());
            merged
        } else {
            forward.clone()
        };

        let (input_stem, _) = extension_remover(&input);
        let log_name = input_stem
            .file_name()
            .map(|s| format!("{}_humann.log", s.to_string_lossy()))
            .unwrap_or_else(|| "humann.log".to_string());
        let log_file = humann_dir.join(log_name);

        let options = humann::arg_generator(&input, &humann_dir, &profile, config.threads);
        run_tool(HUMANN_TAG, &options, Some(&log_file)).await;

        if let Some(temp) = temp_cat {
            if let Err(e) = std::fs::remove_file(&temp) {
                warn!("Could not remove temporary file {:?}: {}", temp, e);
            }
        }
    }

    Ok(())
}
