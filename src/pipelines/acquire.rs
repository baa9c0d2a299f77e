/// Read acquisition: archive download and FASTQ conversion.

use std::env;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::defs::{PipelineError, RunConfig, RunLayout, FASTERQ_DUMP_TAG, PREFETCH_TAG};
use crate::utils::command::{run_tool, sra, StageResult};
use crate::utils::file::{dir_is_empty, ensure_dir};
use crate::utils::samples::{discover_samples, ReadSet};

/// Fetches every accession in the list into `sra/`, then pulls in any
/// `.sra` files the SRA toolkit parked under its repository root instead
/// of the requested output directory.
pub async fn download_accessions(config: &RunConfig, layout: &RunLayout) -> StageResult {
    let acc_list = match &config.args.acc_list {
        Some(list) => PathBuf::from(list),
        None => return StageResult::skipped(PREFETCH_TAG, "no accession list given"),
    };

    let sra_dir = layout.sra_dir();
    let result = run_tool(PREFETCH_TAG, &sra::prefetch_args(&acc_list, &sra_dir), None).await;
    relocate_repository_sra(&sra_dir);
    result
}

fn repository_root() -> PathBuf {
    env::var_os("NCBI_VDB_REPOSITORY_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            crate::utils::file::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ncbi")
        })
}

fn relocate_repository_sra(sra_dir: &Path) {
    let src_dir = repository_root().join("public").join("sra");
    if !src_dir.exists() {
        return;
    }
    let entries = match std::fs::read_dir(&src_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("sra") {
            continue;
        }
        let dest = sra_dir.join(entry.file_name());
        match std::fs::rename(&path, &dest) {
            Ok(()) => info!("Moved {:?} -> {:?}", path, dest),
            Err(e) => warn!("Could not move {:?} into {:?}: {}", path, sra_dir, e),
        }
    }
}

/// Converts every downloaded `.sra` into split FASTQ files, then decides
/// from the produced files whether the run is paired-end.
///
/// A missing `sra/` directory is fine when FASTQ files already exist
/// (the continue entry points); both missing is reported and the run
/// proceeds as an empty single-end set.
pub async fn sra_to_fastq(
    config: &RunConfig,
    layout: &RunLayout,
    as_single: bool,
) -> Result<ReadSet, PipelineError> {
    let sra_root = layout.sra_dir();
    let fastq_dir = layout.fastq_dir();

    if !sra_root.exists() {
        if dir_is_empty(&fastq_dir) {
            warn!("SRA directory missing and no FASTQ files found.");
        }
        return derive_read_set(layout, as_single);
    }

    ensure_dir(&fastq_dir)?;
    info!("Converting files from .sra to .fastq.");

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&sra_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    for item in entries {
        // prefetch nests each accession in its own directory
        let target = if item.is_dir() {
            match first_file_in(&item) {
                Some(file) => file,
                None => continue,
            }
        } else {
            item
        };
        run_tool(
            FASTERQ_DUMP_TAG,
            &sra::fasterq_dump_args(&target, &fastq_dir),
            None,
        )
        .await;
    }

    derive_read_set(layout, as_single)
}

fn first_file_in(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files.into_iter().next()
}

fn derive_read_set(layout: &RunLayout, as_single: bool) -> Result<ReadSet, PipelineError> {
    let fastq_dir = layout.fastq_dir();
    if !fastq_dir.exists() {
        return Ok(ReadSet::single(layout.base_dir.clone()));
    }

    let discovery = discover_samples(&fastq_dir)?;
    for (key, files) in &discovery.inconsistent {
        warn!(
            "Sample {} groups {} files; expected one or a forward/reverse pair.",
            key,
            files.len()
        );
    }

    if discovery.is_empty() || !discovery.any_paired() {
        return Ok(ReadSet::single(layout.base_dir.clone()));
    }

    if as_single {
        for sample in discovery.samples.values() {
            if let Some(rev) = &sample.reverse {
                if let Err(e) = std::fs::remove_file(rev) {
                    warn!("Could not delete reverse read {:?}: {}", rev, e);
                }
            }
        }
        info!("Single reads requested - reverse reads deleted.");
        return Ok(ReadSet::single(layout.base_dir.clone()));
    }

    Ok(ReadSet::paired(layout.base_dir.clone()))
}
