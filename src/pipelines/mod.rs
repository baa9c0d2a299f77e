pub mod acquire;
pub mod amplicon;
pub mod dehost;
pub mod shotgun;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};

use crate::config::defs::{PipelineError, RunConfig, RunLayout};
use crate::utils::command::{acquisition_tools, check_versions};
use crate::utils::file::absolutize;
use crate::utils::metadata::RunMetadata;
use crate::utils::samples::ReadSet;

fn require_dataset_id(config: &RunConfig, fallback: Option<String>) -> Result<String, PipelineError> {
    config
        .args
        .dataset_id
        .clone()
        .or(fallback)
        .ok_or_else(|| PipelineError::InvalidConfig("--dataset-id is required".to_string()))
}

fn require_continue_path(config: &RunConfig) -> Result<PathBuf, PipelineError> {
    let path = config
        .args
        .continue_path
        .as_ref()
        .ok_or_else(|| PipelineError::InvalidConfig("--continue-path is required".to_string()))?;
    let path = absolutize(Path::new(path), &config.cwd);
    if !path.is_dir() {
        return Err(PipelineError::InvalidConfig(format!(
            "Run directory not found: {:?}",
            path
        )));
    }
    Ok(path)
}

fn check_acc_list(config: &RunConfig) -> Result<PathBuf, PipelineError> {
    let acc_list = config
        .args
        .acc_list
        .as_ref()
        .ok_or_else(|| PipelineError::InvalidConfig("--acc-list is required".to_string()))?;
    let path = absolutize(Path::new(acc_list), &config.cwd);
    if !path.is_file() {
        return Err(PipelineError::InvalidConfig(format!(
            "Accession list is not a file: {:?}",
            path
        )));
    }
    info!("Input path: {:?} ... Valid.", path);
    Ok(path)
}

async fn run_branch(
    config: Arc<RunConfig>,
    layout: &RunLayout,
    read_set: &ReadSet,
) -> Result<(), PipelineError> {
    if config.args.data_type.is_amplicon() {
        amplicon::run(layout, read_set).await
    } else {
        shotgun::run(config, layout, read_set).await
    }
}

/// Full run from an accession list: fetch, convert, optionally clean,
/// then hand off to the branch for the chosen data type.
pub async fn download(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let args = &config.args;
    check_acc_list(&config)?;
    let dataset_id = require_dataset_id(&config, None)?;

    check_versions(&acquisition_tools()).await?;

    let dir_name = format!(
        "{}-{}",
        dataset_id,
        chrono::Local::now().format("%d-%m-%Y_%H-%M-%S")
    );
    let parent = match &args.location {
        Some(location) => absolutize(Path::new(location), &config.cwd),
        None => config.cwd.clone(),
    };
    let layout = RunLayout::new(parent.join(dir_name), dataset_id);

    info!("Creating run directory {:?}", layout.base_dir);
    layout.scaffold()?;

    let metadata = RunMetadata::new(layout.base_dir.clone(), layout.dataset_id.as_str());
    metadata.save(&layout.base_dir)?;

    info!("Starting prefetch...");
    acquire::download_accessions(&config, &layout).await;

    info!("Starting conversion...");
    let read_set = acquire::sra_to_fastq(&config, &layout, args.as_single).await?;

    if args.clean {
        info!("Running host-read removal...");
        dehost::run_cleaning(&config, &layout, true).await?;
    }

    metadata
        .with_reads(args.data_type, &read_set)
        .save(&layout.base_dir)?;

    run_branch(config.clone(), &layout, &read_set).await
}

/// Picks an interrupted run back up from its metadata record.
pub async fn continue_run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let base_dir = require_continue_path(&config)?;

    if config.args.clean {
        let layout = RunLayout::new(base_dir.clone(), String::new());
        dehost::run_cleaning(&config, &layout, true).await?;
    }

    let (read_set, recorded_id) = match RunMetadata::load(&base_dir) {
        Ok(metadata) => {
            let mut read_set = metadata.read_set();
            read_set.dir_path = base_dir.clone();
            (read_set, Some(metadata.dataset_id))
        }
        Err(e) => {
            warn!("Could not read run metadata ({}); assuming single-end reads.", e);
            (ReadSet::single(base_dir.clone()), None)
        }
    };

    let dataset_id = require_dataset_id(&config, recorded_id)?;
    let layout = RunLayout::new(base_dir, dataset_id);
    run_branch(config.clone(), &layout, &read_set).await
}

/// Like `continue_run`, but re-derives pairedness from the FASTQ files
/// on disk (and converts any leftover `.sra` files first).
pub async fn continue_fastq(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let base_dir = require_continue_path(&config)?;
    if !base_dir.join(crate::config::defs::FASTQ_DIR).exists() {
        warn!("Fastq directory not found in {:?}", base_dir);
    }

    let recorded_id = RunMetadata::load(&base_dir).ok().map(|m| m.dataset_id);
    let dataset_id = require_dataset_id(&config, recorded_id)?;
    let layout = RunLayout::new(base_dir, dataset_id);

    let read_set = acquire::sra_to_fastq(&config, &layout, false).await?;

    if config.args.clean {
        dehost::run_cleaning(&config, &layout, true).await?;
    }

    run_branch(config.clone(), &layout, &read_set).await
}

/// Amplicon export phase over an existing run directory.
pub async fn export(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let base_dir = require_continue_path(&config)?;
    let recorded_id = RunMetadata::load(&base_dir).ok().map(|m| m.dataset_id);
    let dataset_id = require_dataset_id(&config, recorded_id)?;
    let layout = RunLayout::new(base_dir, dataset_id);
    amplicon::export(config, &layout).await
}
