/// Host-read removal: kneaddata over every sample, then a swap of the
/// cleaned reads into the active fastq directory.

use std::env;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;

use crate::config::defs::{
    is_fastq, PipelineError, RunConfig, RunLayout, HOST_DB_CONFIG_DIR, HOST_DB_CONFIG_FILE,
    HOST_DB_ENV, KNEADDATA_TAG,
};
use crate::utils::command::{kneaddata, run_tool};
use crate::utils::file::{dir_is_empty, ensure_dir, home_dir};
use crate::utils::samples::discover_samples;

lazy_static! {
    // kneaddata names every product after the input plus a _kneaddata infix
    static ref KNEADDATA_OUTPUT_RE: Regex =
        Regex::new(r"_kneaddata.*\.(fastq|fq)(\.gz)?$").unwrap();
    static ref BOWTIE2_INDEX_RE: Regex = Regex::new(r"\.bt2l?($|\.)").unwrap();
}

fn load_db_from_config() -> Option<String> {
    let path = home_dir()?.join(HOST_DB_CONFIG_DIR).join(HOST_DB_CONFIG_FILE);
    let contents = std::fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
    value.get("clean_db")?.as_str().map(|s| s.to_string())
}

/// Host DB resolution order: CLI flag, environment, user config file.
/// No stage can run without it, so an unresolvable DB is fatal.
pub fn resolve_host_db(config: &RunConfig) -> Result<PathBuf, PipelineError> {
    let candidate = config
        .args
        .host_db
        .clone()
        .or_else(|| env::var(HOST_DB_ENV).ok())
        .or_else(load_db_from_config);

    match candidate {
        Some(db) => Ok(PathBuf::from(db)),
        None => Err(PipelineError::InvalidConfig(format!(
            "Host DB path is not set. Pass --host-db, set {}, or create ~/{}/{} with {{\"clean_db\": \"/path/to/kneaddata_database/output\"}}.",
            HOST_DB_ENV, HOST_DB_CONFIG_DIR, HOST_DB_CONFIG_FILE
        ))),
    }
}

fn validate_host_db(db_dir: &Path) -> Result<(), PipelineError> {
    if !db_dir.is_dir() {
        return Err(PipelineError::InvalidConfig(format!(
            "Host DB directory not found: {:?}. Expected a directory created by 'kneaddata_database --download human_genome bowtie2 <ROOT>'.",
            db_dir
        )));
    }
    let has_index = std::fs::read_dir(db_dir)?
        .filter_map(|e| e.ok())
        .any(|e| BOWTIE2_INDEX_RE.is_match(&e.file_name().to_string_lossy()));
    if !has_index {
        return Err(PipelineError::InvalidConfig(format!(
            "No Bowtie2 index files (*.bt2/*.bt2l) under: {:?}",
            db_dir
        )));
    }
    Ok(())
}

/// Runs kneaddata per sample into `knead_out/<sample>/`, copying the
/// cleaned FASTQ products into `fastq_clean/`. Returns the cleaned paths.
pub async fn run_dehost(config: &RunConfig, layout: &RunLayout) -> Result<Vec<PathBuf>, PipelineError> {
    let fastq_dir = layout.fastq_dir();
    let out_root = layout.knead_out_dir();
    let clean_dir = layout.fastq_clean_dir();

    if !fastq_dir.exists() {
        warn!("FASTQ folder not found: {:?}; nothing to clean.", fastq_dir);
        return Ok(Vec::new());
    }
    ensure_dir(&out_root)?;
    ensure_dir(&clean_dir)?;

    let db_dir = resolve_host_db(config)?;
    validate_host_db(&db_dir)?;

    let discovery = discover_samples(&fastq_dir)?;
    for (key, files) in &discovery.inconsistent {
        warn!("Sample {} groups {} files; skipping it.", key, files.len());
    }

    let mut cleaned = Vec::new();
    for (key, sample) in &discovery.samples {
        let forward = match sample.primary() {
            Some(f) => f,
            None => continue,
        };
        let out_dir = out_root.join(key);
        ensure_dir(&out_dir)?;

        let options = kneaddata::arg_generator(
            &config.args,
            &db_dir,
            &out_dir,
            forward,
            sample.reverse.as_deref().filter(|_| sample.is_paired()),
            config.threads,
        );
        let log_file = out_dir.join("kneaddata.log");
        info!("Running kneaddata for sample {}", key);
        run_tool(KNEADDATA_TAG, &options, Some(&log_file)).await;

        for entry in std::fs::read_dir(&out_dir)?.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !KNEADDATA_OUTPUT_RE.is_match(&name) {
                continue;
            }
            let dest = clean_dir.join(&name);
            if dest.exists() {
                std::fs::remove_file(&dest)?;
            }
            std::fs::copy(entry.path(), &dest)?;
            cleaned.push(dest);
        }
    }

    cleaned.sort();
    Ok(cleaned)
}

/// Full cleaning pass: dehost, back up (or drop) the raw reads, then
/// swap the cleaned paired files into `fastq/` under their canonical
/// `<sample>_1.fastq` / `<sample>_2.fastq` names.
pub async fn run_cleaning(
    config: &RunConfig,
    layout: &RunLayout,
    backup: bool,
) -> Result<(), PipelineError> {
    run_dehost(config, layout).await?;

    let fastq_dir = layout.fastq_dir();
    let clean_dir = layout.fastq_clean_dir();
    let raw_dir = layout.fastq_raw_dir();

    if dir_is_empty(&clean_dir) {
        warn!("Cleaning pipeline produced no output. Using raw reads.");
        return Ok(());
    }
    if !fastq_dir.exists() {
        warn!("FASTQ folder not found: {:?}; leaving cleaned reads in place.", fastq_dir);
        return Ok(());
    }

    if backup {
        ensure_dir(&raw_dir)?;
        for entry in std::fs::read_dir(&fastq_dir)?.filter_map(|e| e.ok()) {
            if entry.path().is_file() {
                std::fs::rename(entry.path(), raw_dir.join(entry.file_name()))?;
            }
        }
    } else {
        for entry in std::fs::read_dir(&fastq_dir)?.filter_map(|e| e.ok()) {
            if entry.path().is_file() {
                std::fs::remove_file(entry.path())?;
            }
        }
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&clean_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    entries.sort();

    let mut swapped = 0usize;
    for path in entries {
        if !is_fastq(&path) {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };

        if name.contains("paired_1") {
            let clean_name = format!("{}_1.fastq", kneaddata_base(&name));
            std::fs::copy(&path, fastq_dir.join(clean_name))?;
            swapped += 1;
        } else if name.contains("paired_2") {
            let clean_name = format!("{}_2.fastq", kneaddata_base(&name));
            std::fs::copy(&path, fastq_dir.join(clean_name))?;
            swapped += 1;
        } else if name.contains("_1.fastq") && !name.contains("paired") {
            std::fs::copy(&path, fastq_dir.join(&name))?;
            swapped += 1;
        }
    }

    info!("Swapped {} cleaned paired files into active fastq folder.", swapped);
    Ok(())
}

fn kneaddata_base(name: &str) -> &str {
    name.split("_kneaddata").next().unwrap_or(name)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kneaddata_output_matching() {
        assert!(KNEADDATA_OUTPUT_RE.is_match("SRR1_kneaddata_paired_1.fastq"));
        assert!(KNEADDATA_OUTPUT_RE.is_match("SRR1_kneaddata.fastq.gz"));
        assert!(!KNEADDATA_OUTPUT_RE.is_match("SRR1_1.fastq"));
        assert!(!KNEADDATA_OUTPUT_RE.is_match("SRR1_kneaddata.log"));
    }

    #[test]
    fn test_kneaddata_base() {
        assert_eq!(kneaddata_base("SRR1_1_kneaddata_paired_1.fastq"), "SRR1_1");
        assert_eq!(kneaddata_base("plain.fastq"), "plain.fastq");
    }

    #[test]
    fn test_bowtie2_index_matching() {
        assert!(BOWTIE2_INDEX_RE.is_match("hg37.1.bt2"));
        assert!(BOWTIE2_INDEX_RE.is_match("hg38.rev.2.bt2l"));
        assert!(!BOWTIE2_INDEX_RE.is_match("hg38.fasta"));
    }
}
