use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::config::defs::RunLayout;
use crate::utils::file::atomic_write;
use crate::utils::samples::{discover_samples, ReadSet};

pub const SINGLE_HEADER: &str = "SampleID\tabsolute-filepath";
pub const PAIRED_HEADER: &str = "SampleID\tforward-absolute-filepath\treverse-absolute-filepath";

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRow {
    pub sample_id: String,
    pub forward: PathBuf,
    pub reverse: Option<PathBuf>,
}

fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Writes the import manifest for the run: one row per discovered sample,
/// with absolute file paths. The header names the layout expected by the
/// downstream importer, keyed to single- vs paired-end reads.
///
/// Samples whose files are missing their mate (in paired mode) are left
/// out, mirroring a best-effort import of whatever is actually on disk.
pub fn write_manifest(layout: &RunLayout, read_set: &ReadSet) -> Result<PathBuf> {
    let fastq_dir = layout.fastq_dir();
    let manifest_path = layout.manifest_path();

    let discovery = discover_samples(&fastq_dir)
        .with_context(|| format!("Cannot list reads directory {:?}", fastq_dir))?;
    for (key, files) in &discovery.inconsistent {
        warn!(
            "Sample {} groups {} files; expected one or a forward/reverse pair. Skipping it.",
            key,
            files.len()
        );
    }

    let mut lines = Vec::new();
    let mut rows = 0usize;
    if read_set.is_paired() {
        lines.push(PAIRED_HEADER.to_string());
        for (key, sample) in &discovery.samples {
            if let (Some(fwd), Some(rev)) = (&sample.forward, &sample.reverse) {
                lines.push(format!(
                    "{}\t{}\t{}",
                    key,
                    absolute(fwd).display(),
                    absolute(rev).display()
                ));
                rows += 1;
            }
        }
    } else {
        lines.push(SINGLE_HEADER.to_string());
        for (key, sample) in &discovery.samples {
            if let Some(path) = sample.primary() {
                lines.push(format!("{}\t{}", key, absolute(path).display()));
                rows += 1;
            }
        }
    }

    atomic_write(&manifest_path, &(lines.join("\n") + "\n"))?;
    info!("Wrote manifest with {} samples to {:?}", rows, manifest_path);
    Ok(manifest_path)
}

/// Reads a manifest back into rows. The header decides whether reverse
/// paths are expected.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRow>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read manifest {:?}", path))?;
    let mut lines = contents.lines();

    let header = lines.next().ok_or_else(|| anyhow!("Manifest {:?} is empty", path))?;
    let paired = match header {
        PAIRED_HEADER => true,
        SINGLE_HEADER => false,
        other => return Err(anyhow!("Unrecognized manifest header: {}", other)),
    };

    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let expected = if paired { 3 } else { 2 };
        if fields.len() != expected {
            return Err(anyhow!(
                "Manifest row {} has {} fields, expected {}",
                idx + 2,
                fields.len(),
                expected
            ));
        }
        rows.push(ManifestRow {
            sample_id: fields[0].to_string(),
            forward: PathBuf::from(fields[1]),
            reverse: if paired { Some(PathBuf::from(fields[2])) } else { None },
        });
    }
    Ok(rows)
}
