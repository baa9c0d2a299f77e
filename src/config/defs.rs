use std::path::{Path, PathBuf};
use std::io;
use crate::cli::Arguments;
use lazy_static::lazy_static;
use std::collections::HashMap;
use thiserror::Error;

// External software
pub const PREFETCH_TAG: &str = "prefetch";
pub const FASTERQ_DUMP_TAG: &str = "fasterq-dump";
pub const QIIME_TAG: &str = "qiime";
pub const BIOM_TAG: &str = "biom";
pub const METAPHLAN_TAG: &str = "metaphlan";
pub const MERGE_TABLES_TAG: &str = "merge_metaphlan_tables.py";
pub const HUMANN_TAG: &str = "humann";
pub const KNEADDATA_TAG: &str = "kneaddata";


lazy_static! {
    pub static ref TOOL_VERSIONS: HashMap<&'static str, f32> = {
        let mut m = HashMap::new();
        m.insert(PREFETCH_TAG, 3.0);
        m.insert(FASTERQ_DUMP_TAG, 3.0);
        m.insert(QIIME_TAG, 2023.2);
        m.insert(METAPHLAN_TAG, 4.0);
        m.insert(HUMANN_TAG, 3.6);
        m.insert(KNEADDATA_TAG, 0.12);

        m
    };
}

// Run directory layout
pub const SRA_DIR: &str = "sra";
pub const FASTQ_DIR: &str = "fastq";
pub const QZA_DIR: &str = "qza";
pub const VIS_DIR: &str = "vis";
pub const HUMANN_DIR: &str = "humann_results";
pub const EXPORT_DIR: &str = "export";
pub const EXPORTS_DIR: &str = "exports";
pub const FASTQ_CLEAN_DIR: &str = "fastq_clean";
pub const FASTQ_RAW_DIR: &str = "fastq_raw";
pub const KNEAD_OUT_DIR: &str = "knead_out";

// Static Filenames
pub const MANIFEST_FILE: &str = "manifest.tsv";
pub const METADATA_FILE: &str = "metadata.json";


// Static Parameters

pub const PREFETCH_MAX_SIZE: &str = "100G";

// MetaPhlAn index compatible with the HUMAnN 3.x ChocoPhlAn database
pub const METAPHLAN_INDEX: &str = "mpa_vJun23_CHOCOPhlAnSGB_202307";

pub const CLUSTER_IDENTITY: &str = "0.99";
pub const FILTER_MIN_SAMPLES: &str = "3";
pub const FILTER_MIN_FREQUENCY: &str = "10";
pub const TAXA_EXCLUDE: &str = "mitochondria,chloroplast";

pub const FASTQ_TAG: &str = "fastq";
pub const FASTQ_EXTS: &[&'static str] = &["fastq", "fq"];
pub const GZIP_EXT: &str = "gz";

// Host DB resolution
pub const HOST_DB_ENV: &str = "MBP_HOST_DB";
pub const HOST_DB_CONFIG_DIR: &str = ".microbiome-pipelines";
pub const HOST_DB_CONFIG_FILE: &str = "config.json";


#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Tool {tool} failed: {error}")]
    ToolExecution { tool: String, error: String },

    #[error("I/O error: {0}")]
    IOError(#[from] io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}


pub struct RunConfig {
    pub cwd: PathBuf,
    pub args: Arguments,
    pub threads: usize,
}


/// Paths of one run directory. Every stage reads the subdirectories it
/// needs off this; stage code creates them on demand via `scaffold`.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub base_dir: PathBuf,
    pub dataset_id: String,
}

impl RunLayout {
    pub fn new(base_dir: PathBuf, dataset_id: impl Into<String>) -> Self {
        RunLayout {
            base_dir,
            dataset_id: dataset_id.into(),
        }
    }

    pub fn sra_dir(&self) -> PathBuf {
        self.base_dir.join(SRA_DIR)
    }

    pub fn fastq_dir(&self) -> PathBuf {
        self.base_dir.join(FASTQ_DIR)
    }

    pub fn qza_dir(&self) -> PathBuf {
        self.base_dir.join(QZA_DIR)
    }

    pub fn vis_dir(&self) -> PathBuf {
        self.base_dir.join(VIS_DIR)
    }

    pub fn humann_dir(&self) -> PathBuf {
        self.base_dir.join(HUMANN_DIR)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.base_dir.join(EXPORT_DIR)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.base_dir.join(EXPORTS_DIR)
    }

    pub fn fastq_clean_dir(&self) -> PathBuf {
        self.base_dir.join(FASTQ_CLEAN_DIR)
    }

    pub fn fastq_raw_dir(&self) -> PathBuf {
        self.base_dir.join(FASTQ_RAW_DIR)
    }

    pub fn knead_out_dir(&self) -> PathBuf {
        self.base_dir.join(KNEAD_OUT_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir.join(MANIFEST_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.base_dir.join(METADATA_FILE)
    }

    /// Creates the base directory and the fixed subdirectories every run uses.
    pub fn scaffold(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        for sub in [SRA_DIR, FASTQ_DIR, QZA_DIR, VIS_DIR, HUMANN_DIR, EXPORT_DIR] {
            std::fs::create_dir_all(self.base_dir.join(sub))?;
        }
        Ok(())
    }

    /// The `exports/` subdirectory is only needed by the amplicon export phase.
    pub fn scaffold_exports(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.exports_dir())
    }
}

/// Returns true when `path` carries a recognized read-file extension,
/// gzipped or not.
pub fn is_fastq(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n.to_ascii_lowercase(),
        None => return false,
    };
    let stem = name
        .strip_suffix(&format!(".{}", GZIP_EXT))
        .unwrap_or(&name);
    FASTQ_EXTS.iter().any(|ext| stem.ends_with(&format!(".{}", ext)))
}
