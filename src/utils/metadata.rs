use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::DataType;
use crate::config::defs::METADATA_FILE;
use crate::utils::file::atomic_write;
use crate::utils::samples::ReadSet;

fn default_fwd() -> bool {
    true
}

/// The run's persisted record: enough for the continue entry points to
/// pick up where a run left off without re-deriving anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub dir_path: PathBuf,
    pub dataset_id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub data_type: Option<DataType>,
    #[serde(default = "default_fwd")]
    pub read_data_fwd: bool,
    #[serde(default)]
    pub read_data_rev: bool,
}

impl RunMetadata {
    pub fn new(dir_path: PathBuf, dataset_id: impl Into<String>) -> Self {
        RunMetadata {
            dir_path,
            dataset_id: dataset_id.into(),
            data_type: None,
            read_data_fwd: true,
            read_data_rev: false,
        }
    }

    pub fn with_reads(mut self, data_type: DataType, read_set: &ReadSet) -> Self {
        self.data_type = Some(data_type);
        self.read_data_fwd = read_set.fwd;
        self.read_data_rev = read_set.rev;
        self
    }

    pub fn read_set(&self) -> ReadSet {
        ReadSet {
            dir_path: self.dir_path.clone(),
            fwd: self.read_data_fwd,
            rev: self.read_data_rev,
        }
    }

    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(&path, &json).with_context(|| format!("Cannot write {:?}", path))?;
        Ok(())
    }

    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(METADATA_FILE);
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {:?}", path))?;
        let metadata = serde_json::from_str(&contents)
            .with_context(|| format!("Cannot parse {:?}", path))?;
        Ok(metadata)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let read_set = ReadSet::paired(dir.path().to_path_buf());
        let meta = RunMetadata::new(dir.path().to_path_buf(), "PRJ42")
            .with_reads(DataType::Shotgun, &read_set);
        meta.save(dir.path())?;

        let loaded = RunMetadata::load(dir.path())?;
        assert_eq!(loaded, meta);
        assert!(loaded.read_set().is_paired());
        Ok(())
    }

    #[test]
    fn test_metadata_defaults_on_sparse_record() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(METADATA_FILE);
        std::fs::write(&path, r#"{"dir_path": "/x", "dataset_id": "D"}"#)?;
        let meta = RunMetadata::load(dir.path())?;
        assert!(meta.read_data_fwd);
        assert!(!meta.read_data_rev);
        assert!(meta.data_type.is_none());
        Ok(())
    }
}
