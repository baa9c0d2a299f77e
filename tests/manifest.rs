use anyhow::Result;
use std::fs::{self, File};

use microbiome_pipelines::cli::DataType;
use microbiome_pipelines::config::defs::RunLayout;
use microbiome_pipelines::utils::manifest::{read_manifest, write_manifest, PAIRED_HEADER, SINGLE_HEADER};
use microbiome_pipelines::utils::metadata::RunMetadata;
use microbiome_pipelines::utils::samples::ReadSet;

fn layout_with_fastqs(dir: &std::path::Path, names: &[&str]) -> Result<RunLayout> {
    let layout = RunLayout::new(dir.to_path_buf(), "DS1");
    layout.scaffold()?;
    for name in names {
        File::create(layout.fastq_dir().join(name))?;
    }
    Ok(layout)
}

#[test]
fn test_paired_manifest_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let layout = layout_with_fastqs(
        dir.path(),
        &["SRR1_1.fastq", "SRR1_2.fastq", "SRR2_1.fastq", "SRR2_2.fastq"],
    )?;

    let read_set = ReadSet::paired(dir.path().to_path_buf());
    let manifest_path = write_manifest(&layout, &read_set)?;

    let contents = fs::read_to_string(&manifest_path)?;
    assert!(contents.starts_with(PAIRED_HEADER));

    let rows = read_manifest(&manifest_path)?;
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert!(row.forward.is_absolute());
        let reverse = row.reverse.as_ref().expect("paired row must carry a reverse path");
        assert!(reverse.is_absolute());
    }
    assert_eq!(rows[0].sample_id, "SRR1");
    assert_eq!(rows[1].sample_id, "SRR2");
    Ok(())
}

#[test]
fn test_single_end_manifest() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let layout = layout_with_fastqs(dir.path(), &["SRR9.fastq"])?;

    let read_set = ReadSet::single(dir.path().to_path_buf());
    let manifest_path = write_manifest(&layout, &read_set)?;

    let contents = fs::read_to_string(&manifest_path)?;
    assert!(contents.starts_with(SINGLE_HEADER));

    let rows = read_manifest(&manifest_path)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sample_id, "SRR9");
    assert!(rows[0].reverse.is_none());
    Ok(())
}

#[test]
fn test_paired_manifest_skips_incomplete_pairs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let layout = layout_with_fastqs(dir.path(), &["SRR1_1.fastq", "SRR1_2.fastq", "SRR3_1.fastq"])?;

    let read_set = ReadSet::paired(dir.path().to_path_buf());
    let manifest_path = write_manifest(&layout, &read_set)?;

    let rows = read_manifest(&manifest_path)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sample_id, "SRR1");
    Ok(())
}

#[test]
fn test_metadata_survives_a_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let read_set = ReadSet::paired(dir.path().to_path_buf());
    RunMetadata::new(dir.path().to_path_buf(), "DS7")
        .with_reads(DataType::SixteenS, &read_set)
        .save(dir.path())?;

    let loaded = RunMetadata::load(dir.path())?;
    assert_eq!(loaded.dataset_id, "DS7");
    assert_eq!(loaded.data_type, Some(DataType::SixteenS));
    assert!(loaded.read_set().is_paired());
    Ok(())
}
