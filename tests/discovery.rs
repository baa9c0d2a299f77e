use anyhow::Result;
use std::fs::File;
use std::path::Path;

use microbiome_pipelines::utils::samples::{discover_samples, ReadSet};

fn touch(dir: &Path, name: &str) -> Result<()> {
    File::create(dir.join(name))?;
    Ok(())
}

#[test]
fn test_paired_sample_discovery() -> Result<()> {
    let dir = tempfile::tempdir()?;
    touch(dir.path(), "sampleA_1.fastq")?;
    touch(dir.path(), "sampleA_2.fastq")?;

    let discovery = discover_samples(dir.path())?;
    assert_eq!(discovery.samples.len(), 1);
    assert!(discovery.inconsistent.is_empty());

    let sample = &discovery.samples["sampleA"];
    assert!(sample.is_paired());
    assert!(sample.forward.as_ref().unwrap().ends_with("sampleA_1.fastq"));
    assert!(sample.reverse.as_ref().unwrap().ends_with("sampleA_2.fastq"));
    Ok(())
}

#[test]
fn test_single_end_discovery() -> Result<()> {
    let dir = tempfile::tempdir()?;
    touch(dir.path(), "sampleB.fastq")?;

    let discovery = discover_samples(dir.path())?;
    assert_eq!(discovery.samples.len(), 1);
    let sample = &discovery.samples["sampleB"];
    assert!(!sample.is_paired());
    assert!(sample.primary().unwrap().ends_with("sampleB.fastq"));
    Ok(())
}

#[test]
fn test_empty_directory_yields_empty_mapping() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let discovery = discover_samples(dir.path())?;
    assert!(discovery.is_empty());
    assert!(discovery.inconsistent.is_empty());
    Ok(())
}

#[test]
fn test_r1_r2_convention() -> Result<()> {
    let dir = tempfile::tempdir()?;
    touch(dir.path(), "lib1_R1.fq.gz")?;
    touch(dir.path(), "lib1_R2.fq.gz")?;

    let discovery = discover_samples(dir.path())?;
    assert_eq!(discovery.samples.len(), 1);
    assert!(discovery.samples["lib1"].is_paired());
    Ok(())
}

#[test]
fn test_non_read_files_are_ignored() -> Result<()> {
    let dir = tempfile::tempdir()?;
    touch(dir.path(), "sampleC_1.fastq")?;
    touch(dir.path(), "notes.txt")?;
    touch(dir.path(), "sampleC.sra")?;

    let discovery = discover_samples(dir.path())?;
    assert_eq!(discovery.samples.len(), 1);
    assert!(discovery.samples.contains_key("sampleC"));
    Ok(())
}

#[test]
fn test_three_files_one_key_is_flagged() -> Result<()> {
    let dir = tempfile::tempdir()?;
    touch(dir.path(), "sampleD_1.fastq")?;
    touch(dir.path(), "sampleD_2.fastq")?;
    touch(dir.path(), "sampleD.fastq")?;

    let discovery = discover_samples(dir.path())?;
    assert!(!discovery.samples.contains_key("sampleD"));
    assert_eq!(discovery.inconsistent["sampleD"].len(), 3);
    Ok(())
}

#[test]
fn test_two_forward_files_one_key_is_flagged() -> Result<()> {
    let dir = tempfile::tempdir()?;
    touch(dir.path(), "sampleE_1.fastq")?;
    touch(dir.path(), "sampleE_R1.fastq")?;

    let discovery = discover_samples(dir.path())?;
    assert!(!discovery.samples.contains_key("sampleE"));
    assert_eq!(discovery.inconsistent["sampleE"].len(), 2);
    Ok(())
}

#[test]
fn test_mixed_directory_pairedness() -> Result<()> {
    let dir = tempfile::tempdir()?;
    touch(dir.path(), "p1_1.fastq")?;
    touch(dir.path(), "p1_2.fastq")?;
    touch(dir.path(), "s1.fastq")?;

    let discovery = discover_samples(dir.path())?;
    assert_eq!(discovery.samples.len(), 2);
    assert!(discovery.any_paired());
    Ok(())
}

#[test]
fn test_read_set_pairedness() {
    let paired = ReadSet::paired("/tmp/run".into());
    assert!(paired.is_paired());
    let single = ReadSet::single("/tmp/run".into());
    assert!(!single.is_paired());
    assert!(single.fwd);
}
