use anyhow::Result;
use std::fs::File;
use std::path::Path;

use microbiome_pipelines::pipelines::shotgun::find_profile;

#[test]
fn test_second_candidate_selected_when_first_missing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    File::create(dir.path().join("X_1_profile.txt"))?;

    let found = find_profile(dir.path(), "X", None).expect("candidate should be found");
    assert!(found.ends_with("X_1_profile.txt"));
    Ok(())
}

#[test]
fn test_first_candidate_wins_when_both_exist() -> Result<()> {
    let dir = tempfile::tempdir()?;
    File::create(dir.path().join("X_profile.txt"))?;
    File::create(dir.path().join("X_1_profile.txt"))?;

    let found = find_profile(dir.path(), "X", None).expect("candidate should be found");
    assert!(found.ends_with("X_profile.txt"));
    Ok(())
}

#[test]
fn test_no_candidate_yields_none() -> Result<()> {
    let dir = tempfile::tempdir()?;
    assert!(find_profile(dir.path(), "X", None).is_none());
    Ok(())
}

#[test]
fn test_file_stem_fallback_candidate() -> Result<()> {
    let dir = tempfile::tempdir()?;
    File::create(dir.path().join("X_1_extra_profile.txt"))?;

    // neither keyed candidate exists; the first-file fallback does
    let found = find_profile(
        dir.path(),
        "X",
        Some(Path::new("/reads/X_1_extra.fastq.gz")),
    )
    .expect("fallback candidate should be found");
    assert!(found.ends_with("X_1_extra_profile.txt"));
    Ok(())
}
