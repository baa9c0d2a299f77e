use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Splits a file name into its stem and the full list of dot-suffixes,
/// so `sample_1.fastq.gz` becomes (`sample_1`, ["fastq", "gz"]).
pub fn extension_remover(path: &Path) -> (PathBuf, Vec<String>) {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return (path.to_path_buf(), Vec::new()),
    };

    let mut parts = file_name.split('.');
    let stem = parts.next().unwrap_or(file_name).to_string();
    let extensions: Vec<String> = parts.map(|s| s.to_string()).collect();

    let stem_path = match path.parent() {
        Some(parent) if parent != Path::new("") => parent.join(&stem),
        _ => PathBuf::from(&stem),
    };
    (stem_path, extensions)
}

/// Joins `path` onto `cwd` unless it is already absolute.
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

/// Writes `contents` to `path` through a temp file in the same directory,
/// so a reader never observes a half-written file.
pub fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

/// True when the directory is missing or holds no entries.
pub fn dir_is_empty(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_remover() {
        let (stem, exts) = extension_remover(Path::new("/data/sample_1.fastq.gz"));
        assert_eq!(stem, PathBuf::from("/data/sample_1"));
        assert_eq!(exts, vec!["fastq".to_string(), "gz".to_string()]);

        let (stem, exts) = extension_remover(Path::new("plain"));
        assert_eq!(stem, PathBuf::from("plain"));
        assert!(exts.is_empty());
    }

    #[test]
    fn test_atomic_write() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let target = dir.path().join("out.csv");
        atomic_write(&target, "a,b\n1,2\n")?;
        assert_eq!(std::fs::read_to_string(&target)?, "a,b\n1,2\n");
        // Overwrite goes through the same path
        atomic_write(&target, "c,d\n")?;
        assert_eq!(std::fs::read_to_string(&target)?, "c,d\n");
        Ok(())
    }

    #[test]
    fn test_dir_is_empty() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(dir_is_empty(dir.path()));
        std::fs::write(dir.path().join("x"), "")?;
        assert!(!dir_is_empty(dir.path()));
        assert!(dir_is_empty(Path::new("/no/such/dir")));
        Ok(())
    }
}
