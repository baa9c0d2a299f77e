use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defs::is_fastq;
use crate::utils::file::extension_remover;

// Ordered longest-tag-first so `_R1` is never mistaken for `_1`.
const FORWARD_TAGS: &[&'static str] = &["R1", "1"];
const REVERSE_TAGS: &[&'static str] = &["R2", "2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairTag {
    Forward,
    Reverse,
}

/// Strips a trailing pairing token from a file stem, returning the sample
/// key and which mate the token named. `SRR123_1` -> (`SRR123`, Forward);
/// a stem with no trailing token is its own key.
///
/// A pairing token occurring mid-name is not recognized, so `run_1_extra`
/// keys as itself while `run_1` keys as `run`.
pub fn split_pair_tag(stem: &str) -> (String, Option<PairTag>) {
    for tag in FORWARD_TAGS {
        if let Some(prefix) = stem.strip_suffix(&format!("_{}", tag)) {
            return (prefix.to_string(), Some(PairTag::Forward));
        }
    }
    for tag in REVERSE_TAGS {
        if let Some(prefix) = stem.strip_suffix(&format!("_{}", tag)) {
            return (prefix.to_string(), Some(PairTag::Reverse));
        }
    }
    (stem.to_string(), None)
}

/// One sample's read files as found on disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleFiles {
    pub forward: Option<PathBuf>,
    pub reverse: Option<PathBuf>,
}

impl SampleFiles {
    pub fn is_paired(&self) -> bool {
        self.forward.is_some() && self.reverse.is_some()
    }

    /// The file to hand to single-input tools: forward if present,
    /// otherwise reverse.
    pub fn primary(&self) -> Option<&PathBuf> {
        self.forward.as_ref().or(self.reverse.as_ref())
    }
}

/// Result of one discovery pass over a reads directory.
#[derive(Debug, Default)]
pub struct Discovery {
    pub samples: BTreeMap<String, SampleFiles>,
    /// Keys that grouped more than two files, or two files that are not a
    /// forward/reverse pair. Left to the caller to report.
    pub inconsistent: BTreeMap<String, Vec<PathBuf>>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn any_paired(&self) -> bool {
        self.samples.values().any(|s| s.is_paired())
    }
}

/// Scans `dir` for read files and groups them into logical samples by
/// stripping pairing tokens and extensions. An empty or missing set of
/// read files yields an empty mapping, not an error.
pub fn discover_samples(dir: &Path) -> io::Result<Discovery> {
    let mut grouped: BTreeMap<String, Vec<(Option<PairTag>, PathBuf)>> = BTreeMap::new();

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_fastq(p))
        .collect();
    paths.sort();

    for path in paths {
        let (stem_path, _extensions) = extension_remover(&path);
        let stem = stem_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (key, tag) = split_pair_tag(&stem);
        grouped.entry(key).or_default().push((tag, path));
    }

    let mut discovery = Discovery::default();
    for (key, mut files) in grouped {
        match files.len() {
            1 => {
                let (tag, path) = files.remove(0);
                let sample = match tag {
                    Some(PairTag::Reverse) => SampleFiles {
                        forward: None,
                        reverse: Some(path),
                    },
                    _ => SampleFiles {
                        forward: Some(path),
                        reverse: None,
                    },
                };
                discovery.samples.insert(key, sample);
            }
            2 => {
                let fwd = files.iter().position(|(t, _)| *t == Some(PairTag::Forward));
                let rev = files.iter().position(|(t, _)| *t == Some(PairTag::Reverse));
                match (fwd, rev) {
                    (Some(f), Some(r)) => {
                        discovery.samples.insert(
                            key,
                            SampleFiles {
                                forward: Some(files[f].1.clone()),
                                reverse: Some(files[r].1.clone()),
                            },
                        );
                    }
                    _ => {
                        discovery
                            .inconsistent
                            .insert(key, files.into_iter().map(|(_, p)| p).collect());
                    }
                }
            }
            _ => {
                discovery
                    .inconsistent
                    .insert(key, files.into_iter().map(|(_, p)| p).collect());
            }
        }
    }

    Ok(discovery)
}

/// Summary of a run's reads: where they live and whether forward and
/// reverse files are present. Persisted in the run metadata and read
/// back by the continue entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadSet {
    pub dir_path: PathBuf,
    pub fwd: bool,
    pub rev: bool,
}

impl ReadSet {
    pub fn single(dir_path: PathBuf) -> Self {
        ReadSet {
            dir_path,
            fwd: true,
            rev: false,
        }
    }

    pub fn paired(dir_path: PathBuf) -> Self {
        ReadSet {
            dir_path,
            fwd: true,
            rev: true,
        }
    }

    pub fn is_paired(&self) -> bool {
        self.fwd && self.rev
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pair_tag() {
        assert_eq!(
            split_pair_tag("SRR100_1"),
            ("SRR100".to_string(), Some(PairTag::Forward))
        );
        assert_eq!(
            split_pair_tag("SRR100_R2"),
            ("SRR100".to_string(), Some(PairTag::Reverse))
        );
        assert_eq!(split_pair_tag("SRR100"), ("SRR100".to_string(), None));
        // Mid-name token is left alone
        assert_eq!(split_pair_tag("run_1_extra"), ("run_1_extra".to_string(), None));
    }

    #[test]
    fn test_r1_not_confused_with_1() {
        let (key, tag) = split_pair_tag("s_R1");
        assert_eq!(key, "s");
        assert_eq!(tag, Some(PairTag::Forward));
    }
}
