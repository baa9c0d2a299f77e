/// Functions and structs for building and running external tool invocations

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Result};
use log::{debug, warn};

use crate::config::defs::{
    PipelineError, FASTERQ_DUMP_TAG, HUMANN_TAG, KNEADDATA_TAG, METAPHLAN_TAG, PREFETCH_TAG,
    QIIME_TAG,
};

/// Ordered flag/value list for one tool invocation. Serialization order
/// is insertion order, so a command line is reproducible run to run.
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    fields: Vec<(String, Option<String>)>,
}

impl ToolOptions {
    pub fn new() -> Self {
        ToolOptions { fields: Vec::new() }
    }

    /// A bare flag with no value, e.g. `--verbose`.
    pub fn flag(&mut self, name: &str) -> &mut Self {
        self.fields.push((name.to_string(), None));
        self
    }

    /// A flag followed by its value, e.g. `--threads 8`.
    pub fn opt(&mut self, name: &str, value: impl ToString) -> &mut Self {
        self.fields.push((name.to_string(), Some(value.to_string())));
        self
    }

    /// A positional argument.
    pub fn positional(&mut self, value: impl ToString) -> &mut Self {
        self.fields.push((value.to_string(), None));
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.fields.len() * 2);
        for (name, value) in &self.fields {
            args.push(name.clone());
            if let Some(v) = value {
                args.push(v.clone());
            }
        }
        args
    }
}

/// What became of one stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Completed,
    Failed(Option<i32>),
    Skipped(String),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }
}

#[derive(Debug)]
pub struct StageResult {
    pub tool: String,
    pub outcome: StageOutcome,
    pub log_path: Option<PathBuf>,
}

impl StageResult {
    pub fn skipped(tool: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("{}: skipped: {}", tool, reason);
        StageResult {
            tool: tool.to_string(),
            outcome: StageOutcome::Skipped(reason),
            log_path: None,
        }
    }
}

/// Runs one external tool to completion. Combined stdout and stderr go to
/// `log_path` when given, otherwise they are inherited.
///
/// A non-zero exit or a spawn failure is logged and reported in the
/// returned StageResult; it is never an Err, so callers fall through to
/// their next stage by default.
pub async fn run_tool(program: &str, options: &ToolOptions, log_path: Option<&Path>) -> StageResult {
    let args = options.to_args();
    debug!("{} {}", program, args.join(" "));

    let mut command = tokio::process::Command::new(program);
    command.args(&args).stdin(Stdio::null());

    if let Some(log) = log_path {
        if let Some(parent) = log.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Cannot create log directory {:?}: {}", parent, e);
            }
        }
        match File::create(log).and_then(|f| f.try_clone().map(|c| (f, c))) {
            Ok((out, err)) => {
                command.stdout(Stdio::from(out)).stderr(Stdio::from(err));
            }
            Err(e) => {
                warn!("Cannot open log file {:?}: {}; output goes to console", log, e);
            }
        }
    }

    let outcome = match command.status().await {
        Ok(status) if status.success() => StageOutcome::Completed,
        Ok(status) => {
            warn!(
                "Command '{} {}' returned non-zero exit status {:?}.",
                program,
                args.join(" "),
                status.code()
            );
            StageOutcome::Failed(status.code())
        }
        Err(e) => {
            warn!("Failed to spawn {}: {}. Is {} installed?", program, e, program);
            StageOutcome::Failed(None)
        }
    };

    StageResult {
        tool: program.to_string(),
        outcome,
        log_path: log_path.map(|p| p.to_path_buf()),
    }
}

/// Caps a requested thread count to what the machine actually has.
pub fn effective_threads(requested: usize) -> usize {
    requested.min(num_cpus::get()).max(1)
}

/// Spawns `tool --version` and returns the first output line. Used as a
/// presence check before a branch commits to its external collaborators.
pub async fn presence_check(tool: &str) -> Result<String> {
    let output = tokio::process::Command::new(tool)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| anyhow!("Failed to spawn {}: {}. Is {} installed?", tool, e, tool))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let first_line = stdout
        .lines()
        .chain(stderr.lines())
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    if first_line.is_empty() {
        return Err(anyhow!("No output from {} --version", tool));
    }
    Ok(first_line)
}

/// Checks every tool a branch depends on before the first stage runs.
/// A branch only starts once its external collaborators are present.
pub async fn check_versions(tools: &[&str]) -> Result<(), PipelineError> {
    for tool in tools {
        match presence_check(tool).await {
            Ok(version) => debug!("{}: {}", tool, version),
            Err(e) => {
                return Err(PipelineError::ToolExecution {
                    tool: tool.to_string(),
                    error: e.to_string(),
                })
            }
        }
    }
    Ok(())
}

pub mod sra {
    use super::ToolOptions;
    use crate::config::defs::PREFETCH_MAX_SIZE;
    use std::path::Path;

    pub fn prefetch_args(acc_list: &Path, sra_dir: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .opt("--option-file", acc_list.display())
            .opt("--output-directory", sra_dir.display())
            .opt("--max-size", PREFETCH_MAX_SIZE);
        options
    }

    pub fn fasterq_dump_args(sra_file: &Path, fastq_dir: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .flag("--split-files")
            .positional(sra_file.display())
            .opt("-O", fastq_dir.display());
        options
    }
}

pub mod qiime {
    use super::ToolOptions;
    use crate::config::defs::{
        CLUSTER_IDENTITY, FILTER_MIN_FREQUENCY, FILTER_MIN_SAMPLES, TAXA_EXCLUDE,
    };
    use std::path::Path;

    pub fn import_args(paired: bool, manifest: &Path, out_path: &Path) -> ToolOptions {
        let semantic_type = if paired {
            "SampleData[PairedEndSequencesWithQuality]"
        } else {
            "SampleData[SequencesWithQuality]"
        };
        let input_format = if paired {
            "PairedEndFastqManifestPhred33V2"
        } else {
            "SingleEndFastqManifestPhred33V2"
        };
        let mut options = ToolOptions::new();
        options
            .positional("tools")
            .positional("import")
            .opt("--type", semantic_type)
            .opt("--input-path", manifest.display())
            .opt("--input-format", input_format)
            .opt("--output-path", out_path.display());
        options
    }

    pub fn demux_summarize_args(qza_path: &Path, vis_path: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("demux")
            .positional("summarize")
            .opt("--i-data", qza_path.display())
            .opt("--o-visualization", vis_path.display());
        options
    }

    /// DADA2 denoise. For paired reads, `trim` and `trunc` are (forward,
    /// reverse) pairs; single-end reads use the scalar flags.
    pub fn dada2_args(
        paired: bool,
        input_path: &Path,
        qza_dir: &Path,
        trim: &str,
        trunc: &str,
        threads: usize,
    ) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("dada2")
            .positional(if paired { "denoise-paired" } else { "denoise-single" })
            .opt("--i-demultiplexed-seqs", input_path.display());

        if paired {
            let (trim_f, trim_r) = trim.split_once(',').unwrap_or((trim, trim));
            let (trunc_f, trunc_r) = trunc.split_once(',').unwrap_or((trunc, trunc));
            options
                .opt("--p-trim-left-f", trim_f.trim())
                .opt("--p-trim-left-r", trim_r.trim())
                .opt("--p-trunc-len-f", trunc_f.trim())
                .opt("--p-trunc-len-r", trunc_r.trim());
        } else {
            options
                .opt("--p-trim-left", trim)
                .opt("--p-trunc-len", trunc);
        }

        options
            .opt("--o-table", qza_dir.join("dada2_table.qza").display())
            .opt("--p-n-threads", threads)
            .opt("--p-chimera-method", "consensus")
            .opt(
                "--o-representative-sequences",
                qza_dir.join("dada2_rep-seqs.qza").display(),
            )
            .opt(
                "--o-denoising-stats",
                qza_dir.join("dada2_denoising-stats.qza").display(),
            )
            .flag("--verbose");
        options
    }

    pub fn cluster_args(qza_dir: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("vsearch")
            .positional("cluster-features-de-novo")
            .opt("--i-table", qza_dir.join("dada2_table.qza").display())
            .opt("--i-sequences", qza_dir.join("dada2_rep-seqs.qza").display())
            .opt("--p-perc-identity", CLUSTER_IDENTITY)
            .opt("--o-clustered-table", qza_dir.join("table-dn-99.qza").display())
            .opt(
                "--o-clustered-sequences",
                qza_dir.join("rep-seqs-dn-99.qza").display(),
            );
        options
    }

    pub fn classify_args(qza_dir: &Path, classifier: &Path, classified_name: &str) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("feature-classifier")
            .positional("classify-sklearn")
            .opt("--i-reads", qza_dir.join("rep-seqs-dn-99.qza").display())
            .opt("--i-classifier", classifier.display())
            .opt("--o-classification", qza_dir.join(classified_name).display());
        options
    }

    pub fn filter_taxa_args(qza_dir: &Path, classified_name: &str) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("taxa")
            .positional("filter-table")
            .opt("--i-table", qza_dir.join("table-dn-99.qza").display())
            .opt("--i-taxonomy", qza_dir.join(classified_name).display())
            .opt("--p-exclude", TAXA_EXCLUDE)
            .opt("--o-filtered-table", qza_dir.join("clean_table.qza").display());
        options
    }

    pub fn filter_features_args(qza_dir: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("feature-table")
            .positional("filter-features")
            .opt("--i-table", qza_dir.join("clean_table.qza").display())
            .opt("--p-min-samples", FILTER_MIN_SAMPLES)
            .opt("--p-min-frequency", FILTER_MIN_FREQUENCY)
            .opt(
                "--o-filtered-table",
                qza_dir.join("feature-frequency-filtered-table.qza").display(),
            );
        options
    }

    pub fn export_args(input_path: &Path, output_path: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("tools")
            .positional("export")
            .opt("--input-path", input_path.display())
            .opt("--output-path", output_path.display());
        options
    }

    pub fn mafft_args(input_path: &Path, output_path: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("alignment")
            .positional("mafft")
            .opt("--i-sequences", input_path.display())
            .opt("--o-alignment", output_path.display());
        options
    }

    pub fn fasttree_args(input_path: &Path, output_path: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("phylogeny")
            .positional("fasttree")
            .opt("--i-alignment", input_path.display())
            .opt("--o-tree", output_path.display())
            .flag("--verbose");
        options
    }

    pub fn midpoint_root_args(input_path: &Path, output_path: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("phylogeny")
            .positional("midpoint-root")
            .opt("--i-tree", input_path.display())
            .opt("--o-rooted-tree", output_path.display());
        options
    }
}

pub mod biom {
    use super::ToolOptions;
    use std::path::Path;

    pub fn convert_to_tsv_args(input_path: &Path, output_path: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .positional("convert")
            .opt("-i", input_path.display())
            .opt("-o", output_path.display())
            .flag("--to-tsv");
        options
    }
}

pub mod metaphlan {
    use super::ToolOptions;
    use crate::config::defs::METAPHLAN_INDEX;
    use std::path::Path;

    /// One profiling run. Paired mates are passed comma-joined in the
    /// single positional input slot.
    pub fn arg_generator(
        forward: &Path,
        reverse: Option<&Path>,
        bowtie2_out: &Path,
        profile_out: &Path,
        threads: usize,
    ) -> ToolOptions {
        let input = match reverse {
            Some(rev) => format!("{},{}", forward.display(), rev.display()),
            None => forward.display().to_string(),
        };
        let mut options = ToolOptions::new();
        options
            .positional(input)
            .opt("--input_type", "fastq")
            .opt("--nproc", threads)
            .opt("--bowtie2out", bowtie2_out.display())
            .opt("-o", profile_out.display())
            .opt("--index", METAPHLAN_INDEX);
        options
    }

    pub fn merge_args(profiles: &[std::path::PathBuf], output: &Path) -> ToolOptions {
        let mut options = ToolOptions::new();
        for profile in profiles {
            options.positional(profile.display());
        }
        options.opt("-o", output.display());
        options
    }
}

pub mod humann {
    use super::ToolOptions;
    use std::path::Path;

    pub fn arg_generator(
        input_file: &Path,
        output_dir: &Path,
        taxonomic_profile: &Path,
        threads: usize,
    ) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .opt("--input", input_file.display())
            .opt("--output", output_dir.display())
            .opt("--taxonomic-profile", taxonomic_profile.display())
            .opt("--threads", threads)
            .opt("--input-format", "fastq")
            .flag("--remove-temp-output");
        options
    }
}

pub mod kneaddata {
    use super::ToolOptions;
    use crate::cli::Arguments;
    use std::path::Path;

    pub fn arg_generator(
        args: &Arguments,
        db_dir: &Path,
        out_dir: &Path,
        forward: &Path,
        reverse: Option<&Path>,
        threads: usize,
    ) -> ToolOptions {
        let mut options = ToolOptions::new();
        options
            .opt("--threads", threads)
            .opt("--reference-db", db_dir.display())
            .opt("--output", out_dir.display());

        if !args.skip_fastqc {
            options.flag("--run-fastqc-start").flag("--run-fastqc-end");
        }
        if args.bypass_trf {
            options.flag("--bypass-trf");
        }
        if let Some(adapters) = &args.trimmomatic_adapters {
            options.opt("--trimmomatic", "trimmomatic").opt(
                "--trimmomatic-options",
                format!("ILLUMINACLIP:{}:2:30:10", adapters),
            );
        }

        match reverse {
            Some(rev) => {
                options
                    .opt("--input1", forward.display())
                    .opt("--input2", rev.display());
            }
            None => {
                options.opt("--unpaired", forward.display());
            }
        }
        options
    }
}

/// Version flags are uniform across the toolkit; keep the per-branch tool
/// lists in one place so entry points stay declarative.
pub fn amplicon_tools() -> Vec<&'static str> {
    vec![QIIME_TAG]
}

pub fn shotgun_tools(pathways: bool) -> Vec<&'static str> {
    let mut tools = vec![METAPHLAN_TAG];
    if pathways {
        tools.push(HUMANN_TAG);
    }
    tools
}

pub fn acquisition_tools() -> Vec<&'static str> {
    vec![PREFETCH_TAG, FASTERQ_DUMP_TAG]
}

pub fn dehost_tools() -> Vec<&'static str> {
    vec![KNEADDATA_TAG]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_options_order() {
        let mut options = ToolOptions::new();
        options
            .positional("tools")
            .positional("import")
            .opt("--type", "SampleData[SequencesWithQuality]")
            .flag("--verbose");
        assert_eq!(
            options.to_args(),
            vec![
                "tools",
                "import",
                "--type",
                "SampleData[SequencesWithQuality]",
                "--verbose"
            ]
        );
    }

    #[test]
    fn test_metaphlan_paired_input() {
        let options = metaphlan::arg_generator(
            Path::new("/r/a_1.fastq"),
            Some(Path::new("/r/a_2.fastq")),
            Path::new("/r/a.bowtie2.bz2"),
            Path::new("/q/a_profile.txt"),
            4,
        );
        let args = options.to_args();
        assert_eq!(args[0], "/r/a_1.fastq,/r/a_2.fastq");
        assert!(args.contains(&"--nproc".to_string()));
    }

    #[tokio::test]
    async fn test_run_tool_failure_is_reported_not_raised() {
        let options = ToolOptions::new();
        let result = run_tool("false", &options, None).await;
        assert_eq!(result.outcome, StageOutcome::Failed(Some(1)));
        assert!(!result.outcome.is_success());
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let options = ToolOptions::new();
        let result = run_tool("no-such-tool-exists-here", &options, None).await;
        assert_eq!(result.outcome, StageOutcome::Failed(None));
    }
}
