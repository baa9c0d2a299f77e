use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    #[value(name = "16s")]
    #[serde(rename = "16S")]
    SixteenS,
    #[value(name = "18s")]
    #[serde(rename = "18S")]
    EighteenS,
    #[value(name = "shotgun")]
    #[serde(rename = "shotgun")]
    Shotgun,
}

impl DataType {
    pub fn is_amplicon(&self) -> bool {
        matches!(self, DataType::SixteenS | DataType::EighteenS)
    }
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "microbiome-pipelines", version)]
pub struct Arguments {

    #[arg(short, long, help = "Entry point: download, continue, continue_fastq, or export")]
    pub module: String,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(short = 'a', long = "acc-list", help = "File listing one SRA accession per line")]
    pub acc_list: Option<String>,

    #[arg(short = 'd', long = "dataset-id")]
    pub dataset_id: Option<String>,

    #[arg(long = "data-type", default_value = "16s", value_enum)]
    pub data_type: DataType,

    #[arg(short = 'l', long = "location", help = "Parent directory for the run directory. Defaults to the current working directory.")]
    pub location: Option<String>,

    #[arg(long, action, help = "Drop reverse reads after conversion and treat everything as single-end")]
    pub as_single: bool,

    #[arg(long, action, help = "Run host-read removal (kneaddata) before profiling")]
    pub clean: bool,

    #[arg(long, action, help = "Run functional pathway inference (humann) after shotgun profiling")]
    pub pathways: bool,

    #[arg(long = "host-db", help = "Directory holding the Bowtie2 host reference index for kneaddata")]
    pub host_db: Option<String>,

    #[arg(long, action)]
    pub skip_fastqc: bool,

    #[arg(long, action)]
    pub bypass_trf: bool,

    #[arg(long = "trimmomatic-adapters")]
    pub trimmomatic_adapters: Option<String>,

    #[arg(short = 'c', long = "continue-path", help = "Existing run directory for the continue/export entry points")]
    pub continue_path: Option<String>,

    #[arg(long, help = "DADA2 trim-left; a single integer, or 'f,r' for paired reads")]
    pub trim: Option<String>,

    #[arg(long, help = "DADA2 trunc-len; a single integer, or 'f,r' for paired reads")]
    pub trunc: Option<String>,

    #[arg(long, help = "Path to the trained feature classifier artifact (.qza)")]
    pub classifier: Option<String>,

    #[arg(short = 't', long, default_value_t = 8)]
    pub threads: usize,
}
