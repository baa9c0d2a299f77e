use std::env;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};

use microbiome_pipelines::cli;
use microbiome_pipelines::config::defs::{PipelineError, RunConfig};
use microbiome_pipelines::pipelines;
use microbiome_pipelines::utils::command::effective_threads;

#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = cli::parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n Microbiome Pipelines\n-------------\n");

    let cwd = env::current_dir()?;
    info!("The current directory is {:?}", cwd);

    let threads = effective_threads(args.threads);
    debug!("Using {} threads for external tools", threads);

    let module = args.module.clone();
    let run_config = Arc::new(RunConfig { cwd, args, threads });

    if let Err(e) = match module.as_str() {
        "download" => download_run(run_config).await,
        "continue" => continue_run(run_config).await,
        "continue_fastq" => continue_fastq_run(run_config).await,
        "export" => export_run(run_config).await,
        _ => Err(PipelineError::InvalidConfig(format!(
            "Invalid module: {}",
            module
        ))),
    } {
        error!(
            "Pipeline failed: {} at {} milliseconds.",
            e,
            run_start.elapsed().as_millis()
        );
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}

async fn download_run(run_config: Arc<RunConfig>) -> Result<(), PipelineError> {
    pipelines::download(run_config).await
}

async fn continue_run(run_config: Arc<RunConfig>) -> Result<(), PipelineError> {
    pipelines::continue_run(run_config).await
}

async fn continue_fastq_run(run_config: Arc<RunConfig>) -> Result<(), PipelineError> {
    pipelines::continue_fastq(run_config).await
}

async fn export_run(run_config: Arc<RunConfig>) -> Result<(), PipelineError> {
    pipelines::export(run_config).await
}
