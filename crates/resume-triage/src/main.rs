use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use resume_triage::config::{load_config, TriageConfig};
use resume_triage::logging::{self, LogFormat};
use resume_triage::mailbox::{token_provider_from_config, GraphClient};
use resume_triage::pipeline::{
    score_local_file, ApprovalPipeline, CollectingSink, JsonReportSink, LocalScore, Pipeline,
    PipelineConfig, ResultSink,
};
use resume_triage::TriageError;

#[derive(Parser)]
#[command(name = "resume-triage", version)]
#[command(about = "Screen resumes arriving as mail attachments against a job definition")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Enable debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch messages, score attachments and store approved resumes
    Run {
        #[arg(short, long)]
        config: PathBuf,

        /// Score everything but store nothing and leave messages unread
        #[arg(long)]
        dry_run: bool,

        /// Write the JSON report here (overrides output.report_path)
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate a configuration file and exit
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Score local files against the configured job
    Score {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format, if cli.verbose { "debug" } else { "info" });

    let result = match cli.command {
        Commands::Run {
            config,
            dry_run,
            report,
        } => run(config, dry_run, report),
        Commands::CheckConfig { config } => check_config(config),
        Commands::Score { config, files } => score(config, files),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn check_config(path: PathBuf) -> Result<(), TriageError> {
    let config = load_config(&path)?;
    info!(
        "Configuration OK: job '{}', {} required keywords, {} formations, mailbox {}",
        config.job.title,
        config.job.required_keywords.len(),
        config.job.formations.len(),
        if config.mailbox.is_some() { "configured" } else { "not configured" }
    );
    Ok(())
}

fn score(path: PathBuf, files: Vec<PathBuf>) -> Result<(), TriageError> {
    let config = load_config(&path)?;
    let pipeline = Pipeline::from_config(Arc::new(PipelineConfig::from_config(&config)));

    for file in &files {
        match score_local_file(&pipeline, file)? {
            LocalScore::Scored(record) => {
                let json = serde_json::to_string_pretty(&record).unwrap_or_default();
                println!("{}", json);
            }
            LocalScore::Skipped(reason) => {
                warn!("{}: skipped, {}", file.display(), reason);
            }
        }
    }
    Ok(())
}

fn run(path: PathBuf, dry_run: bool, report: Option<PathBuf>) -> Result<(), TriageError> {
    let config = load_config(&path)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| resume_triage::WorkerError::SpawnFailed(e.to_string()))?;

    runtime.block_on(run_async(config, dry_run, report))
}

async fn run_async(
    config: TriageConfig,
    dry_run: bool,
    report: Option<PathBuf>,
) -> Result<(), TriageError> {
    let mailbox = config.mailbox.clone().ok_or_else(|| {
        resume_triage::ConfigError::Validation {
            message: "the run command needs a mailbox section".to_string(),
        }
    })?;

    let tokens = token_provider_from_config(&mailbox.auth, &config.fetch)?;
    let client = GraphClient::new(&mailbox, &config.fetch, tokens)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_stop.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("Stopping after the current attachment (Ctrl+C again to abort)");
    }) {
        warn!("Could not install Ctrl+C handler: {}", e);
    }

    let mut pipeline = ApprovalPipeline::builder(&config, Arc::new(client))
        .dry_run(dry_run)
        .stop_flag(stop)
        .build()?;

    let report_path = report.or_else(|| config.output.report_path.clone());
    let mut sink: Box<dyn ResultSink> = match report_path {
        Some(path) => Box::new(JsonReportSink::new(path)),
        None => Box::new(CollectingSink::new()),
    };

    let outcome = pipeline.run(&mailbox.endpoint, sink.as_mut()).await;
    pipeline.shutdown();
    outcome?;
    Ok(())
}
