//! CLI command definitions for gapforge.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collaborators::{
    ConservativeClassifier, EvidenceClassifier, LlmEvidenceClassifier, LocalCorpus,
};
use crate::config::AppConfig;
use crate::frontier::FrontierOrchestrator;
use crate::llm::LiteLlmClient;
use crate::metrics::{export_metrics, init_metrics};
use crate::scheduler::{
    AnalysisMode, AnalysisRequest, JobScheduler, JobStatusView, ResultLookup,
    DEFAULT_MAX_PAPERS, DEFAULT_VALIDATION_THRESHOLD,
};
use crate::storage::{JobStore, SqliteJobStore};

const WAIT_POLL: Duration = Duration::from_millis(500);

/// Research gap discovery over an expanding literature frontier.
#[derive(Parser)]
#[command(name = "gapforge")]
#[command(about = "Discover validated research gaps starting from a seed paper")]
#[command(version)]
#[command(
    long_about = "gapforge analyzes a seed paper, explores related literature to eliminate gaps that are already solved, and reports the gaps that survive validation.\n\nExample usage:\n  gapforge analyze paper.txt --mode light --max-papers 5\n  gapforge analyze arxiv:2401.00001 --corpus corpus.json --json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// SQLite database holding jobs and results.
    #[arg(long, env = "GAPFORGE_DB_PATH", global = true)]
    pub db: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Submit an analysis and wait for it to finish.
    Analyze(AnalyzeArgs),

    /// Show the status of a job.
    Status {
        /// Job id.
        job_id: Uuid,
    },

    /// Print the report of a completed job.
    Result {
        /// Job id.
        job_id: Uuid,
    },

    /// List recent jobs, newest first.
    #[command(alias = "ls")]
    Jobs {
        /// Maximum number of jobs to show (capped at 100).
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Cancel a pending or running job.
    Cancel {
        /// Job id.
        job_id: Uuid,
    },

    /// Delete a job and its result.
    Delete {
        /// Job id.
        job_id: Uuid,
    },

    /// Mark pending or running jobs without a live process as failed.
    Reconcile,
}

/// Arguments for `gapforge analyze`.
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Seed paper: corpus reference, URL, or a file containing the paper text.
    pub seed: String,

    /// Paper and gap budget of the exploration (5-20).
    #[arg(long, default_value_t = DEFAULT_MAX_PAPERS)]
    pub max_papers: u32,

    /// Validation rounds a gap must survive to be reported (1-5).
    #[arg(long, default_value_t = DEFAULT_VALIDATION_THRESHOLD)]
    pub validation_threshold: u32,

    /// Analysis mode: light or deep.
    #[arg(long, default_value = "deep")]
    pub mode: AnalysisMode,

    /// JSON file of pre-analyzed papers used for analysis and search.
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Print the full report as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the run.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Analyze(args) => run_analyze_command(config, args).await,
        Commands::Status { job_id } => {
            let scheduler = build_scheduler(&config, LocalCorpus::default()).await?;
            print_status(&scheduler.get_status(job_id).await?);
            Ok(())
        }
        Commands::Result { job_id } => {
            let scheduler = build_scheduler(&config, LocalCorpus::default()).await?;
            print_result(scheduler.get_result(job_id).await?)
        }
        Commands::Jobs { limit } => {
            let scheduler = build_scheduler(&config, LocalCorpus::default()).await?;
            let jobs = scheduler.list_recent(Some(limit)).await?;
            if jobs.is_empty() {
                println!("No jobs.");
            }
            for job in jobs {
                println!(
                    "{}  {:<9}  {:<5}  {}  {}",
                    job.job_id,
                    job.status.as_str(),
                    job.analysis_mode.to_string(),
                    job.created_at.format("%Y-%m-%d %H:%M:%S"),
                    job.progress_message
                );
            }
            Ok(())
        }
        Commands::Cancel { job_id } => {
            let scheduler = build_scheduler(&config, LocalCorpus::default()).await?;
            let view = scheduler.cancel(job_id).await?;
            println!("Cancelled {} ({})", view.job_id, view.progress_message);
            Ok(())
        }
        Commands::Delete { job_id } => {
            let scheduler = build_scheduler(&config, LocalCorpus::default()).await?;
            scheduler.delete(job_id).await?;
            println!("Deleted {}", job_id);
            Ok(())
        }
        Commands::Reconcile => {
            let scheduler = build_scheduler(&config, LocalCorpus::default()).await?;
            let reconciled = scheduler.reconcile_stale().await?;
            println!("Reconciled {} stale job(s)", reconciled.len());
            for id in reconciled {
                println!("  {}", id);
            }
            Ok(())
        }
    }
}

fn build_classifier(config: &AppConfig) -> anyhow::Result<Arc<dyn EvidenceClassifier>> {
    let Some(api_base) = config.llm.api_base.clone().filter(|_| config.llm.is_configured()) else {
        info!("No LLM endpoint configured, gaps are never eliminated");
        return Ok(Arc::new(ConservativeClassifier::new()));
    };

    let client = LiteLlmClient::new(api_base, config.llm.api_key.clone(), config.llm.model.clone())
        .context("failed to create LLM client")?;
    info!(api_base = %client.api_base(), model = %config.llm.model, "Using LLM evidence classifier");
    Ok(Arc::new(LlmEvidenceClassifier::new(
        Arc::new(client),
        config.llm.model.clone(),
    )))
}

async fn build_scheduler(config: &AppConfig, corpus: LocalCorpus) -> anyhow::Result<JobScheduler> {
    let db_path = config.db_path.to_string_lossy().to_string();
    let store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::open(&db_path)
            .await
            .with_context(|| format!("failed to open job database {}", db_path))?,
    );

    let corpus = Arc::new(corpus);
    let orchestrator = FrontierOrchestrator::new(corpus.clone(), corpus, build_classifier(config)?)
        .with_config(config.orchestrator.clone());

    Ok(JobScheduler::new(
        config.scheduler.clone(),
        store,
        Arc::new(orchestrator),
    ))
}

/// Reads the seed from disk when it names an existing file.
async fn resolve_seed(seed: &str) -> anyhow::Result<String> {
    let path = PathBuf::from(seed);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(seed.to_string());
    }
    let text = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    info!(path = %path.display(), chars = text.len(), "Using seed paper text from file");
    Ok(text)
}

async fn run_analyze_command(config: AppConfig, args: AnalyzeArgs) -> anyhow::Result<()> {
    if args.print_metrics {
        init_metrics().context("failed to initialize metrics")?;
    }

    let corpus = match &args.corpus {
        Some(path) => LocalCorpus::load(path).await?,
        None => LocalCorpus::default(),
    };
    let scheduler = build_scheduler(&config, corpus).await?;

    let request = AnalysisRequest::new(resolve_seed(&args.seed).await?)
        .with_max_papers(args.max_papers)
        .with_validation_threshold(args.validation_threshold)
        .with_analysis_mode(args.mode);

    let receipt = scheduler.submit(request).await?;
    println!(
        "Submitted job {} (estimated {} min)",
        receipt.job_id, receipt.estimated_time_minutes
    );

    let mut last_progress = String::new();
    loop {
        let view = scheduler.get_status(receipt.job_id).await?;
        if view.progress_message != last_progress {
            info!(status = %view.status, "{}", view.progress_message);
            last_progress = view.progress_message.clone();
        }
        if view.status.is_terminal() {
            break;
        }
        tokio::time::sleep(WAIT_POLL).await;
    }

    let lookup = scheduler.get_result(receipt.job_id).await?;
    if args.json {
        if let ResultLookup::Ready(result) = &lookup {
            println!("{}", result.report_json);
        } else {
            print_result(lookup)?;
        }
    } else {
        print_result(lookup)?;
    }

    if args.print_metrics {
        print!("{}", export_metrics());
    }
    Ok(())
}

fn print_status(view: &JobStatusView) {
    println!("Job:       {}", view.job_id);
    println!("Status:    {}", view.status);
    println!("Mode:      {}", view.analysis_mode);
    println!("Created:   {}", view.created_at.to_rfc3339());
    if let Some(started) = view.started_at {
        println!("Started:   {}", started.to_rfc3339());
    }
    if let Some(completed) = view.completed_at {
        println!("Completed: {}", completed.to_rfc3339());
    }
    if let Some(secs) = view.processing_time_seconds {
        println!("Duration:  {:.1}s", secs);
    }
    println!("Progress:  {}", view.progress_message);
    if let Some(error) = &view.error {
        println!("Error:     {}", error);
    }
}

fn print_result(lookup: ResultLookup) -> anyhow::Result<()> {
    match lookup {
        ResultLookup::Ready(result) => {
            let report: crate::frontier::GapAnalysisReport =
                serde_json::from_str(&result.report_json).context("stored report is not valid")?;
            let meta = &report.process_metadata;
            println!("Seed:       {}", report.seed_title);
            println!(
                "Papers:     {} analyzed in {:.1}s",
                meta.total_papers_analyzed, meta.processing_time_seconds
            );
            println!(
                "Gaps:       {} discovered, {} validated, {} eliminated, {} pending",
                meta.gaps_discovered, meta.gaps_validated, meta.gaps_eliminated, meta.gaps_pending
            );
            println!();
            for (i, gap) in report.validated_gaps.iter().enumerate() {
                println!("{}. [{}] {}", i + 1, gap.category, gap.title);
                println!("   area: {}  confidence: {:.0}", gap.research_area, gap.confidence_score);
            }
            if report.validated_gaps.is_empty() {
                println!("No validated gaps.");
            }
            Ok(())
        }
        ResultLookup::Pending { progress_message } | ResultLookup::Running { progress_message } => {
            println!("Not ready: {}", progress_message);
            Ok(())
        }
        ResultLookup::Failed { error } => {
            warn!(error = %error, "Job failed");
            anyhow::bail!("job failed: {}", error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_args() {
        let cli = Cli::try_parse_from([
            "gapforge",
            "analyze",
            "seed-ref",
            "--mode",
            "light",
            "--max-papers",
            "5",
            "--db",
            "/tmp/x.db",
        ])
        .unwrap();

        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.seed, "seed-ref");
                assert_eq!(args.mode, AnalysisMode::Light);
                assert_eq!(args.max_papers, 5);
                assert_eq!(args.validation_threshold, 2);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["gapforge", "analyze", "s", "--mode", "medium"]).is_err());
    }

    #[test]
    fn test_job_id_must_be_uuid() {
        assert!(Cli::try_parse_from(["gapforge", "status", "not-a-uuid"]).is_err());
        let id = Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from(["gapforge", "cancel", id.as_str()]).is_ok());
    }

    #[tokio::test]
    async fn test_resolve_seed_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "Title line\nBody").unwrap();

        let text = resolve_seed(path.to_str().unwrap()).await.unwrap();
        assert_eq!(text, "Title line\nBody");
        assert_eq!(resolve_seed("arxiv:1234").await.unwrap(), "arxiv:1234");
    }
}
