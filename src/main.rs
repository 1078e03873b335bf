//! # Quizcast — daily multiple-choice quiz for LINE groups
//!
//! Usage:
//!   quizcast                         # Serve webhooks and run the daily jobs
//!   quizcast --config ./quiz.toml    # Custom config file
//!   quizcast validate-sheet          # Check the problem sheet header
//!   quizcast push-problem            # Broadcast one problem now and exit

use anyhow::Result;
use clap::{Parser, Subcommand};
use quizcast_channels::LineClient;
use quizcast_core::QuizConfig;
use quizcast_core::traits::ProblemSource;
use quizcast_db::QuizDb;
use quizcast_gateway::AppState;
use quizcast_quiz::jobs::register_jobs;
use quizcast_quiz::{Collaborators, HttpImageProbe, QuizController};
use quizcast_scheduler::{CronDriver, JobRegistry};
use quizcast_sheets::SheetsSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quizcast", version, about = "🧭 Quizcast — daily quiz broadcaster for LINE groups")]
struct Cli {
    /// Config file (default: ~/.quizcast/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway and the daily jobs (default)
    Serve,
    /// Check the problem sheet header and count eligible problems
    ValidateSheet,
    /// Select and broadcast one problem, then exit
    PushProblem,
}

fn load_config(path: Option<&str>) -> Result<QuizConfig> {
    let config = match path {
        Some(p) => QuizConfig::load_from(&PathBuf::from(shellexpand::tilde(p).to_string()))?,
        None => QuizConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

fn build_controller(config: &QuizConfig, source: Arc<SheetsSource>) -> Result<Arc<QuizController>> {
    let request_timeout = Duration::from_secs(config.http.request_timeout_secs);

    let db_path = config.store.expanded_path();
    let store = Arc::new(QuizDb::open(&db_path)?);
    tracing::info!("💾 Store opened at {}", db_path.display());

    let deps = Collaborators {
        source,
        store,
        deliverer: Arc::new(LineClient::new(request_timeout, &config.labels)?),
        probe: Arc::new(HttpImageProbe::new(request_timeout, config.http.image_probe_max_bytes)?),
    };

    let deliverable = config.recipients.iter().filter(|r| r.is_deliverable()).count();
    tracing::info!("📣 {deliverable}/{} recipients deliverable", config.recipients.len());
    Ok(Arc::new(QuizController::new(deps, config)))
}

async fn serve(config: QuizConfig) -> Result<()> {
    let source = Arc::new(SheetsSource::new(&config.sheets, &config.http)?);
    source.validate_header().await?;
    let controller = build_controller(&config, source)?;

    if let Err(e) = controller.refresh_catalog().await {
        tracing::warn!("⚠️ Initial catalog load failed, 地図 unavailable until next refresh: {e}");
    }

    let driver = CronDriver::with_offset_hours(config.schedule.workers, config.schedule.utc_offset_hours)?;
    let registry = Arc::new(JobRegistry::new(driver));
    register_jobs(&registry, controller.clone(), &config.schedule)?;

    let state = AppState::new(controller, registry, config.commands.clone());
    quizcast_gateway::start(&config.server, state).await
}

async fn validate_sheet(config: QuizConfig) -> Result<()> {
    let source = SheetsSource::new(&config.sheets, &config.http)?;
    source.validate_header().await?;
    let eligible = source.read_eligible_problems().await?;
    let catalog = source.read_catalog().await?;
    println!("✅ Sheet header OK");
    println!("   Eligible problems: {}", eligible.len());
    println!("   Catalog entries:   {}", catalog.len());
    Ok(())
}

async fn push_problem(config: QuizConfig) -> Result<()> {
    let source = Arc::new(SheetsSource::new(&config.sheets, &config.http)?);
    let controller = build_controller(&config, source)?;
    match controller.select_and_broadcast().await? {
        Some(report) => {
            println!("✅ Problem {} broadcast", report.problem_id);
            for delivery in &report.deliveries {
                println!("   {}: {:?}", delivery.recipient, delivery.outcome);
            }
        }
        None => println!("📭 No eligible problems left"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "debug,hyper=info,reqwest=info,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::ValidateSheet => validate_sheet(config).await,
        Commands::PushProblem => push_problem(config).await,
    }
}
