use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use gcp_inventory::audit::{self, Collection};
use gcp_inventory::config::Config;
use gcp_inventory::delivery::{self, GcsUploader, ReportArtifact, SmtpMailer};
use gcp_inventory::gcp::client::GcpClient;
use gcp_inventory::gcp::projects;
use gcp_inventory::resource::build_plans;
use std::path::{Path, PathBuf};
use tracing::Instrument;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Audit GCP projects into a CSV inventory
#[derive(Parser, Debug)]
#[command(name = "gcp-inventory", version, about, long_about = None)]
struct Args {
    /// Config file (JSON or YAML); environment variables take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only audit these projects (repeatable)
    #[arg(short, long = "project")]
    projects: Vec<String>,

    /// Skip projects that are not ACTIVE
    #[arg(long)]
    active_only: bool,

    /// Write the report but do not upload or mail it
    #[arg(long)]
    no_deliver: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    // RUST_LOG wins over --log-level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let Some(log_path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;
    tracing::info!("gcp-inventory {} started", gcp_inventory::VERSION);

    let run_id = Uuid::new_v4();
    let result = run(&args)
        .instrument(tracing::info_span!("audit", %run_id))
        .await;

    match result {
        Ok(artifact) => {
            println!("{}", artifact.path().display());
            Ok(())
        }
        Err(err) => {
            tracing::error!("Audit aborted: {:#}", err);
            Err(err)
        }
    }
}

/// One audit run. Only fatal errors are returned; partial collection and
/// delivery failures are logged and the run still succeeds.
async fn run(args: &Args) -> Result<ReportArtifact> {
    let config = Config::load(args.config.as_deref(), !args.no_deliver)?;
    let started = Utc::now();

    let client = GcpClient::new().await?;

    let listed = projects::list_projects(&client)
        .await
        .context("Cannot list projects, nothing to audit")?;
    let targets = projects::select(listed, &args.projects, args.active_only);
    tracing::info!("Auditing {} projects", targets.len());

    let plans = build_plans(&client);
    let collection = audit::run(&targets, &plans).await;
    log_summary(&collection);

    let report = audit::assemble(&collection.sections);
    let artifact =
        ReportArtifact::persist(&report, &config.tmp_dir, &config.report_prefix, started)
            .await
            .context("Cannot persist the report")?;

    match &config.delivery {
        Some(delivery_config) => {
            let store = GcsUploader::new(client.clone(), &delivery_config.bucket);
            let mailer = SmtpMailer::new(delivery_config.smtp.clone());
            let outcome = delivery::deliver(&artifact, &store, &mailer).await;
            if !outcome.all_delivered() {
                tracing::warn!("Report was not delivered everywhere; the local copy is kept");
            }
        }
        None => tracing::info!("Delivery disabled"),
    }

    Ok(artifact)
}

fn log_summary(collection: &Collection) {
    let stats = collection.stats;
    tracing::info!(
        planned = stats.planned,
        succeeded = stats.succeeded,
        failed = stats.failed,
        skipped = stats.skipped,
        rows = stats.rows,
        "Collection finished"
    );

    if !collection.failures.is_empty() {
        tracing::warn!(
            "{} collection problems; affected rows are missing from the report",
            collection.failures.len()
        );
    }
}
