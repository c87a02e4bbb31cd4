// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use compliance_sentinel::{
    alert_stats, export_to_file, get_flagged_transactions, ingest_transactions, open_database,
    report_filename, ComplianceAssistant, IngestSummary, OfflineTextService, RuleEvaluationEngine,
    SentinelConfig, TransactionFeed,
};

#[derive(Parser)]
#[command(name = "compliance-sentinel")]
#[command(about = "Compliance Sentinel - transaction alerts with masked assistant review", long_about = None)]
struct Cli {
    /// JSON config file (defaults to $SENTINEL_CONFIG, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull a batch from the synthetic feed, score it and store it
    Simulate {
        /// Number of transactions (random 1-4 when omitted)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// List flagged transactions, newest first
    Alerts {
        /// Maximum number of alerts to show
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Write every flagged transaction to a CSV report
    Export {
        /// Output path (defaults to compliance_report_YYYYMMDD.csv)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Ask the assistant about the current alerts
    Chat {
        /// Question for the assistant
        message: String,

        /// Number of recent alerts sent as context
        #[arg(long, default_value_t = 20)]
        context_limit: usize,
    },

    /// Interactive alerts dashboard
    Dashboard,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SentinelConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate { count } => run_simulate(&config, count),
        Commands::Alerts { limit } => run_alerts(&config, limit),
        Commands::Export { out } => run_export(&config, out),
        Commands::Chat {
            message,
            context_limit,
        } => run_chat(&config, &message, context_limit),
        Commands::Dashboard => run_dashboard(&config),
    }
}

fn open_store(config: &SentinelConfig) -> Result<Connection> {
    open_database(&config.db_path)
}

/// Draw a batch from the feed, score it and persist it
fn poll_feed(
    config: &SentinelConfig,
    conn: &Connection,
    engine: &RuleEvaluationEngine,
    count: Option<usize>,
) -> Result<IngestSummary> {
    let mut feed = TransactionFeed::new(config.catalogs.clone());
    let count = count.unwrap_or_else(|| {
        feed.random_batch_size(config.simulate_min_batch, config.simulate_max_batch)
    });

    let batch = feed.generate(count, Local::now().naive_local());
    ingest_transactions(conn, engine, &batch)
}

fn run_simulate(config: &SentinelConfig, count: Option<usize>) -> Result<()> {
    println!("🎲 Simulating transaction feed");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_store(config)?;
    let engine = RuleEvaluationEngine::from_config(config)?;
    let summary = poll_feed(config, &conn, &engine, count)?;

    println!("✓ Stored: {} transactions", summary.inserted);
    println!("✓ Flagged: {}", summary.flagged);
    if summary.duplicates > 0 {
        println!("✓ Skipped duplicates: {}", summary.duplicates);
    }
    if summary.rejected > 0 {
        println!("⚠️  Rejected: {}", summary.rejected);
    }

    Ok(())
}

fn run_alerts(config: &SentinelConfig, limit: usize) -> Result<()> {
    let conn = open_store(config)?;
    let alerts = get_flagged_transactions(&conn, Some(limit))?;
    let stats = alert_stats(&conn)?;

    println!(
        "🚨 {} alerts ({} high risk) as of {}",
        stats.total_alerts, stats.high_risk_count, stats.last_updated
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if alerts.is_empty() {
        println!("No flagged transactions. Run `compliance-sentinel simulate` to pull a batch.");
        return Ok(());
    }

    for alert in &alerts {
        println!(
            "{}  {:<8} {:>12.2} {}  {:<15} score {:>3}  {}",
            alert.timestamp,
            alert.user_id,
            alert.amount,
            alert.currency,
            alert.transaction_location,
            alert.anomaly_score,
            alert.flag_reason.as_deref().unwrap_or_default()
        );
    }

    Ok(())
}

fn run_export(config: &SentinelConfig, out: Option<PathBuf>) -> Result<()> {
    let conn = open_store(config)?;
    let alerts = get_flagged_transactions(&conn, None)?;

    let path = out.unwrap_or_else(|| PathBuf::from(report_filename(Local::now().date_naive())));
    let written = export_to_file(&path, &alerts)?;

    println!("📄 Wrote {} alerts to {}", written, path.display());
    Ok(())
}

fn run_chat(config: &SentinelConfig, message: &str, context_limit: usize) -> Result<()> {
    let conn = open_store(config)?;
    let alerts = get_flagged_transactions(&conn, Some(context_limit))?;
    let context = serde_json::to_value(&alerts).context("Failed to serialize alert context")?;

    let assistant = ComplianceAssistant::new(
        config.catalogs.clone(),
        config.assistant.clone(),
        Arc::new(OfflineTextService),
    );

    let reply = assistant.chat(message, &context)?;

    println!("🤖 {}", reply);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_dashboard(config: &SentinelConfig) -> Result<()> {
    let conn = open_store(config)?;
    let engine = RuleEvaluationEngine::from_config(config)?;

    let alerts = get_flagged_transactions(&conn, Some(100))?;
    let stats = alert_stats(&conn)?;

    let mut app = ui::App::new(alerts, stats);
    ui::run_ui(&mut app, || {
        poll_feed(config, &conn, &engine, None)?;
        Ok((get_flagged_transactions(&conn, Some(100))?, alert_stats(&conn)?))
    })?;

    println!("\n✅ Dashboard closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_dashboard(_config: &SentinelConfig) -> Result<()> {
    anyhow::bail!(
        "dashboard not available in this build; rebuild with `--features tui` \
         or run the HTTP server with `--features server`"
    )
}
