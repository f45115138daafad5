use log::{info, warn};
use anyhow::{Result, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};

use clm_reconciler::analysis::{scan_anomalies, summarize, PositionView};
use clm_reconciler::config::{self, Config};
use clm_reconciler::db::Database;
use clm_reconciler::ingest::ingest_capture;
use clm_reconciler::models::Capture;
use clm_reconciler::normalize::{install_normalizer, normalize_pair};

#[derive(Parser)]
#[command(name = "clm-reconciler", version, about = "Reconcile scraped CLM positions with vision-extracted breakdowns")]
struct Cli {
    /// Database path, overrides DATABASE_PATH
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a capture file and fold it into the canonical positions
    Ingest {
        /// Capture JSON file
        file: PathBuf,
    },
    /// Rebuild every canonical position from the stored history
    Reconcile,
    /// Print a summary and anomaly scan
    Report {
        /// Report on canonical positions instead of the latest capture
        #[arg(long)]
        canonical: bool,
        /// Restrict the latest-capture report to one protocol
        #[arg(long)]
        protocol: Option<String>,
    },
    /// Print the canonical spelling of a pair
    Normalize {
        pair: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables
    dotenv().ok();

    // Initialize logging
    init_logger();

    let cli = Cli::parse();

    // Load configuration
    let mut config = config::load_config()?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    let normalizer = config.token_normalizer();
    let alias_count = normalizer.len();
    if install_normalizer(normalizer) {
        info!("Token normalizer ready with {} aliases", alias_count);
    } else {
        warn!("Token normalizer was already initialized, configured aliases ignored");
    }

    if let Command::Normalize { pair } = &cli.command {
        println!("{}", normalize_pair(pair));
        return Ok(());
    }

    // Connect to database
    let db = Database::new(&config.database_path).await?;
    info!("Database {} opened", config.database_path);

    match cli.command {
        Command::Ingest { file } => ingest(&db, &config, &file).await?,
        Command::Reconcile => rebuild(&db, &config).await?,
        Command::Report { canonical: true, .. } => {
            let positions = db.fetch_canonical_positions().await?;
            print_report("Canonical positions", &positions, &config);
        }
        Command::Report { canonical: false, protocol } => {
            let positions = db.latest_capture_positions(protocol.as_deref()).await?;
            print_report("Latest capture", &positions, &config);
        }
        Command::Normalize { .. } => {}
    }

    Ok(())
}

async fn ingest(db: &Database, config: &Config, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read capture file {}", file.display()))?;
    let capture: Capture = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse capture file {}", file.display()))?;

    let report = ingest_capture(db, &capture, &config.merge_policy()).await?;
    info!(
        "Capture {} ingested, {} canonical positions refreshed",
        report.capture_id, report.refreshed
    );
    Ok(())
}

async fn rebuild(db: &Database, config: &Config) -> Result<()> {
    let history = db.fetch_all_observations().await?;
    let canonical = config.merge_policy().reconcile_all(&history);

    // keys the current aliases no longer produce are dropped with the rest
    db.replace_canonical_positions(canonical.values()).await?;

    let with_breakdown = canonical.values().filter(|p| p.has_breakdown).count();
    info!(
        "Rebuilt {} canonical positions from {} observations ({} with breakdown)",
        canonical.len(),
        history.len(),
        with_breakdown
    );
    Ok(())
}

fn print_report<P: PositionView>(title: &str, positions: &[P], config: &Config) {
    println!("== {} ==", title);
    println!("{}", summarize(positions, config.report_top_n).render());

    let findings = scan_anomalies(positions, &config.anomaly_thresholds());
    if findings.is_empty() {
        println!("No anomalies found");
    } else {
        println!("Anomalies:");
        for finding in findings {
            println!("  - {}", finding);
        }
    }
}

fn init_logger() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info")
    );
}
