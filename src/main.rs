mod db;
mod error;
mod ingest;
mod pages;
mod parser;
mod secrets;
mod tracker;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::db::TradeStore;
use crate::ingest::RunConfig;
use crate::pages::TradePages;
use crate::secrets::{AwsSecretStore, EnvSecretStore, FileSecretStore, SecretRef};
use crate::tracker::JsonFileStore;

#[derive(Parser, Debug)]
#[command(
    name = "congress_trades",
    about = "Ingest congressional stock-trade disclosures into congressional_holdings"
)]
struct Cli {
    /// Tracker file mapping dates to the last ingested trade id
    #[arg(long, default_value = tracker::DEFAULT_TRACKER_PATH)]
    tracker: PathBuf,
    /// Number of sequential trade ids to check
    #[arg(short = 'n', long, default_value_t = ingest::MAX_TO_CHECK)]
    max_to_check: u32,
    /// Pause between trade pages, in milliseconds
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
    /// Trade id to start after when the tracker is empty
    #[arg(long, default_value_t = ingest::DEFAULT_START_ID)]
    start_id: i64,
    /// Secret holding the database credentials
    #[arg(long, default_value = secrets::DEFAULT_SECRET_NAME)]
    secret_name: String,
    #[arg(long, default_value = secrets::DEFAULT_REGION)]
    region: String,
    /// Read the credentials secret from this JSON file instead of Secrets Manager
    #[arg(long, conflicts_with = "secret_env")]
    secret_file: Option<PathBuf>,
    /// Read the credentials secret from the environment (e.g. $ALGOTRADER_SECRET_CREDENTIALS)
    #[arg(long)]
    secret_env: bool,
    /// Write to a local SQLite database instead of MySQL
    #[arg(long)]
    sqlite: Option<PathBuf>,
    /// Trade detail page prefix
    #[arg(long, default_value = pages::TRADES_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut store = match &cli.sqlite {
        Some(path) => TradeStore::open_sqlite(path)
            .with_context(|| format!("Failed to open {:?}", path))?,
        None => {
            let secret = SecretRef {
                name: cli.secret_name.clone(),
                region: cli.region.clone(),
            };
            let creds = match &cli.secret_file {
                Some(path) => {
                    let store = FileSecretStore { path: path.clone() };
                    secrets::load_credentials(&store, &secret).await
                }
                None if cli.secret_env => secrets::load_credentials(&EnvSecretStore, &secret).await,
                None => {
                    let store = AwsSecretStore::connect(&secret).await;
                    secrets::load_credentials(&store, &secret).await
                }
            }
            .context("Failed to load database credentials")?;
            TradeStore::connect_mysql(&creds)
                .await
                .context("Failed to connect to the database")?
        }
    };

    let source = TradePages::new(&cli.base_url)?;
    let mut progress = JsonFileStore::new(&cli.tracker);
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    let config = RunConfig {
        default_start_id: cli.start_id,
        max_to_check: cli.max_to_check,
        delay: Duration::from_millis(cli.delay_ms),
        show_progress: std::io::stderr().is_terminal(),
    };

    let stats = ingest::run_pass(&source, &mut store, &mut progress, &today, &config).await?;
    store.close().await?;

    info!("Tracker at {:?}", progress.path());
    println!(
        "Checked {} trade IDs after {}: {} inserted, {} already stored, {} skipped.",
        stats.attempted, stats.start_id, stats.inserted, stats.duplicates, stats.skipped
    );
    if let Some(last) = stats.last_id {
        println!("Last ingested trade ID: {}", last);
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
