mod db;
mod error;
mod fetch;
mod models;
mod money;
mod parser;
mod pipeline;
mod settings;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use db::{SqliteSink, Storage};
use fetch::HttpFetcher;
use pipeline::Pipeline;
use settings::Settings;

#[derive(Parser)]
#[command(name = "taxscraper", about = "Jersey City property tax collector scraper")]
struct Cli {
    /// Also append logs to this file
    #[arg(long, global = true, default_value = "logs.log")]
    log_file: PathBuf,
    /// Log to stdout only
    #[arg(long, global = true)]
    no_log_file: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every index page and property payment history into SQLite
    Run {
        /// Store scraped data in a timestamped sqlite3 file (default: memory)
        #[arg(short, long)]
        disk: bool,
        /// Portal address (overrides TAXSCRAPER_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,
        /// Also visit the page the pager's last link points at
        #[arg(long)]
        include_last_page: bool,
    },
    /// Row counts of a saved database
    Stats {
        db: PathBuf,
    },
    /// One property and its transactions from a saved database
    Show {
        db: PathBuf,
        /// Account number as listed on the portal
        account: i64,
    },
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing((!cli.no_log_file).then_some(cli.log_file.as_path()))?;

    let t0 = Instant::now();

    match cli.command {
        Commands::Run {
            disk,
            base_url,
            include_last_page,
        } => {
            let mut settings = Settings::load().context("Failed to load settings")?;
            if let Some(url) = base_url {
                settings.base_url = url;
            }
            settings.include_last_page |= include_last_page;

            let storage = if disk {
                Storage::timestamped(&settings.db_dir)
            } else {
                Storage::Memory
            };
            if let Storage::Disk(path) = &storage {
                ensure!(!path.exists(), "Database {} already exists", path.display());
            }
            let sink = SqliteSink::open(&storage)?;
            let fetcher = HttpFetcher::new(&settings)?;

            let mut pipeline = Pipeline::new(&settings, fetcher, sink);
            let stats = pipeline.run()?;
            println!(
                "Saved {} properties and {} transactions from {} pages.",
                stats.properties, stats.transactions, stats.pages
            );
            if let Storage::Disk(path) = &storage {
                println!("Database: {}", path.display());
            }
        }
        Commands::Stats { db: path } => {
            let conn = open_existing(&path)?;
            let s = db::get_stats(&conn)?;
            println!("Properties:   {}", s.properties);
            println!("Transactions: {}", s.transactions);
        }
        Commands::Show { db: path, account } => {
            let conn = open_existing(&path)?;
            let Some(property) = db::property_by_account(&conn, account)? else {
                println!("No property with account number {}.", account);
                return Ok(());
            };
            println!("{}", property);
            let txs = property
                .id
                .map(|id| db::transactions_for(&conn, id))
                .transpose()?
                .unwrap_or_default();
            for t in &txs {
                println!("  {}", t);
            }
            println!("\n{} transactions", txs.len());
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn open_existing(path: &Path) -> anyhow::Result<rusqlite::Connection> {
    ensure!(path.exists(), "No database at {}", path.display());
    Ok(db::open_read_only(path)?)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
