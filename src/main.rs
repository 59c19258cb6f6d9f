mod analysis;
mod config;
mod llm;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::models::StockOutcome;
use crate::pipeline::Pipeline;
use crate::storage::ProcessedLedger;

#[derive(Parser)]
#[command(
    name = "stock-guidance-agent",
    about = "Screen small-cap listings for management revenue guidance",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl listing pages and write a report per accepted stock
    Crawl {
        /// First listing page (overrides config)
        #[arg(long)]
        first_page: Option<u32>,

        /// Last listing page, inclusive (overrides config)
        #[arg(long)]
        last_page: Option<u32>,
    },

    /// Analyze one detail page without touching the processed ledger
    Stock {
        /// Detail page URL, e.g. https://www.screener.in/company/ACME/consolidated/
        url: String,
    },

    /// Show how many stocks the processed ledger holds
    Processed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "stock_guidance_agent=info,warn",
        1 => "stock_guidance_agent=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing the current step");
            signal.cancel();
        }
    });

    match cli.command {
        Command::Crawl {
            first_page,
            last_page,
        } => {
            if let Some(p) = first_page {
                config.pipeline.first_page = p;
            }
            if let Some(p) = last_page {
                config.pipeline.last_page = p;
            }
            config.validate()?;

            let _t = utils::Timer::start("Crawl");
            let pages = config.pipeline.first_page..=config.pipeline.last_page;
            let stats = Pipeline::from_config(&config, shutdown)?.run(pages).await;
            info!(
                "Done: {} accepted, {} rejected, {} financial, {} errors",
                stats.accepted, stats.rejected, stats.financial, stats.errors
            );
        }

        Command::Stock { url } => {
            let _t = utils::Timer::start("Single stock");
            let pipeline = Pipeline::from_config(&config, shutdown)?;
            match pipeline.process_stock(&url).await? {
                StockOutcome::Accepted {
                    company,
                    cagr,
                    report,
                } => {
                    let cagr = cagr
                        .map(|c| format!("{:.2}%", c))
                        .unwrap_or_else(|| "n/a".to_string());
                    println!("{}: accepted (CAGR {}), report {}", company, cagr, report.display())
                }
                StockOutcome::Rejected { company, reason } => {
                    println!("{}: rejected ({})", company, reason)
                }
                StockOutcome::Financial { company } => {
                    println!("{}: financial sector, not analyzed", company)
                }
            }
        }

        Command::Processed => {
            let ledger = ProcessedLedger::new(config.storage.ledger_path());
            println!("─────────────────────────────────");
            println!("  Processed ledger");
            println!("─────────────────────────────────");
            println!("  File   : {}", ledger.path().display());
            println!("  Stocks : {}", ledger.len()?);
            println!("─────────────────────────────────");
        }
    }

    Ok(())
}
