//! Crawl orchestrator: listing pages → detail pages → analysis → reports.
//!
//! ## Flow
//!
//! For every listing page in the configured range:
//!   1. Fetch the listing and pull out canonical detail links.
//!   2. Re-read the processed ledger (it grows while the run goes on).
//!   3. For each link not yet in the ledger, run the per-stock stages one at a
//!      time: detail fetch → stock facts → sector screen → guidance → report.
//!   4. Record the link in the ledger, then pause before the next stock.
//!
//! Nothing runs concurrently; the pauses and the model gateway's own jitter
//! keep both the listing site and the model API under their rate limits.
//! Errors stay local to the page or stock that raised them.
//!
//! ## Ledger policy
//!
//! `FailurePolicy::SkipForever` records every attempted link, so a broken
//! page is tried once and never again. `FailurePolicy::RetryTransient` keeps
//! links that failed on a transient fetch error out of the ledger so the next
//! run picks them up. A stock interrupted by shutdown is never recorded.

use crate::analysis::{extract_stock_info, find_guidance, is_financial};
use crate::config::{AppConfig, FailurePolicy, PipelineConfig};
use crate::llm::{GeminiClient, LanguageModel};
use crate::models::{GuidanceInfo, StockOutcome};
use crate::scraper::http_client::{FetchError, HttpClient};
use crate::scraper::{PageSource, ScreenerSite};
use crate::storage::{ProcessedLedger, ReportWriter};
use crate::utils::pause;
use anyhow::{Context, Result};
use colored::Colorize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StockError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to write report: {0}")]
    Report(String),

    #[error("shutdown requested")]
    Cancelled,
}

impl StockError {
    fn is_transient(&self) -> bool {
        match self {
            StockError::Fetch(e) => e.is_transient(),
            StockError::Report(_) => false,
            StockError::Cancelled => true,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    site: ScreenerSite,
    pages: Arc<dyn PageSource>,
    llm: Arc<dyn LanguageModel>,
    ledger: ProcessedLedger,
    reports: ReportWriter,
    shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        pages: Arc<dyn PageSource>,
        llm: Arc<dyn LanguageModel>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            config: config.pipeline.clone(),
            site: ScreenerSite::new(&config.site)?,
            pages,
            llm,
            ledger: ProcessedLedger::new(config.storage.ledger_path()),
            reports: ReportWriter::new(&config.storage.output_dir),
            shutdown,
        })
    }

    /// Wire up the live HTTP fetcher and model gateway.
    pub fn from_config(config: &AppConfig, shutdown: CancellationToken) -> Result<Self> {
        let pages = HttpClient::new(&config.site).context("Failed to build page fetcher")?;
        let llm = GeminiClient::new(&config.llm, shutdown.clone())
            .context("Failed to build LLM client")?;
        Self::new(config, Arc::new(pages), Arc::new(llm), shutdown)
    }

    /// Crawl every listing page in `pages`. Page and stock failures are logged
    /// and counted; the loop always moves on.
    pub async fn run(&self, pages: RangeInclusive<u32>) -> PipelineStats {
        let mut stats = PipelineStats::default();
        let page_delay = Duration::from_secs(self.config.page_delay_secs);

        for page in pages {
            if self.shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.process_page(page, &mut stats).await {
                if self.shutdown.is_cancelled() {
                    break;
                }
                warn!("Error processing page {}: {:#}", page, e);
                stats.errors += 1;
            }

            if !pause(&self.shutdown, page_delay).await {
                break;
            }
        }

        if self.shutdown.is_cancelled() {
            warn!("Run interrupted by shutdown");
        }
        info!(
            "=== Done: {} pages | {} links | {} already processed | {} financial | {} accepted | {} rejected | {} errors ===",
            stats.pages,
            stats.links_seen,
            stats.already_processed,
            stats.financial,
            stats.accepted,
            stats.rejected,
            stats.errors,
        );
        stats
    }

    async fn process_page(&self, page: u32, stats: &mut PipelineStats) -> Result<()> {
        let url = self.site.listing_url(page);
        info!("Processing page {} ({})", page, url);

        let html = self
            .fetch(&url)
            .await
            .with_context(|| format!("Failed to fetch listing page {}", page))?;

        let links = self.site.detail_links(&html);
        stats.pages += 1;
        stats.links_seen += links.len();
        info!("  Page {}: {} detail links", page, links.len());

        let processed = self.ledger.load()?;
        let stock_delay = Duration::from_secs(self.config.stock_delay_secs);

        for link in links {
            if self.shutdown.is_cancelled() {
                break;
            }
            if processed.contains(&link) {
                info!("Skipping already processed stock: {}", link);
                stats.already_processed += 1;
                continue;
            }

            let record = match self.process_stock(&link).await {
                Ok(outcome) => {
                    stats.record(&outcome);
                    true
                }
                Err(StockError::Cancelled) => {
                    info!("Shutdown while processing {}, leaving it for the next run", link);
                    break;
                }
                Err(e) => {
                    warn!("Error processing stock {}: {}", link, e);
                    stats.errors += 1;
                    self.config.failure_policy == FailurePolicy::SkipForever || !e.is_transient()
                }
            };

            if record {
                self.ledger.append(&link)?;
            } else {
                info!("{} kept out of the ledger for a later retry", link);
            }

            if !pause(&self.shutdown, stock_delay).await {
                break;
            }
        }

        Ok(())
    }

    /// Run the per-stock stages for one detail page. The ledger is not
    /// consulted or updated here.
    pub async fn process_stock(&self, url: &str) -> Result<StockOutcome, StockError> {
        info!("Processing stock: {}", url);

        let html = self.fetch(url).await?;
        let llm = self.llm.as_ref();

        let stock = extract_stock_info(llm, &html, url).await;
        self.ensure_running()?;

        let financial = is_financial(llm, &stock).await;
        self.ensure_running()?;
        if financial {
            info!("Skipping {} - Bank/Financial sector", stock.company_name);
            return Ok(StockOutcome::Financial {
                company: stock.company_name,
            });
        }

        let guidance = find_guidance(llm, &stock, self.config.large_cap_crore).await;
        self.ensure_running()?;

        let guidance = match guidance {
            Some(g) => g,
            None => return Ok(self.reject(stock.company_name, "no valid guidance found")),
        };
        if let Err(reason) = self.acceptance(&guidance) {
            return Ok(self.reject(stock.company_name, &reason));
        }

        let report = self
            .reports
            .write(&stock, &guidance, url)
            .map_err(|e| StockError::Report(format!("{:#}", e)))?;

        let cagr = guidance
            .cagr
            .map(|c| format!("{:.2}%", c))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{}",
            format!("✓ Created report for {} (CAGR: {})", stock.company_name, cagr).green()
        );

        Ok(StockOutcome::Accepted {
            company: stock.company_name,
            cagr: guidance.cagr,
            report,
        })
    }

    /// Validity is required; a CAGR floor applies only when configured.
    fn acceptance(&self, guidance: &GuidanceInfo) -> Result<(), String> {
        if !guidance.is_valid() {
            return Err("guidance not marked valid".to_string());
        }
        match (self.config.min_cagr_percent, guidance.cagr) {
            (None, _) => Ok(()),
            (Some(min), Some(cagr)) if cagr >= min => Ok(()),
            (Some(min), Some(cagr)) => Err(format!("CAGR {:.2}% below {:.2}%", cagr, min)),
            (Some(min), None) => Err(format!("no CAGR to compare against {:.2}%", min)),
        }
    }

    fn reject(&self, company: String, reason: &str) -> StockOutcome {
        info!("✗ Skipped {} - {}", company, reason);
        StockOutcome::Rejected {
            company,
            reason: reason.to_string(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, StockError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(StockError::Cancelled),
            page = self.pages.fetch(url) => page.map_err(StockError::from),
        }
    }

    fn ensure_running(&self) -> Result<(), StockError> {
        if self.shutdown.is_cancelled() {
            Err(StockError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    pub pages: usize,
    pub links_seen: usize,
    pub already_processed: usize,
    pub financial: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub errors: usize,
}

impl PipelineStats {
    fn record(&mut self, outcome: &StockOutcome) {
        match outcome {
            StockOutcome::Financial { .. } => self.financial += 1,
            StockOutcome::Rejected { .. } => self.rejected += 1,
            StockOutcome::Accepted { .. } => self.accepted += 1,
        }
    }
}
