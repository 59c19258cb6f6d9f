use crate::analysis::fmt_amount;
use crate::models::{GuidanceInfo, StockInfo};
use crate::scraper::parsers::ticker_from_url;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SOURCE_PREFIX: &str = "Source: ";

/// Characters no portable filename may carry.
const INVALID_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// One text report per accepted company, named after the company.
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the report and return its path. A report for the same source URL
    /// is overwritten; a different company that sanitizes to the same name
    /// gets a ticker suffix instead.
    pub fn write(&self, stock: &StockInfo, guidance: &GuidanceInfo, source_url: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create dir {:?}", self.dir))?;

        let path = self.target_path(&stock.company_name, source_url);
        let report = render_report(stock, guidance, source_url, Local::now().naive_local());

        fs::write(&path, report).with_context(|| format!("Failed to write report {:?}", path))?;
        debug!("Report written to {:?}", path);
        Ok(path)
    }

    fn target_path(&self, company_name: &str, source_url: &str) -> PathBuf {
        let stem = sanitize_file_name(company_name);
        let path = self.dir.join(format!("{}.txt", stem));

        match report_source(&path) {
            Some(existing) if existing != source_url => {
                let suffix = ticker_from_url(source_url)
                    .map(sanitize_file_name)
                    .unwrap_or_else(|| "2".to_string());
                warn!(
                    "{:?} already holds {}, writing {} under a suffixed name",
                    path, existing, source_url
                );
                self.dir.join(format!("{}_{}.txt", stem, suffix))
            }
            _ => path,
        }
    }
}

/// Source URL recorded in an existing report, if any. The source line follows
/// the guidance text, so the last match wins.
fn report_source(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    raw.lines()
        .rev()
        .find_map(|l| l.strip_prefix(SOURCE_PREFIX))
        .map(|s| s.trim().to_string())
}

/// Drop filesystem-invalid characters, joining what remains with `_`.
/// "A/B:C" → "A_B_C"
pub fn sanitize_file_name(name: &str) -> String {
    let joined = name
        .split(|c: char| INVALID_FILENAME_CHARS.contains(&c) || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    if joined.trim().is_empty() {
        "Unknown".to_string()
    } else {
        joined
    }
}

pub fn render_report(
    stock: &StockInfo,
    guidance: &GuidanceInfo,
    source_url: &str,
    generated_at: NaiveDateTime,
) -> String {
    let cagr = guidance
        .cagr
        .map(|c| format!("{:.2}%", c))
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "Company Name: {name}\n\
         \n\
         \n\
         Current Revenue (FY25): ₹{revenue} crore\n\
         Expected CAGR: {cagr}\n\
         \n\
         Guidance Summary: {text}\n\
         \n\
         Growth Analysis:\n\
         {text}\n\
         \n\
         {SOURCE_PREFIX}{source_url}\n\
         Generated on: {at}\n",
        name = stock.company_name,
        revenue = fmt_amount(stock.current_revenue),
        text = guidance.guidance_text,
        at = generated_at.format("%Y-%m-%d %H:%M:%S"),
    )
}
