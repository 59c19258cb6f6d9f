use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Target listing site
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Index whose paginated constituent list is crawled.
    #[serde(default = "default_index_id")]
    pub index_id: String,

    /// Path fragments that mark non-company anchors on listing pages.
    #[serde(default = "default_excluded_fragments")]
    pub excluded_fragments: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Generative text API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_key", skip_serializing)]
    pub api_key: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Lower bound of the jittered pause taken before every call.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// What happens to the ledger when a stock fails part-way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record every attempted URL, success or not. A broken page is tried once.
    #[default]
    SkipForever,
    /// Leave URLs that failed on a transient fetch error out of the ledger.
    RetryTransient,
}

/// Crawl pacing and acceptance
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_first_page")]
    pub first_page: u32,

    #[serde(default = "default_last_page")]
    pub last_page: u32,

    #[serde(default = "default_stock_delay_secs")]
    pub stock_delay_secs: u64,

    #[serde(default = "default_page_delay_secs")]
    pub page_delay_secs: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Unset keeps acceptance purely on the model's validity flag.
    #[serde(default)]
    pub min_cagr_percent: Option<f64>,

    #[serde(default = "default_large_cap_crore")]
    pub large_cap_crore: f64,
}

/// Output locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_ledger_file")]
    pub ledger_file: String,
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(&self.ledger_file)
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.screener.in".to_string()
}
fn default_index_id() -> String {
    "NFMICRO250".to_string()
}
fn default_excluded_fragments() -> Vec<String> {
    vec!["SMALLCA250".to_string()]
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> usize {
    2
}
fn default_retry_delay_ms() -> u64 {
    1500
}
fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_key() -> String {
    std::env::var("GEMINI_API_KEY").unwrap_or_default()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_min_delay_ms() -> u64 {
    10_000
}
fn default_max_delay_ms() -> u64 {
    20_000
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_first_page() -> u32 {
    1
}
fn default_last_page() -> u32 {
    10
}
fn default_stock_delay_secs() -> u64 {
    60
}
fn default_page_delay_secs() -> u64 {
    2
}
fn default_large_cap_crore() -> f64 {
    50_000.0
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_ledger_file() -> String {
    "processed-stocks.txt".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            index_id: default_index_id(),
            excluded_fragments: default_excluded_fragments(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            api_key: default_api_key(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            first_page: default_first_page(),
            last_page: default_last_page(),
            stock_delay_secs: default_stock_delay_secs(),
            page_delay_secs: default_page_delay_secs(),
            failure_policy: FailurePolicy::default(),
            min_cagr_percent: None,
            large_cap_crore: default_large_cap_crore(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ledger_file: default_ledger_file(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SCOUT").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize()?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.first_page == 0 || self.pipeline.first_page > self.pipeline.last_page {
            bail!(
                "invalid page range {}..={}",
                self.pipeline.first_page,
                self.pipeline.last_page
            );
        }
        if self.llm.min_delay_ms > self.llm.max_delay_ms {
            bail!(
                "llm.min_delay_ms ({}) exceeds llm.max_delay_ms ({})",
                self.llm.min_delay_ms,
                self.llm.max_delay_ms
            );
        }
        Ok(())
    }
}
