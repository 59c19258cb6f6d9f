use crate::scraper::cleaner::{parse_amount, parse_year};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::PathBuf;

// ── Stock record ──────────────────────────────────────────────────────────────

/// Financial facts pulled from one detail page. Amounts are in crore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub company_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sector: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub current_revenue: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub market_cap: Option<f64>,
    #[serde(
        default,
        rename = "FY2025revenue",
        alias = "fy2025Revenue",
        alias = "fy2025revenue",
        deserialize_with = "lenient_f64"
    )]
    pub fy2025_revenue: Option<f64>,
}

impl StockInfo {
    pub fn named(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            ..Default::default()
        }
    }

    /// Revenue base used for CAGR derivation: FY25 when known, else current.
    pub fn base_revenue(&self) -> Option<f64> {
        self.fy2025_revenue.or(self.current_revenue)
    }
}

// ── Guidance record ───────────────────────────────────────────────────────────

/// Forward guidance as judged by the analysis stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceInfo {
    /// Only a literal JSON `true` lands here as `Some(true)`.
    #[serde(default, deserialize_with = "strict_bool")]
    pub is_valid_guidance: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub guidance_text: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub cagr: Option<f64>,
    #[serde(default, deserialize_with = "lenient_year")]
    pub guidance_year: Option<i32>,
    /// Absolute revenue target in crore, when management gave one.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub guidance_revenue: Option<f64>,
}

impl GuidanceInfo {
    pub fn is_valid(&self) -> bool {
        self.is_valid_guidance == Some(true)
    }
}

// ── Per-stock outcome ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum StockOutcome {
    Financial { company: String },
    Rejected { company: String, reason: String },
    Accepted { company: String, cagr: Option<f64>, report: PathBuf },
}

// ── Lenient field decoding ────────────────────────────────────────────────────

fn lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_amount(&s),
        _ => None,
    })
}

fn lenient_year<'de, D>(d: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(Value::String(s)) => parse_year(&s),
        _ => None,
    })
}

fn lenient_string<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s.trim().to_string(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    })
}

fn strict_bool<'de, D>(d: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Bool(b)) => Some(b),
        _ => None,
    })
}
