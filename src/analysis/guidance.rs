use super::{calculate_cagr, fmt_amount};
use crate::llm::{extract_json_object, LanguageModel};
use crate::models::{GuidanceInfo, StockInfo};
use tracing::{debug, info, warn};

/// Fiscal year the revenue base refers to; guidance years are measured from it.
const BASE_FISCAL_YEAR: i32 = 2025;

/// Search for guidance, then assess it. `None` when nothing usable turns up.
pub async fn find_guidance(
    llm: &dyn LanguageModel,
    stock: &StockInfo,
    large_cap_crore: f64,
) -> Option<GuidanceInfo> {
    let text = search_guidance(llm, &stock.company_name).await;
    if text.trim().is_empty() {
        info!("No guidance content found for {}", stock.company_name);
        return None;
    }
    analyze_guidance(llm, stock, &text, large_cap_crore).await
}

/// Stage A: open-ended request for management's revenue guidance.
/// Always yields a string; empty when the model returned nothing.
pub async fn search_guidance(llm: &dyn LanguageModel, company_name: &str) -> String {
    let prompt = format!(
        "Revenue guidance of {company_name} by management. Keep it short. \
         Mention either cagr growth or revenue amount guidance.\n\
         Do a web search and try to find some number."
    );
    llm.complete(&prompt).await.unwrap_or_default()
}

/// Stage B: turn free-form guidance into a structured, validated record.
/// Anything short of `isValidGuidance: true` is rejected as `None`.
pub async fn analyze_guidance(
    llm: &dyn LanguageModel,
    stock: &StockInfo,
    guidance_text: &str,
    large_cap_crore: f64,
) -> Option<GuidanceInfo> {
    let prompt = analysis_prompt(stock, guidance_text, large_cap_crore);
    let response = llm.complete(&prompt).await;
    parse_guidance(response.as_deref(), stock)
}

fn parse_guidance(response: Option<&str>, stock: &StockInfo) -> Option<GuidanceInfo> {
    let Some(response) = response else {
        debug!("{}: no guidance analysis returned", stock.company_name);
        return None;
    };

    let mut guidance: GuidanceInfo = match serde_json::from_str(extract_json_object(response)) {
        Ok(g) => g,
        Err(e) => {
            warn!("Error parsing guidance analysis for {}: {}", stock.company_name, e);
            return None;
        }
    };

    if !guidance.is_valid() {
        return None;
    }

    if guidance.cagr.is_none_or(|c| c <= 0.0) {
        if let Some(derived) = derive_cagr(&guidance, stock) {
            debug!(
                "{}: derived CAGR {:.2}% from revenue target",
                stock.company_name, derived
            );
            guidance.cagr = Some(derived);
        }
    }

    Some(guidance)
}

/// CAGR implied by an absolute revenue target for a year after the base year.
fn derive_cagr(guidance: &GuidanceInfo, stock: &StockInfo) -> Option<f64> {
    let target = guidance.guidance_revenue?;
    let years = u32::try_from(guidance.guidance_year? - BASE_FISCAL_YEAR).ok()?;
    calculate_cagr(stock.base_revenue()?, target, years)
}

fn analysis_prompt(stock: &StockInfo, guidance_text: &str, large_cap_crore: f64) -> String {
    format!(
        r#"Analyze the following guidance content for {name} and extract guidance information:
FY2025 Revenue: ₹{fy25} crore
Current Revenue: ₹{current} crore
Market cap: ₹{market_cap} crore

Try to find only one of the things below; if neither is there, mark the guidance as invalid.
1. CAGR growth mentioned in the text. Prefer post-2025 CAGR growth. If not there, check point 2.
2. Revenue guidance as a number, e.g. '₹800 crore' or '800 crores'. Compare it with the current revenue and calculate the CAGR.

Guidance Content:
{guidance_text}

Extract and return in JSON format:
{{
    "cagr": stated growth percentage, otherwise calculated from current revenue and the guidance amount, 0 if no guidance found,
    "guidanceYear": fiscal_year_the_guidance_targets_or_null,
    "guidanceRevenue": absolute_revenue_target_in_crores_or_null,
    "guidanceText": "brief_summary_of_guidance",
    "isValidGuidance": true_or_false
}}

Rules:
- Guidance amount should be in crores
- Set isValidGuidance to false if no clear revenue guidance found
- Set isValidGuidance to false if market cap is more than {large_cap} crores

Example, only to show the expected shape:
if the Guidance Content is 'Yatharth Hospital & Trauma Care Services Ltd's management has indicated a target of **30-35% revenue CAGR** over the medium term (typically 3-5 years).'
{{
    "cagr": 35,
    "guidanceYear": null,
    "guidanceRevenue": null,
    "guidanceText": "management has indicated a target of **30-35% revenue CAGR** over the medium term (typically 3-5 years)",
    "isValidGuidance": true
}}

Return only valid JSON without additional text."#,
        name = stock.company_name,
        fy25 = fmt_amount(stock.fy2025_revenue),
        current = fmt_amount(stock.current_revenue),
        market_cap = fmt_amount(stock.market_cap),
        large_cap = large_cap_crore,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    fn acme() -> StockInfo {
        StockInfo {
            sector: "Healthcare".to_string(),
            current_revenue: Some(450.0),
            market_cap: Some(4200.0),
            fy2025_revenue: Some(500.0),
            ..StockInfo::named("Acme Hospitals")
        }
    }

    #[test]
    fn explicit_false_is_rejected_even_with_cagr() {
        let response = r#"{"cagr":35,"isValidGuidance":false,"guidanceText":"30-35%"}"#;
        assert_eq!(parse_guidance(Some(response), &acme()), None);
    }

    #[test]
    fn unparseable_or_missing_output_is_rejected() {
        assert_eq!(parse_guidance(Some("no idea"), &acme()), None);
        assert_eq!(parse_guidance(Some("{\"cagr\": }"), &acme()), None);
        assert_eq!(parse_guidance(None, &acme()), None);
        assert_eq!(parse_guidance(Some(r#"{"cagr":35}"#), &acme()), None);
    }

    #[test]
    fn stated_cagr_is_kept() {
        let response = "Sure!\n```json\n{\"cagr\":35,\"guidanceYear\":null,\"guidanceText\":\"30-35% CAGR\",\"isValidGuidance\":true}\n```";
        let g = parse_guidance(Some(response), &acme()).unwrap();
        assert_eq!(g.cagr, Some(35.0));
        assert_eq!(g.guidance_year, None);
        assert_eq!(g.guidance_text, "30-35% CAGR");
    }

    #[test]
    fn revenue_target_yields_derived_cagr() {
        let response = r#"{"cagr":0,"guidanceYear":2028,"guidanceRevenue":800,"guidanceText":"₹800 crore by FY28","isValidGuidance":true}"#;
        let g = parse_guidance(Some(response), &acme()).unwrap();
        let cagr = g.cagr.unwrap();
        assert!((cagr - 16.96).abs() < 0.01, "cagr was {cagr}");
    }

    #[test]
    fn target_without_future_year_leaves_cagr_alone() {
        let response = r#"{"guidanceYear":2025,"guidanceRevenue":800,"guidanceText":"x","isValidGuidance":true}"#;
        let g = parse_guidance(Some(response), &acme()).unwrap();
        assert_eq!(g.cagr, None);
    }

    #[tokio::test]
    async fn empty_search_skips_analysis() {
        let llm = ScriptedModel::replying(None);
        assert_eq!(find_guidance(&llm, &acme(), 50_000.0).await, None);
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn search_text_flows_into_analysis() {
        let llm = ScriptedModel::new(|prompt| {
            if prompt.starts_with("Revenue guidance of") {
                Some("Management targets 25% CAGR through FY28.".to_string())
            } else {
                Some(r#"{"cagr":25,"guidanceYear":2028,"guidanceText":"25% CAGR","isValidGuidance":true}"#.to_string())
            }
        });

        let g = find_guidance(&llm, &acme(), 50_000.0).await.unwrap();
        assert_eq!(g.cagr, Some(25.0));

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Acme Hospitals"));
        assert!(prompts[1].contains("Management targets 25% CAGR through FY28."));
        assert!(prompts[1].contains("FY2025 Revenue: ₹500 crore"));
        assert!(prompts[1].contains("Market cap: ₹4200 crore"));
        assert!(prompts[1].contains("more than 50000 crores"));
    }
}
