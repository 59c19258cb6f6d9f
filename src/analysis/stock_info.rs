use crate::llm::{extract_json_object, LanguageModel};
use crate::models::StockInfo;
use crate::scraper::parsers::{extract_content, page_heading};
use tracing::{debug, warn};

/// Structured stock facts for one detail page. Never fails: when the model
/// output cannot be read, the record carries only the page heading (or
/// "Unknown") as the company name.
pub async fn extract_stock_info(llm: &dyn LanguageModel, html: &str, url: &str) -> StockInfo {
    let content = extract_content(html);
    let response = llm.complete(&stock_prompt(&content)).await;

    match parse_stock_info(response.as_deref()) {
        Some(mut info) => {
            if info.company_name.is_empty() {
                info.company_name = fallback_name(html);
            }
            debug!("{}: extracted {:?}", url, info);
            info
        }
        None => {
            warn!("{}: unreadable stock info from model, using page heading", url);
            StockInfo::named(fallback_name(html))
        }
    }
}

fn parse_stock_info(response: Option<&str>) -> Option<StockInfo> {
    let json = extract_json_object(response?);
    match serde_json::from_str(json) {
        Ok(info) => Some(info),
        Err(e) => {
            debug!("stock info JSON rejected: {}", e);
            None
        }
    }
}

fn fallback_name(html: &str) -> String {
    page_heading(html).unwrap_or_else(|| "Unknown".to_string())
}

fn stock_prompt(content: &str) -> String {
    format!(
        r#"Analyze the following stock page content and extract the following information in JSON format:

{{
    "companyName": "company name",
    "sector": "sector/industry",
    "currentRevenue": revenue_in_crores_as_number,
    "marketCap": market_cap_in_crores_as_number,
    "FY2025revenue": revenue_for_fy25_in_crores_as_number
}}

Page Content:
{content}

EXAMPLE FORMAT (DO NOT USE THIS DATA - THIS IS JUST TO SHOW THE TABLE STRUCTURE):
Headers:  | Mar 2023 | Mar 2024 | Mar 2025 | TTM
Sales | 539 | 2,587 | 4,578 | 4,377
In this example, the FY2025 revenue would be 4,578 crores (Mar 2025 column under Sales row).

Return only valid JSON without any additional text or explanation."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    const PAGE: &str = "<h1>Acme Industries Ltd</h1><section id=\"profit-loss\"></section>";
    const URL: &str = "https://www.screener.in/company/ACME/consolidated/";

    #[tokio::test]
    async fn fenced_json_becomes_a_stock_record() {
        let llm = ScriptedModel::replying(Some(
            "```json\n{\"companyName\":\"Acme\",\"sector\":\"Chemicals\",\"currentRevenue\":4377,\"marketCap\":\"48,864\",\"FY2025revenue\":4578}\n```",
        ));
        let info = extract_stock_info(&llm, PAGE, URL).await;

        assert_eq!(info.company_name, "Acme");
        assert_eq!(info.sector, "Chemicals");
        assert_eq!(info.current_revenue, Some(4377.0));
        assert_eq!(info.market_cap, Some(48864.0));
        assert_eq!(info.fy2025_revenue, Some(4578.0));

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Company: Acme Industries Ltd"));
        assert!(prompts[0].contains("=== PROFIT & LOSS SECTION ==="));
    }

    #[tokio::test]
    async fn malformed_output_falls_back_to_heading() {
        let llm = ScriptedModel::replying(Some("Sorry, I can't help with that."));
        let info = extract_stock_info(&llm, PAGE, URL).await;
        assert_eq!(info, StockInfo::named("Acme Industries Ltd"));
    }

    #[tokio::test]
    async fn silent_model_and_headless_page_yield_unknown() {
        let llm = ScriptedModel::replying(None);
        let info = extract_stock_info(&llm, "<p>blank</p>", URL).await;
        assert_eq!(info, StockInfo::named("Unknown"));
    }

    #[tokio::test]
    async fn empty_company_name_is_filled_from_heading() {
        let llm = ScriptedModel::replying(Some(r#"{"companyName":"","sector":"Textiles"}"#));
        let info = extract_stock_info(&llm, PAGE, URL).await;
        assert_eq!(info.company_name, "Acme Industries Ltd");
        assert_eq!(info.sector, "Textiles");
    }
}
