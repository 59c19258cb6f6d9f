use crate::llm::LanguageModel;
use crate::models::StockInfo;

/// Whether the company is a bank, NBFC, insurer or other financial-services
/// business. Anything but a clear "true" counts as non-financial, so an
/// unsure or silent model never blocks a stock.
pub async fn is_financial(llm: &dyn LanguageModel, info: &StockInfo) -> bool {
    let prompt = format!(
        r#"Analyze if the following company belongs to banking or financial services sector:

Company Name: {}
Sector: {}

Return only 'true' if it's a bank, NBFC, insurance company, mutual fund, or any other financial services company.
Return only 'false' if it's not from financial sector.

Response should be only 'true' or 'false' without any additional text."#,
        info.company_name, info.sector
    );

    is_financial_answer(llm.complete(&prompt).await.as_deref())
}

fn is_financial_answer(response: Option<&str>) -> bool {
    response.is_some_and(|r| r.trim().eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    #[test]
    fn only_a_bare_true_is_financial() {
        assert!(is_financial_answer(Some("true")));
        assert!(is_financial_answer(Some("  TRUE\n")));
        assert!(!is_financial_answer(Some("True.")));
        assert!(!is_financial_answer(Some("yes")));
        assert!(!is_financial_answer(Some("")));
        assert!(!is_financial_answer(Some("false")));
        assert!(!is_financial_answer(None));
    }

    #[tokio::test]
    async fn prompt_names_company_and_sector() {
        let llm = ScriptedModel::replying(Some("true"));
        let info = StockInfo {
            sector: "Finance - NBFC".to_string(),
            ..StockInfo::named("Acme Capital")
        };

        assert!(is_financial(&llm, &info).await);
        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Company Name: Acme Capital"));
        assert!(prompt.contains("Sector: Finance - NBFC"));
    }
}
