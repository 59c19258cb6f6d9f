pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::SiteConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use url::Url;

use self::http_client::{FetchError, HttpClient};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Raw page retrieval. Parsing happens elsewhere.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await
    }
}

// ── screener.in layout ────────────────────────────────────────────────────────

/// URL layout of the listing site: paginated index pages linking to
/// per-company detail pages.
pub struct ScreenerSite {
    base: Url,
    base_url: String,
    index_id: String,
    excluded: Vec<String>,
}

impl ScreenerSite {
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .with_context(|| format!("Invalid site base URL {}", config.base_url))?;

        // Pagination anchors point back at the index itself.
        let mut excluded = config.excluded_fragments.clone();
        excluded.push(config.index_id.clone());

        Ok(Self {
            base,
            base_url,
            index_id: config.index_id.clone(),
            excluded,
        })
    }

    /// URL for one page of the index listing. e.g. /company/NFMICRO250/?page=3
    pub fn listing_url(&self, page: u32) -> String {
        format!("{}/company/{}/?page={}", self.base_url, self.index_id, page)
    }

    /// Canonical detail-page links found on a listing page.
    pub fn detail_links(&self, listing_html: &str) -> Vec<String> {
        parsers::extract_links(listing_html, &self.base, &self.excluded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_urls_follow_the_index_pagination() {
        let site = ScreenerSite::new(&SiteConfig {
            base_url: "https://www.screener.in/".to_string(),
            ..SiteConfig::default()
        })
        .unwrap();
        assert_eq!(
            site.listing_url(3),
            "https://www.screener.in/company/NFMICRO250/?page=3"
        );
    }

    #[test]
    fn index_self_links_are_never_detail_links() {
        let site = ScreenerSite::new(&SiteConfig::default()).unwrap();
        let html = r#"<a href="/company/NFMICRO250/?page=2">2</a><a href="/company/ACME/">Acme</a>"#;
        assert_eq!(
            site.detail_links(html),
            vec!["https://www.screener.in/company/ACME/consolidated/"]
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let cfg = SiteConfig {
            base_url: "not a url".to_string(),
            ..SiteConfig::default()
        };
        assert!(ScreenerSite::new(&cfg).is_err());
    }
}
