use super::cleaner::{element_text, squash_whitespace};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Span captions that mark a list item as part of the key-ratio block.
const RATIO_KEYWORDS: [&str; 4] = ["Sales", "Revenue", "Market Cap", "Sector"];

fn selector(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

// ── Listing page ──────────────────────────────────────────────────────────────

/// Company detail links on a listing page, in document order, deduplicated.
/// Every link has the canonical `<origin>/company/<TICKER>/consolidated/` form.
pub fn extract_links(html: &str, base: &Url, excluded: &[String]) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(a_sel) = selector("a[href]") else {
        return vec![];
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for a in doc.select(&a_sel) {
        let Some(href) = a.value().attr("href") else { continue };
        let Some(link) = canonical_detail_link(href, base) else { continue };

        if excluded.iter().any(|fragment| link.contains(fragment.as_str())) {
            continue;
        }
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

/// Rewrite a `/company/<TICKER>/...` anchor to its consolidated detail URL.
/// Anchors on other hosts or outside `/company/` yield `None`.
pub fn canonical_detail_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    let href = if href.starts_with('/') {
        collapse_slashes(href)
    } else {
        href.to_string()
    };

    let resolved = base.join(&href).ok()?;
    if resolved.host_str() != base.host_str() {
        return None;
    }

    let segments: Vec<&str> = resolved
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        ["company", ticker, ..] if *ticker != "consolidated" => Some(format!(
            "{}/company/{}/consolidated/",
            base.origin().ascii_serialization(),
            ticker
        )),
        _ => None,
    }
}

/// Ticker segment of a detail URL. `.../company/ACME/consolidated/` → `ACME`
pub fn ticker_from_url(url: &str) -> Option<&str> {
    let mut parts = url.split('/').skip_while(|p| *p != "company");
    parts.next()?;
    parts.next().filter(|t| !t.is_empty())
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

// ── Detail page ───────────────────────────────────────────────────────────────

/// Company heading (`<h1>`) of a detail page.
pub fn page_heading(html: &str) -> Option<String> {
    heading(&Html::parse_document(html))
}

fn heading(doc: &Html) -> Option<String> {
    let h1 = selector("h1")?;
    doc.select(&h1)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
}

/// Reduce a detail page to the plain-text excerpt handed to the model:
/// heading, key ratios, market cap, the profit & loss table and the about
/// blurb. Missing sections are skipped.
pub fn extract_content(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut lines: Vec<String> = Vec::new();

    if let Some(name) = heading(&doc) {
        lines.push(format!("Company: {}", name));
    }

    lines.extend(ratio_lines(&doc));

    if let Some(mc) = market_cap(&doc) {
        lines.push(format!("Market Cap: {} Cr", mc));
    }

    lines.extend(profit_loss_lines(&doc));

    if let Some(about) = about_text(&doc) {
        lines.push(about);
    }

    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    content
}

fn ratio_lines(doc: &Html) -> Vec<String> {
    let (Some(li_sel), Some(span_sel)) = (selector("li"), selector("span")) else {
        return vec![];
    };

    doc.select(&li_sel)
        .filter(|li| {
            let is_ratio = li
                .value()
                .attr("class")
                .is_some_and(|c| c.contains("ratio"));
            is_ratio
                || li.select(&span_sel).any(|span| {
                    let text = span.text().collect::<String>();
                    RATIO_KEYWORDS.iter().any(|k| text.contains(k))
                })
        })
        .map(|li| element_text(&li))
        .filter(|t| !t.is_empty())
        .collect()
}

fn market_cap(doc: &Html) -> Option<String> {
    let li_sel = selector("li")?;
    let name_sel = selector("span.name")?;
    let number_sel = selector("span[class*='number']")?;

    doc.select(&li_sel)
        .find(|li| {
            li.select(&name_sel)
                .any(|n| n.text().collect::<String>().contains("Market Cap"))
        })
        .and_then(|li| li.select(&number_sel).next())
        .map(|n| squash_whitespace(&n.text().collect::<String>()).replace(',', ""))
        .filter(|n| !n.is_empty())
}

fn profit_loss_lines(doc: &Html) -> Vec<String> {
    let Some(section_sel) = selector("section#profit-loss") else {
        return vec![];
    };
    let Some(section) = doc.select(&section_sel).next() else {
        return vec![];
    };

    let mut lines = vec!["=== PROFIT & LOSS SECTION ===".to_string()];

    let Some(table) = selector("table.data-table").and_then(|s| section.select(&s).next()) else {
        return lines;
    };

    if let Some(th_sel) = selector("thead th") {
        let headers: Vec<String> = table.select(&th_sel).map(|th| element_text(&th)).collect();
        if !headers.is_empty() {
            lines.push(format!("Headers: {}", headers.join(" | ")));
        }
    }

    if let (Some(tr_sel), Some(td_sel)) = (selector("tbody tr"), selector("td")) {
        for tr in table.select(&tr_sel) {
            let cells: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
            if !cells.is_empty() {
                lines.push(cells.join(" | "));
            }
        }
    }

    lines
}

/// Row captions carry an expander glyph ("Sales +"); keep the caption only.
fn cell_text(td: ElementRef<'_>) -> String {
    let text = element_text(&td);
    text.trim_end_matches('+').trim_end().to_string()
}

fn about_text(doc: &Html) -> Option<String> {
    let sel = selector("div[class*='about']")?;
    doc.select(&sel)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
