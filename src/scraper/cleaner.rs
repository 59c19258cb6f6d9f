// ── Text cleanup ──────────────────────────────────────────────────────────────

/// Collapse every whitespace run (including `&nbsp;`) to a single space.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text content of an element, whitespace-squashed.
pub fn element_text(el: &scraper::ElementRef<'_>) -> String {
    squash_whitespace(&el.text().collect::<String>())
}

// ── Numbers ───────────────────────────────────────────────────────────────────

/// First number in a loosely formatted amount; thousands separators dropped.
/// "₹ 4,578 Cr." → 4578.0 | "30-35%" → 30.0 | "N/A" → None
pub fn parse_amount(s: &str) -> Option<f64> {
    let chars: Vec<char> = s.trim().chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;
    let negative = start > 0
        && chars[start - 1] == '-'
        && (start < 2 || !chars[start - 2].is_ascii_digit());

    let mut digits: String = chars[start..]
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == ',' || **c == '.')
        .filter(|c| **c != ',')
        .collect();
    while digits.ends_with('.') {
        digits.pop();
    }

    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Year from "2028", "FY2028" or "FY28".
pub fn parse_year(s: &str) -> Option<i32> {
    let mut runs = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    if let Some(four) = runs.iter().find(|r| r.len() == 4) {
        return four.parse().ok();
    }
    runs.iter()
        .find(|r| r.len() == 2)
        .and_then(|r| r.parse::<i32>().ok())
        .map(|yy| 2000 + yy)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
