//! Text and number cleaning shared by the dataset loaders.
//!
//! Raw snapshots carry locale noise: thousands separators in prices,
//! parenthetical qualifiers in crop names, stray whitespace in headers.
//! Everything here is pure and allocation-light.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Greedy parenthetical span, e.g. "(Common)" in "Paddy (Common)".
static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*\)").expect("valid regex"));

/// How a query string is compared against a dataset field.
///
/// The static history is curated, so lookups against it are exact. The
/// scraped feed names markets loosely ("Warangal (Enumamula)"), so the
/// forecast pipeline matches by substring instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Case-insensitive equality after trimming.
    Exact,
    /// Case-insensitive substring containment.
    Contains,
}

impl MatchStrategy {
    pub fn matches(&self, field: &str, query: &str) -> bool {
        let field = field.trim().to_lowercase();
        let query = query.trim().to_lowercase();
        match self {
            MatchStrategy::Exact => field == query,
            MatchStrategy::Contains => field.contains(&query),
        }
    }
}

/// Normalize a crop name from the district price history.
///
/// Lower-cases, removes parenthetical qualifiers and the token "common",
/// then trims: "Paddy (Common)" becomes "paddy".
pub fn normalize_crop(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let without_parens = PARENTHETICAL.replace_all(&lower, "");
    without_parens.replace("common", "").trim().to_string()
}

/// Title-case a label the way pandas `str.title` does after a strip: a
/// letter is upper-cased when it follows a non-letter, lower-cased otherwise.
/// " kharif-rabi" -> "Kharif-Rabi".
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut after_letter = false;
    for c in raw.trim().chars() {
        if after_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }
    out
}

/// Parse a decimal that may contain thousands separators ("1,250.50").
///
/// Returns `None` for empty, unparseable or negative values. Those rows are
/// dropped by the loaders rather than coerced to zero.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    let value = Decimal::from_str(&cleaned).ok()?;
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    Some(value)
}

/// Parse a day-month-year date as used by the district price history.
pub fn parse_dmy_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d-%m-%Y").ok()
}

/// Parse a live-feed date. The scraper writes ISO dates; a timestamp or a
/// day-month-year date is also accepted.
pub fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| parse_dmy_date(raw))
}

/// Normalize a live-feed header: trim, strip a BOM, spaces become underscores.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .replace(' ', "_")
}
