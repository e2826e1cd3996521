use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::error::{Result, ScrapeError};

// Two-digit year variants first: chrono's %Y also accepts "19" as year 19.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m-%d-%y",
    "%b %d, %y",
    "%d-%b-%y",
    "%m/%d/%Y",
    "%Y-%m-%d",
    "%m-%d-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d-%b-%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%y %I:%M:%S %p",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Anything earlier came from a short year slipping through a `%Y` pattern.
const MIN_YEAR: i32 = 1000;

/// Strip the currency symbol, thousands separators and accounting parentheses.
///
/// `"$1,234.56"` becomes `"1234.56"` and `"($50.00)"` becomes `"50.00"`.
/// Parenthesized amounts keep only their magnitude; the portal's sign
/// convention for them is unconfirmed.
pub fn normalize(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
    let cleaned = cleaned.trim();
    match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => inner.trim().to_string(),
        None => cleaned.to_string(),
    }
}

/// Normalize a money cell and parse it as an exact decimal. Blank cells are `None`.
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>> {
    let cleaned = normalize(raw);
    if cleaned.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(&cleaned)
        .map(Some)
        .map_err(|e| ScrapeError::Parse(format!("bad amount {:?}: {}", raw, e)))
}

/// Parse the free-text due date column.
pub fn parse_due_date(raw: &str) -> Result<NaiveDate> {
    let text = raw.trim();
    let plausible = |d: &NaiveDate| d.year() >= MIN_YEAR;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok().filter(plausible))
        .or_else(|| {
            DATETIME_FORMATS.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(text, fmt)
                    .ok()
                    .map(|dt| dt.date())
                    .filter(plausible)
            })
        })
        .ok_or_else(|| ScrapeError::DateParse(raw.to_string()))
}
