// src/drivers/salary.rs
//! Salary text normalization

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::types::{Salary, SalaryPeriod};
use crate::utils::clean_text;

const AMOUNT: &str = r"(\d[\d,]*(?:\.\d+)?)";

fn hourly_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)([$€£])\s?{0}(?:\s*(?:-|–|to)\s*[$€£]?\s?{0})?\s*(?:/\s*|per\s+|an\s+|a\s+)(?:hr|hour)\b",
            AMOUNT
        ))
        .ok()
    })
    .as_ref()
}

fn range_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)([$€£])\s?{0}\s*(k)?\s*(?:-|–|to)\s*[$€£]?\s?{0}\s*(k)?",
            AMOUNT
        ))
        .ok()
    })
    .as_ref()
}

fn single_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(r"(?i)([$€£])\s?{0}\s*(k)?", AMOUNT)).ok()
    })
    .as_ref()
}

fn currency(symbol: &str) -> Option<String> {
    let code = match symbol {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        _ => return None,
    };
    Some(code.to_string())
}

fn amount(caps: &Captures<'_>, index: usize) -> Option<f64> {
    caps.get(index)?.as_str().replace(',', "").parse().ok()
}

fn period_hint(lower: &str) -> Option<SalaryPeriod> {
    if lower.contains("hour") || lower.contains("/hr") {
        Some(SalaryPeriod::Hour)
    } else if lower.contains("day") {
        Some(SalaryPeriod::Day)
    } else if lower.contains("month") || lower.contains("/mo") {
        Some(SalaryPeriod::Month)
    } else if lower.contains("year") || lower.contains("/yr") || lower.contains("annum") {
        Some(SalaryPeriod::Year)
    } else if lower.contains("fixed") || lower.contains("budget") {
        Some(SalaryPeriod::Project)
    } else {
        None
    }
}

/// Normalize a salary label.
///
/// Recognized: hourly rates (`$45/hr`, `$30 - $40 an hour`) and ranges with an
/// optional `k` suffix (`$80k - $100k`, `$90,000 - $120,000`). Anything else
/// non-empty is kept as free text only.
pub fn parse_salary(raw: &str) -> Option<Salary> {
    let text = clean_text(raw);
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    if let Some(caps) = hourly_pattern().and_then(|p| p.captures(&text)) {
        let min = amount(&caps, 2);
        return Some(Salary {
            min,
            max: amount(&caps, 3).or(min),
            currency: currency(&caps[1]),
            period: Some(SalaryPeriod::Hour),
            text: Some(text),
        });
    }

    if let Some(caps) = range_pattern().and_then(|p| p.captures(&text)) {
        let high_k = caps.get(5).is_some();
        let low_k = caps.get(3).is_some();
        let mut min = amount(&caps, 2);
        let mut max = amount(&caps, 4);
        // "$80-100k" puts one suffix on both ends
        if high_k {
            max = max.map(|v| v * 1000.0);
            if low_k || min.is_some_and(|v| v < 1000.0) {
                min = min.map(|v| v * 1000.0);
            }
        } else if low_k {
            min = min.map(|v| v * 1000.0);
        }
        let period = period_hint(&lower).or_else(|| {
            max.filter(|v| *v >= 10_000.0)
                .map(|_| SalaryPeriod::Year)
        });
        return Some(Salary {
            min,
            max,
            currency: currency(&caps[1]),
            period,
            text: Some(text),
        });
    }

    if let Some(caps) = single_pattern().and_then(|p| p.captures(&text)) {
        let mut value = amount(&caps, 2);
        if caps.get(3).is_some() {
            value = value.map(|v| v * 1000.0);
        }
        let period = period_hint(&lower).or_else(|| {
            value.filter(|v| *v >= 10_000.0)
                .map(|_| SalaryPeriod::Year)
        });
        return Some(Salary {
            min: value,
            max: value,
            currency: currency(&caps[1]),
            period,
            text: Some(text),
        });
    }

    Some(Salary::free_text(text))
}

/// Build a salary from already-numeric API fields
pub fn from_bounds(
    min: Option<f64>,
    max: Option<f64>,
    currency_code: Option<&str>,
    period: Option<SalaryPeriod>,
) -> Option<Salary> {
    let min = min.filter(|v| *v > 0.0);
    let max = max.filter(|v| *v > 0.0);
    if min.is_none() && max.is_none() {
        return None;
    }
    Some(Salary {
        min,
        max,
        currency: currency_code.map(|c| c.to_uppercase()),
        period,
        text: None,
    })
}
