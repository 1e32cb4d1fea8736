// src/utils.rs
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use scraper::Html;
use url::Url;

/// Collapse whitespace and blank lines into single spaces
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain text of an HTML fragment
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    clean_text(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

/// Lowercased, trimmed form used for keys and comparisons
pub fn normalize_key(value: &str) -> String {
    clean_text(value).to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive occurrences of `term` bounded by non-word characters.
///
/// Boundaries are checked by hand so terms such as `C++` or `.NET` still
/// match, and adjacent occurrences are all counted.
pub fn count_word_occurrences(haystack: &str, term: &str) -> usize {
    let term = term.trim();
    if term.is_empty() {
        return 0;
    }
    let pattern = match Regex::new(&format!("(?i){}", regex::escape(term))) {
        Ok(pattern) => pattern,
        Err(_) => return 0,
    };
    pattern
        .find_iter(haystack)
        .filter(|m| {
            let before = haystack[..m.start()].chars().next_back();
            let after = haystack[m.end()..].chars().next();
            let starts_clean = before.map_or(true, |c| !is_word_char(c))
                || !term.chars().next().is_some_and(is_word_char);
            let ends_clean = after.map_or(true, |c| !is_word_char(c))
                || !term.chars().next_back().is_some_and(is_word_char);
            starts_clean && ends_clean
        })
        .count()
}

pub fn contains_word(haystack: &str, term: &str) -> bool {
    count_word_occurrences(haystack, term) > 0
}

/// Resolve `href` against `base`, keeping only absolute HTTP(S) results
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(_) => return None,
    };
    match resolved.scheme() {
        "http" | "https" if resolved.host().is_some() => Some(resolved.to_string()),
        _ => None,
    }
}

/// Best-effort parse of the date formats platforms publish
pub fn parse_posted_date(raw: &str) -> Option<DateTime<Utc>> {
    parse_posted_date_at(raw, Utc::now())
}

pub fn parse_posted_date_at(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|d| Utc.from_utc_datetime(&d));
    }
    if let Ok(seconds) = text.parse::<i64>() {
        return Utc.timestamp_opt(seconds, 0).single();
    }

    parse_relative_date(text, now)
}

fn parse_relative_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.to_lowercase();
    if lower.contains("just now") || lower.contains("today") || lower.contains("just posted") {
        return Some(now);
    }
    if lower.contains("yesterday") {
        return Duration::try_days(1).and_then(|d| now.checked_sub_signed(d));
    }

    let relative = Regex::new(r"(\d+|an?)\+?\s*(second|minute|min|hour|hr|day|week|month|year)s?\s+ago").ok()?;
    let caps = relative.captures(&lower)?;
    let amount: i64 = match &caps[1] {
        "a" | "an" => 1,
        digits => digits.parse().ok()?,
    };
    // Out-of-range amounts yield no date
    let delta = match &caps[2] {
        "second" => Duration::try_seconds(amount),
        "minute" | "min" => Duration::try_minutes(amount),
        "hour" | "hr" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        "week" => Duration::try_weeks(amount),
        "month" => amount.checked_mul(30).and_then(Duration::try_days),
        "year" => amount.checked_mul(365).and_then(Duration::try_days),
        _ => None,
    }?;
    now.checked_sub_signed(delta)
}

/// First `max` characters, respecting char boundaries
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
