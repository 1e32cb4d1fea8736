// src/drivers/extract.rs
//! Listing extraction helpers shared by the platform drivers

use scraper::{ElementRef, Html, Selector};

use crate::error::ScoutError;
use crate::types::{Job, JobType, Platform};
use crate::utils::{clean_text, contains_word};

/// Turns one fetched listing page (HTML or JSON) into canonical records
pub trait PageExtractor: Send + Sync {
    fn platform(&self) -> Platform;

    fn extract(&self, body: &str) -> Result<Vec<Job>, ScoutError>;
}

/// Parse a list of selectors, failing loudly on the first invalid one
pub fn selectors(platform: Platform, sources: &[&str]) -> Result<Vec<Selector>, ScoutError> {
    sources
        .iter()
        .map(|source| {
            Selector::parse(source)
                .map_err(|e| ScoutError::parse(platform, format!("bad selector {}: {}", source, e)))
        })
        .collect()
}

pub fn selector(platform: Platform, source: &str) -> Result<Selector, ScoutError> {
    Selector::parse(source)
        .map_err(|e| ScoutError::parse(platform, format!("bad selector {}: {}", source, e)))
}

pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// First non-empty text matched by any selector, tried in order
pub fn find_text_by_selectors(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    for selector in selectors {
        for element in scope.select(selector) {
            let text = element_text(element);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First non-empty value of `attr` on an element matched by any selector
pub fn find_attr_by_selectors(scope: ElementRef<'_>, selectors: &[Selector], attr: &str) -> Option<String> {
    for selector in selectors {
        for element in scope.select(selector) {
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Matches of `selector` that are not nested inside another match
pub fn outermost_matches<'a>(document: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    document
        .select(selector)
        .filter(|element| {
            !element
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|ancestor| selector.matches(&ancestor))
        })
        .collect()
}

/// Every non-empty text under `selector`, in document order
pub fn all_texts(scope: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    scope
        .select(selector)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// Bullet points of an HTML description, used as the requirement list
pub fn list_items(html: &str, limit: usize) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let Ok(item) = Selector::parse("li") else {
        return Vec::new();
    };
    fragment
        .select(&item)
        .map(element_text)
        .filter(|text| !text.is_empty())
        .take(limit)
        .collect()
}

/// Trailing run of digits in a URL path, the usual home of a listing id
pub fn trailing_id(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url).trim_end_matches('/');
    let digits: String = path
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    (!digits.is_empty()).then_some(digits)
}

/// Engagement type named in free text such as a title or attribute chip
pub fn infer_job_type(text: &str) -> Option<JobType> {
    const LABELS: &[(&str, JobType)] = &[
        ("freelance", JobType::Freelance),
        ("contract", JobType::Contract),
        ("contractor", JobType::Contract),
        ("part-time", JobType::PartTime),
        ("part time", JobType::PartTime),
        ("temporary", JobType::Temporary),
        ("internship", JobType::Temporary),
        ("full-time", JobType::FullTime),
        ("full time", JobType::FullTime),
    ];
    LABELS
        .iter()
        .find(|(label, _)| contains_word(text, label))
        .map(|(_, job_type)| *job_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <div class="card">
            <h3 class="title">
                Senior QA
                Engineer
            </h3>
            <span class="empty"> </span>
            <span class="company">Acme</span>
            <a class="link" href="https://example.com/jobs/123">view</a>
        </div>"#;

    #[test]
    fn test_find_text_skips_empty_matches() {
        let document = Html::parse_fragment(CARD);
        let sels = selectors(Platform::LinkedIn, &[".missing", ".empty", ".company"]).unwrap();
        assert_eq!(
            find_text_by_selectors(document.root_element(), &sels),
            Some("Acme".to_string())
        );
        let title = selectors(Platform::LinkedIn, &[".title"]).unwrap();
        assert_eq!(
            find_text_by_selectors(document.root_element(), &title),
            Some("Senior QA Engineer".to_string())
        );
    }

    #[test]
    fn test_find_attr() {
        let document = Html::parse_fragment(CARD);
        let sels = selectors(Platform::LinkedIn, &["a.link"]).unwrap();
        assert_eq!(
            find_attr_by_selectors(document.root_element(), &sels, "href"),
            Some("https://example.com/jobs/123".to_string())
        );
    }

    #[test]
    fn test_invalid_selector_is_parse_error() {
        let err = selector(Platform::Indeed, "div[[").unwrap_err();
        assert!(matches!(err, ScoutError::Parse { .. }));
    }

    #[test]
    fn test_outermost_matches_skips_nested() {
        let html = Html::parse_document(
            r#"<div class="card" id="a"><div class="card" id="b"></div></div><div class="card" id="c"></div>"#,
        );
        let sel = Selector::parse("div.card").unwrap();
        let ids: Vec<&str> = outermost_matches(&html, &sel)
            .iter()
            .filter_map(|e| e.value().attr("id"))
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_list_items() {
        let items = list_items("<ul><li>Selenium</li><li> </li><li>Cypress</li><li>API</li></ul>", 2);
        assert_eq!(items, vec!["Selenium", "Cypress"]);
    }

    #[test]
    fn test_infer_job_type() {
        assert_eq!(infer_job_type("QA Engineer (Contract, 6 months)"), Some(JobType::Contract));
        assert_eq!(infer_job_type("Part-time manual tester"), Some(JobType::PartTime));
        assert_eq!(infer_job_type("Senior SDET"), None);
    }

    #[test]
    fn test_trailing_id() {
        assert_eq!(
            trailing_id("https://www.linkedin.com/jobs/view/qa-engineer-at-acme-3912345678/?refId=x"),
            Some("3912345678".to_string())
        );
        assert_eq!(trailing_id("https://example.com/jobs/qa"), None);
    }
}
