// src/drivers/remoteok.rs
//! RemoteOK public JSON API

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::extract::{infer_job_type, list_items, PageExtractor};
use super::fetch::{ContentKind, Fetcher, PageRequest};
use super::remotive::split_regions;
use super::salary::from_bounds;
use super::{fetch_listings, Driver, SearchQuery};
use crate::error::ScoutError;
use crate::retry::RetryPolicy;
use crate::types::{AuthSession, Job, Platform, SalaryPeriod};
use crate::utils::{clean_text, parse_posted_date, resolve_url, strip_html};

const SEARCH_URL: &str = "https://remoteok.com/api";

pub struct RemoteOkDriver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PageExtractor>,
    retry: RetryPolicy,
}

impl RemoteOkDriver {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self::with_extractor(fetcher, Arc::new(RemoteOkExtractor), retry)
    }

    pub fn with_extractor(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn PageExtractor>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            extractor,
            retry,
        }
    }

    /// The API filters on a single tag; the first keyword is used
    pub fn search_url(query: &SearchQuery) -> Result<String, ScoutError> {
        let tag = query
            .keywords
            .split_whitespace()
            .next()
            .map(str::to_lowercase)
            .unwrap_or_default();
        let url = if tag.is_empty() {
            Url::parse(SEARCH_URL)
        } else {
            Url::parse_with_params(SEARCH_URL, &[("tag", tag.as_str())])
        }
        .map_err(|e| ScoutError::parse(Platform::RemoteOk, format!("search url: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Driver for RemoteOkDriver {
    fn platform(&self) -> Platform {
        Platform::RemoteOk
    }

    async fn collect(&self, query: &SearchQuery, _session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError> {
        let request = PageRequest::new(Platform::RemoteOk, Self::search_url(query)?, ContentKind::Json);
        fetch_listings(
            self.fetcher.as_ref(),
            self.extractor.as_ref(),
            &self.retry,
            request,
            query.max_listings,
        )
        .await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Listing {
    id: Option<Value>,
    slug: Option<String>,
    epoch: Option<i64>,
    date: Option<String>,
    company: Option<String>,
    position: Option<String>,
    tags: Vec<String>,
    description: Option<String>,
    location: Option<String>,
    salary_min: Option<f64>,
    salary_max: Option<f64>,
    apply_url: Option<String>,
    url: Option<String>,
}

/// Ids arrive as either strings or numbers
fn listing_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct RemoteOkExtractor;

impl PageExtractor for RemoteOkExtractor {
    fn platform(&self) -> Platform {
        Platform::RemoteOk
    }

    fn extract(&self, body: &str) -> Result<Vec<Job>, ScoutError> {
        let platform = Platform::RemoteOk;
        let entries: Vec<Value> =
            serde_json::from_str(body).map_err(|e| ScoutError::parse(platform, format!("invalid payload: {}", e)))?;

        let mut jobs = Vec::new();
        // first element is the API's legal notice
        for entry in entries.into_iter().skip(1) {
            let listing: Listing = match serde_json::from_value(entry) {
                Ok(listing) => listing,
                Err(e) => {
                    debug!(%platform, "Skipping malformed listing: {}", e);
                    continue;
                }
            };
            let (Some(id), Some(position)) = (listing.id.as_ref().and_then(listing_id), listing.position.as_deref())
            else {
                continue;
            };

            let mut job = Job::new(platform, &id, clean_text(position));
            job.company = listing
                .company
                .as_deref()
                .map(clean_text)
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Confidential".to_string());
            job.is_remote = true;
            if let Some(location) = listing.location.as_deref() {
                let regions = split_regions(location);
                if !regions.is_empty() {
                    job.location = clean_text(location);
                    job.allowed_locations = Some(regions);
                }
            }
            if let Some(html) = listing.description.as_deref() {
                job.requirements = list_items(html, 15);
                job.description = strip_html(html);
            }
            for tag in &listing.tags {
                job.push_skill(tag);
            }
            if let Some(job_type) = infer_job_type(&job.title) {
                job.job_type = job_type;
            }
            job.application_url = listing
                .url
                .as_deref()
                .or(listing.apply_url.as_deref())
                .and_then(|u| resolve_url(platform.base_url(), u))
                .or_else(|| {
                    listing
                        .slug
                        .as_deref()
                        .map(|slug| format!("{}/remote-jobs/{}", platform.base_url(), slug))
                });
            job.salary = from_bounds(listing.salary_min, listing.salary_max, Some("USD"), Some(SalaryPeriod::Year));
            job.posted_date = listing
                .date
                .as_deref()
                .and_then(parse_posted_date)
                .or_else(|| listing.epoch.and_then(|e| parse_posted_date(&e.to_string())));
            jobs.push(job);
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{query, FakeFetcher};
    use super::*;

    const PAYLOAD: &str = r#"[
      {"last_updated": 1717200000, "legal": "API Terms of Service: please link back"},
      {
        "id": "1129876",
        "slug": "remote-qa-automation-engineer-hooli-1129876",
        "epoch": 1717200000,
        "date": "2024-06-01T00:00:00+00:00",
        "company": "Hooli",
        "position": "QA Automation Engineer",
        "tags": ["qa", "cypress", "QA"],
        "description": "<p>Own our test strategy.</p><ul><li>Cypress</li></ul>",
        "location": "Worldwide",
        "salary_min": 60000,
        "salary_max": 90000,
        "url": "https://remoteOK.com/remote-jobs/remote-qa-automation-engineer-hooli-1129876"
      },
      {
        "id": 1129877,
        "company": "Pied Piper",
        "position": "Freelance Tester",
        "tags": [],
        "location": "",
        "salary_min": 0,
        "salary_max": 0,
        "slug": "freelance-tester-1129877"
      },
      {"id": "1129878", "company": "No Title Inc"}
    ]"#;

    #[test]
    fn test_skips_legal_notice_and_incomplete_entries() {
        let jobs = RemoteOkExtractor.extract(PAYLOAD).unwrap();
        assert_eq!(jobs.len(), 2);

        let first = &jobs[0];
        assert_eq!(first.id, "remoteok-1129876");
        assert_eq!(first.company, "Hooli");
        assert_eq!(first.skills, vec!["qa", "cypress"]);
        assert_eq!(first.allowed_locations, Some(vec!["Worldwide".to_string()]));
        assert_eq!(first.requirements, vec!["Cypress"]);
        assert_eq!(first.salary.as_ref().unwrap().max, Some(90_000.0));
        assert!(first.application_url.as_deref().unwrap().starts_with("https://remoteok.com/"));
        assert!(first.posted_date.is_some());

        let second = &jobs[1];
        assert_eq!(second.id, "remoteok-1129877");
        assert_eq!(second.location, "Remote");
        assert_eq!(second.allowed_locations, None);
        assert_eq!(second.salary, None);
        assert_eq!(second.job_type, crate::types::JobType::Freelance);
        assert_eq!(
            second.application_url.as_deref(),
            Some("https://remoteok.com/remote-jobs/freelance-tester-1129877")
        );
    }

    #[test]
    fn test_search_url_uses_first_keyword_as_tag() {
        assert_eq!(
            RemoteOkDriver::search_url(&query()).unwrap(),
            "https://remoteok.com/api?tag=qa"
        );
    }

    #[tokio::test]
    async fn test_html_interstitial_yields_empty_list() {
        let fetcher = FakeFetcher::serving("<html><title>Just a moment...</title></html>");
        let driver = RemoteOkDriver::new(fetcher, RetryPolicy::none());
        assert!(driver.search(&query(), None).await.is_empty());
        assert!(matches!(
            driver.collect(&query(), None).await,
            Err(ScoutError::Blocked { .. })
        ));
    }
}
