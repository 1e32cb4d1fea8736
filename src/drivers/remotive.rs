// src/drivers/remotive.rs
//! Remotive public remote-jobs API

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use super::extract::{list_items, infer_job_type, PageExtractor};
use super::fetch::{ContentKind, Fetcher, PageRequest};
use super::salary::parse_salary;
use super::{fetch_listings, Driver, SearchQuery};
use crate::error::ScoutError;
use crate::retry::RetryPolicy;
use crate::types::{AuthSession, Job, JobType, Platform};
use crate::utils::{clean_text, parse_posted_date, strip_html};

const SEARCH_URL: &str = "https://remotive.com/api/remote-jobs";

pub struct RemotiveDriver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PageExtractor>,
    retry: RetryPolicy,
}

impl RemotiveDriver {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self::with_extractor(fetcher, Arc::new(RemotiveExtractor), retry)
    }

    pub fn with_extractor(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn PageExtractor>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            extractor,
            retry,
        }
    }

    pub fn search_url(query: &SearchQuery) -> Result<String, ScoutError> {
        let limit = query.max_listings.max(1).to_string();
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[("search", query.keywords.as_str()), ("limit", limit.as_str())],
        )
        .map_err(|e| ScoutError::parse(Platform::Remotive, format!("search url: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Driver for RemotiveDriver {
    fn platform(&self) -> Platform {
        Platform::Remotive
    }

    async fn collect(&self, query: &SearchQuery, _session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError> {
        let request = PageRequest::new(Platform::Remotive, Self::search_url(query)?, ContentKind::Json);
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

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    jobs: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    id: u64,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default)]
    publication_date: Option<String>,
    #[serde(default)]
    candidate_required_location: Option<String>,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// "USA, Canada" / "Europe; UK" / "Americas/EMEA" into separate regions
pub fn split_regions(raw: &str) -> Vec<String> {
    raw.split([',', ';', '/', '|'])
        .map(clean_text)
        .filter(|region| !region.is_empty())
        .collect()
}

pub struct RemotiveExtractor;

impl PageExtractor for RemotiveExtractor {
    fn platform(&self) -> Platform {
        Platform::Remotive
    }

    fn extract(&self, body: &str) -> Result<Vec<Job>, ScoutError> {
        let platform = Platform::Remotive;
        let response: SearchResponse =
            serde_json::from_str(body).map_err(|e| ScoutError::parse(platform, format!("invalid payload: {}", e)))?;

        let jobs = response
            .jobs
            .into_iter()
            .map(|listing| {
                let mut job = Job::new(platform, &listing.id.to_string(), clean_text(&listing.title));
                job.company = listing
                    .company_name
                    .map(|c| clean_text(&c))
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "Confidential".to_string());
                job.is_remote = true;
                if let Some(required) = listing.candidate_required_location.as_deref() {
                    let regions = split_regions(required);
                    if !regions.is_empty() {
                        job.location = clean_text(required);
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
                job.application_url = listing.url;
                job.job_type = listing
                    .job_type
                    .as_deref()
                    .and_then(|t| JobType::from_label(t).or_else(|| infer_job_type(t)))
                    .unwrap_or_default();
                job.salary = listing.salary.as_deref().and_then(parse_salary);
                job.posted_date = listing.publication_date.as_deref().and_then(parse_posted_date);
                job
            })
            .collect();
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{query, FakeFetcher};
    use super::*;

    const PAYLOAD: &str = r#"{
      "0-legal-notice": "Remotive API",
      "job-count": 2,
      "jobs": [
        {
          "id": 1860001,
          "url": "https://remotive.com/remote-jobs/qa/senior-qa-engineer-1860001",
          "title": "Senior QA Engineer",
          "company_name": "Initech",
          "category": "QA",
          "tags": ["selenium", "python", "Selenium"],
          "job_type": "full_time",
          "publication_date": "2024-06-03T10:12:45",
          "candidate_required_location": "USA, Canada",
          "salary": "$100k - $120k",
          "description": "<p>Join us.</p><ul><li>5 years of Selenium</li><li>Python</li></ul>"
        },
        {
          "id": 1860002,
          "url": "https://remotive.com/remote-jobs/qa/test-contractor-1860002",
          "title": "Test Contractor",
          "company_name": "",
          "tags": [],
          "job_type": "contract",
          "candidate_required_location": "Worldwide",
          "salary": "",
          "description": "<p>Short gig</p>"
        }
      ]
    }"#;

    #[test]
    fn test_extracts_listings() {
        let jobs = RemotiveExtractor.extract(PAYLOAD).unwrap();
        assert_eq!(jobs.len(), 2);

        let senior = &jobs[0];
        assert_eq!(senior.id, "remotive-1860001");
        assert!(senior.is_remote);
        assert_eq!(senior.skills, vec!["selenium", "python"]);
        assert_eq!(senior.requirements, vec!["5 years of Selenium", "Python"]);
        assert_eq!(senior.allowed_locations, Some(vec!["USA".to_string(), "Canada".to_string()]));
        assert_eq!(senior.job_type, JobType::FullTime);
        assert_eq!(senior.salary.as_ref().unwrap().min, Some(100_000.0));
        assert!(senior.posted_date.is_some());

        let contract = &jobs[1];
        assert_eq!(contract.company, "Confidential");
        assert_eq!(contract.job_type, JobType::Contract);
        assert_eq!(contract.salary, None);
        assert_eq!(contract.location, "Worldwide");
    }

    #[test]
    fn test_split_regions() {
        assert_eq!(split_regions("Europe; UK / Americas"), vec!["Europe", "UK", "Americas"]);
        assert!(split_regions(" , ").is_empty());
    }

    #[test]
    fn test_garbage_is_parse_error() {
        assert!(matches!(
            RemotiveExtractor.extract("not json"),
            Err(ScoutError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn test_driver_queries_api() {
        let fetcher = FakeFetcher::serving(PAYLOAD);
        let driver = RemotiveDriver::new(fetcher.clone(), RetryPolicy::none());
        assert_eq!(driver.search(&query(), None).await.len(), 2);
        assert!(fetcher.last_url().unwrap().starts_with("https://remotive.com/api/remote-jobs?search=QA"));
        assert!(!driver.requires_auth());
    }
}
