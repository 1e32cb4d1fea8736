// src/drivers/freelancer.rs
//! Freelancer.com public project search API

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::extract::PageExtractor;
use super::fetch::{ContentKind, Fetcher, PageRequest};
use super::salary::from_bounds;
use super::{fetch_listings, Driver, SearchQuery};
use crate::error::ScoutError;
use crate::retry::RetryPolicy;
use crate::types::{AuthSession, Job, JobType, Platform, SalaryPeriod};
use crate::utils::{clean_text, strip_html};

const SEARCH_URL: &str = "https://www.freelancer.com/api/projects/0.1/projects/active/";

pub struct FreelancerDriver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PageExtractor>,
    retry: RetryPolicy,
}

impl FreelancerDriver {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self::with_extractor(fetcher, Arc::new(FreelancerExtractor), retry)
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
            &[
                ("query", query.keywords.as_str()),
                ("limit", limit.as_str()),
                ("full_description", "true"),
                ("job_details", "true"),
                ("sort_field", "time_updated"),
                ("compact", "true"),
            ],
        )
        .map_err(|e| ScoutError::parse(Platform::Freelancer, format!("search url: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Driver for FreelancerDriver {
    fn platform(&self) -> Platform {
        Platform::Freelancer
    }

    async fn collect(&self, query: &SearchQuery, _session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError> {
        let request = PageRequest::new(Platform::Freelancer, Self::search_url(query)?, ContentKind::Json);
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

// ===== API payload =====

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    projects: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    seo_url: Option<String>,
    #[serde(default)]
    preview_description: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    budget: Option<Budget>,
    #[serde(default)]
    currency: Option<Currency>,
    #[serde(default)]
    jobs: Vec<Category>,
    #[serde(default)]
    time_submitted: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Budget {
    minimum: Option<f64>,
    maximum: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Currency {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    name: String,
}

pub struct FreelancerExtractor;

impl PageExtractor for FreelancerExtractor {
    fn platform(&self) -> Platform {
        Platform::Freelancer
    }

    fn extract(&self, body: &str) -> Result<Vec<Job>, ScoutError> {
        let platform = Platform::Freelancer;
        let response: SearchResponse =
            serde_json::from_str(body).map_err(|e| ScoutError::parse(platform, format!("invalid payload: {}", e)))?;
        if response.status != "success" {
            return Err(ScoutError::parse(
                platform,
                format!(
                    "API status {}: {}",
                    response.status,
                    response.message.unwrap_or_default()
                ),
            ));
        }

        let projects = response.result.map(|r| r.projects).unwrap_or_default();
        let mut jobs = Vec::with_capacity(projects.len());
        for entry in projects {
            match serde_json::from_value::<Project>(entry) {
                Ok(project) => jobs.push(to_job(platform, project)),
                Err(e) => debug!(%platform, "Skipping malformed project: {}", e),
            }
        }
        Ok(jobs)
    }
}

fn to_job(platform: Platform, project: Project) -> Job {
    let mut job = Job::new(platform, &project.id.to_string(), clean_text(&project.title));
    job.company = "Freelancer Client".to_string();
    job.is_remote = true;
    job.description = project
        .description
        .or(project.preview_description)
        .map(|d| strip_html(&d))
        .unwrap_or_default();
    job.application_url = project
        .seo_url
        .filter(|s| !s.trim().is_empty())
        .map(|seo| format!("{}/projects/{}", platform.base_url(), seo.trim_matches('/')));
    for category in &project.jobs {
        job.push_skill(&category.name);
    }

    let hourly = project.kind.as_deref() == Some("hourly");
    job.job_type = if hourly { JobType::Freelance } else { JobType::Project };
    let period = if hourly { SalaryPeriod::Hour } else { SalaryPeriod::Project };
    job.salary = project.budget.and_then(|budget| {
        from_bounds(
            budget.minimum,
            budget.maximum,
            project.currency.as_ref().and_then(|c| c.code.as_deref()),
            Some(period),
        )
    });
    job.posted_date = project
        .time_submitted
        .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single());
    job
}

#[cfg(test)]
mod tests {
    use super::super::testing::{query, FakeFetcher};
    use super::*;

    const PAYLOAD: &str = r#"{
      "status": "success",
      "result": {
        "projects": [
          {
            "id": 37000001,
            "title": "Automated testing for web app",
            "seo_url": "software-testing/automated-testing-web-app",
            "preview_description": "Need Cypress tests",
            "description": "<p>Need <b>Cypress</b> end-to-end tests for our checkout.</p>",
            "type": "fixed",
            "budget": {"minimum": 250, "maximum": 750},
            "currency": {"code": "USD", "sign": "$"},
            "jobs": [{"id": 1, "name": "Software Testing"}, {"id": 2, "name": "Cypress"}],
            "time_submitted": 1717200000
          },
          {
            "id": 37000002,
            "title": "QA for Android app",
            "type": "hourly",
            "budget": {"minimum": 15, "maximum": 25},
            "currency": {"code": "EUR"},
            "jobs": []
          }
        ]
      }
    }"#;

    #[test]
    fn test_extracts_projects() {
        let jobs = FreelancerExtractor.extract(PAYLOAD).unwrap();
        assert_eq!(jobs.len(), 2);

        let fixed = &jobs[0];
        assert_eq!(fixed.id, "freelancer-37000001");
        assert_eq!(fixed.company, "Freelancer Client");
        assert_eq!(fixed.description, "Need Cypress end-to-end tests for our checkout.");
        assert_eq!(fixed.skills, vec!["Software Testing", "Cypress"]);
        assert_eq!(fixed.job_type, JobType::Project);
        assert_eq!(
            fixed.application_url.as_deref(),
            Some("https://www.freelancer.com/projects/software-testing/automated-testing-web-app")
        );
        let salary = fixed.salary.as_ref().unwrap();
        assert_eq!(salary.max, Some(750.0));
        assert_eq!(salary.period, Some(SalaryPeriod::Project));
        assert!(fixed.posted_date.is_some());

        let hourly = &jobs[1];
        assert_eq!(hourly.job_type, JobType::Freelance);
        assert_eq!(hourly.application_url, None);
        assert_eq!(hourly.salary.as_ref().unwrap().currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_malformed_project_is_skipped() {
        let payload = r#"{
          "status": "success",
          "result": {"projects": [
            {"id": 41, "title": "Regression testing", "jobs": [{"id": 3, "name": "QA"}]},
            {"id": 42, "title": "Broken category", "jobs": [{"id": 9}]},
            {"id": "not-a-number", "title": "Broken id"}
          ]}
        }"#;
        let jobs = FreelancerExtractor.extract(payload).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, "freelancer-41");
        assert_eq!(jobs[0].skills, vec!["QA"]);
    }

    #[test]
    fn test_error_status_is_parse_error() {
        let err = FreelancerExtractor
            .extract(r#"{"status": "error", "message": "rate limited"}"#)
            .unwrap_err();
        assert!(matches!(err, ScoutError::Parse { .. }));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_driver_never_sends_session() {
        let fetcher = FakeFetcher::serving(PAYLOAD);
        let driver = FreelancerDriver::new(fetcher.clone(), RetryPolicy::none());
        let session = AuthSession::empty(Platform::Freelancer);
        let jobs = driver.search(&query(), Some(&session)).await;
        assert_eq!(jobs.len(), 2);
        assert!(fetcher.last_request.lock().unwrap().as_ref().unwrap().session.is_none());
        assert!(fetcher.last_url().unwrap().contains("limit=20"));
    }
}
