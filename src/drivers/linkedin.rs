// src/drivers/linkedin.rs
//! LinkedIn public job search (guest HTML fragment endpoint)

use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::extract::{
    element_text, find_attr_by_selectors, find_text_by_selectors, infer_job_type, selector, selectors,
    trailing_id, PageExtractor,
};
use super::fetch::{ContentKind, Fetcher, PageRequest};
use super::salary::parse_salary;
use super::{fetch_listings, usable_session, Driver, SearchQuery};
use crate::error::ScoutError;
use crate::retry::RetryPolicy;
use crate::types::{AuthSession, Job, Platform};
use crate::utils::{contains_word, parse_posted_date, resolve_url};

const SEARCH_URL: &str = "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";

pub struct LinkedInDriver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PageExtractor>,
    retry: RetryPolicy,
}

impl LinkedInDriver {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self::with_extractor(fetcher, Arc::new(LinkedInExtractor), retry)
    }

    pub fn with_extractor(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn PageExtractor>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            extractor,
            retry,
        }
    }

    /// Remote-only (`f_WT=2`), most recent first
    pub fn search_url(query: &SearchQuery) -> Result<String, ScoutError> {
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[
                ("keywords", query.keywords.as_str()),
                ("location", query.location.as_str()),
                ("f_WT", "2"),
                ("sortBy", "DD"),
                ("start", "0"),
            ],
        )
        .map_err(|e| ScoutError::parse(Platform::LinkedIn, format!("search url: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Driver for LinkedInDriver {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn accepts_session(&self) -> bool {
        true
    }

    async fn collect(&self, query: &SearchQuery, session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError> {
        let session = usable_session(session);
        if session.is_none() {
            debug!(platform = %Platform::LinkedIn, "No session, using guest search");
        }
        let request = PageRequest::new(Platform::LinkedIn, Self::search_url(query)?, ContentKind::Html)
            .with_session(session);
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

pub struct LinkedInExtractor;

/// Job view links carry tracking parameters that differ per page load
fn canonical_view_url(href: &str) -> Option<String> {
    let resolved = resolve_url(Platform::LinkedIn.base_url(), href)?;
    let mut url = Url::parse(&resolved).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

impl PageExtractor for LinkedInExtractor {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    fn extract(&self, body: &str) -> Result<Vec<Job>, ScoutError> {
        let platform = Platform::LinkedIn;
        let document = Html::parse_document(body);
        let card_sel = selector(platform, ".base-search-card, .job-search-card")?;
        let title_sel = selectors(platform, &[".base-search-card__title", "h3"])?;
        let company_sel = selectors(platform, &[".base-search-card__subtitle", "h4"])?;
        let location_sel = selectors(platform, &[".job-search-card__location"])?;
        let link_sel = selectors(platform, &["a.base-card__full-link", "a[href*='/jobs/view/']"])?;
        let salary_sel = selectors(platform, &[".job-search-card__salary-info"])?;
        let date_sel = selectors(platform, &["time"])?;
        let snippet_sel = selectors(platform, &[".job-search-card__snippet"])?;

        let mut jobs = Vec::new();
        for (index, card) in document.select(&card_sel).enumerate() {
            let Some(title) = find_text_by_selectors(card, &title_sel) else {
                continue;
            };
            let url = find_attr_by_selectors(card, &link_sel, "href").and_then(|href| canonical_view_url(&href));
            let native_id = card
                .value()
                .attr("data-entity-urn")
                .and_then(|urn| urn.rsplit(':').next())
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .or_else(|| url.as_deref().and_then(trailing_id))
                .unwrap_or_else(|| format!("card{}", index));

            let mut job = Job::new(platform, &native_id, title);
            job.company = find_text_by_selectors(card, &company_sel).unwrap_or_else(|| "Confidential".to_string());
            if let Some(location) = find_text_by_selectors(card, &location_sel) {
                job.location = location;
            }
            job.is_remote = contains_word(&job.location, "remote") || contains_word(&job.title, "remote");
            job.description = find_text_by_selectors(card, &snippet_sel).unwrap_or_default();
            job.application_url = url;
            job.salary = find_text_by_selectors(card, &salary_sel).and_then(|s| parse_salary(&s));
            job.posted_date = find_attr_by_selectors(card, &date_sel, "datetime")
                .or_else(|| find_text_by_selectors(card, &date_sel))
                .and_then(|raw| parse_posted_date(&raw));
            job.easy_apply = element_text(card).to_lowercase().contains("easy apply");
            if let Some(job_type) = infer_job_type(&job.title) {
                job.job_type = job_type;
            }
            jobs.push(job);
        }
        Ok(jobs)
    }
}
