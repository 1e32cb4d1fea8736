// src/drivers/indeed.rs
//! Indeed HTML search results

use async_trait::async_trait;
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

use super::extract::{
    all_texts, element_text, find_attr_by_selectors, find_text_by_selectors, infer_job_type, outermost_matches,
    selector, selectors, PageExtractor,
};
use super::fetch::{ContentKind, Fetcher, PageRequest};
use super::salary::parse_salary;
use super::{fetch_listings, usable_session, Driver, SearchQuery};
use crate::error::ScoutError;
use crate::retry::RetryPolicy;
use crate::types::{AuthSession, Job, Platform};
use crate::utils::{contains_word, parse_posted_date, resolve_url};

const SEARCH_URL: &str = "https://www.indeed.com/jobs";

pub struct IndeedDriver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PageExtractor>,
    retry: RetryPolicy,
}

impl IndeedDriver {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self::with_extractor(fetcher, Arc::new(IndeedExtractor), retry)
    }

    pub fn with_extractor(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn PageExtractor>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            extractor,
            retry,
        }
    }

    /// Indeed has no "worldwide"; the location filter becomes "remote"
    pub fn search_url(query: &SearchQuery) -> Result<String, ScoutError> {
        let location = if query.location.trim().is_empty() || contains_word(&query.location, "worldwide") {
            "remote"
        } else {
            query.location.as_str()
        };
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[
                ("q", query.keywords.as_str()),
                ("l", location),
                ("sort", "date"),
                ("fromage", "14"),
            ],
        )
        .map_err(|e| ScoutError::parse(Platform::Indeed, format!("search url: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Driver for IndeedDriver {
    fn platform(&self) -> Platform {
        Platform::Indeed
    }

    fn accepts_session(&self) -> bool {
        true
    }

    async fn collect(&self, query: &SearchQuery, session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError> {
        let request = PageRequest::new(Platform::Indeed, Self::search_url(query)?, ContentKind::Html)
            .with_session(usable_session(session));
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

pub struct IndeedExtractor;

impl PageExtractor for IndeedExtractor {
    fn platform(&self) -> Platform {
        Platform::Indeed
    }

    fn extract(&self, body: &str) -> Result<Vec<Job>, ScoutError> {
        let platform = Platform::Indeed;
        let document = Html::parse_document(body);
        let card_sel = selector(platform, "div.job_seen_beacon, div.cardOutline, td.resultContent")?;
        let title_sel = selectors(platform, &["h2.jobTitle span[title]", "h2.jobTitle", "a.jcs-JobTitle"])?;
        let key_sel = selectors(platform, &["a[data-jk]", "[data-jk]"])?;
        let link_sel = selectors(platform, &["h2.jobTitle a", "a.jcs-JobTitle"])?;
        let company_sel = selectors(platform, &["[data-testid='company-name']", "span.companyName"])?;
        let location_sel = selectors(platform, &["[data-testid='text-location']", "div.companyLocation"])?;
        let salary_sel = selectors(
            platform,
            &["div.salary-snippet-container", "[data-testid='attribute_snippet_testid'].salary-snippet"],
        )?;
        let attribute_sel = selector(platform, "[data-testid='attribute_snippet_testid']")?;
        let requirement_sel = selector(platform, "div.job-snippet li")?;
        let snippet_sel = selectors(platform, &["div.job-snippet"])?;
        let date_sel = selectors(platform, &["span.date", "[data-testid='myJobsStateDate']"])?;

        // card wrappers nest: cardOutline > job_seen_beacon > resultContent
        let mut seen_keys = HashSet::new();
        let mut jobs = Vec::new();
        for (index, card) in outermost_matches(&document, &card_sel).into_iter().enumerate() {
            let Some(title) = find_text_by_selectors(card, &title_sel) else {
                continue;
            };
            let key = find_attr_by_selectors(card, &key_sel, "data-jk");
            if let Some(jk) = &key {
                if !seen_keys.insert(jk.clone()) {
                    continue;
                }
            }
            let native_id = key.clone().unwrap_or_else(|| format!("card{}", index));

            let mut job = Job::new(platform, &native_id, title);
            job.company = find_text_by_selectors(card, &company_sel).unwrap_or_else(|| "Confidential".to_string());
            if let Some(location) = find_text_by_selectors(card, &location_sel) {
                job.location = location;
            }
            job.is_remote = contains_word(&job.location, "remote") || contains_word(&job.title, "remote");

            // the tracked click-through link expires, the view link does not
            job.application_url = match &key {
                Some(jk) => Some(format!("{}/viewjob?jk={}", platform.base_url(), jk)),
                None => find_attr_by_selectors(card, &link_sel, "href")
                    .and_then(|href| resolve_url(platform.base_url(), &href)),
            };

            job.requirements = all_texts(card, &requirement_sel);
            job.description = find_text_by_selectors(card, &snippet_sel).unwrap_or_default();
            job.salary = find_text_by_selectors(card, &salary_sel).and_then(|s| parse_salary(&s));
            job.posted_date = find_text_by_selectors(card, &date_sel).and_then(|raw| parse_posted_date(&raw));

            let attributes = all_texts(card, &attribute_sel).join(" ");
            if let Some(job_type) = infer_job_type(&attributes).or_else(|| infer_job_type(&job.title)) {
                job.job_type = job_type;
            }
            let text = element_text(card).to_lowercase();
            job.easy_apply = text.contains("easily apply") || text.contains("easy apply");
            jobs.push(job);
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{query, FakeFetcher};
    use super::*;
    use crate::error::NetworkFailure;
    use crate::types::{JobType, SalaryPeriod};

    const PAGE: &str = r#"
<div id="mosaic-provider-jobcards">
  <div class="job_seen_beacon">
    <h2 class="jobTitle"><a data-jk="a1b2c3d4" href="/rc/clk?jk=a1b2c3d4&amp;fccid=77"><span title="QA Automation Engineer">QA Automation Engineer</span></a></h2>
    <span data-testid="company-name">Globex</span>
    <div data-testid="text-location">Remote in United States</div>
    <div class="salary-snippet-container">$50 - $60 an hour</div>
    <div data-testid="attribute_snippet_testid">Contract</div>
    <div class="job-snippet"><ul><li>Build Selenium suites</li><li>Maintain CI pipelines</li></ul></div>
    <span class="date">Posted 3 days ago</span>
    <span class="ialbl iaTextBlack">Easily apply</span>
  </div>
  <div class="job_seen_beacon">
    <h2 class="jobTitle"><a href="/company/Umbrella/jobs/Manual-Tester-123"><span title="Manual Tester">Manual Tester</span></a></h2>
    <div data-testid="text-location">Toronto, ON</div>
  </div>
</div>"#;

    #[test]
    fn test_extracts_cards() {
        let jobs = IndeedExtractor.extract(PAGE).unwrap();
        assert_eq!(jobs.len(), 2);

        let first = &jobs[0];
        assert_eq!(first.id, "indeed-a1b2c3d4");
        assert_eq!(first.company, "Globex");
        assert!(first.is_remote);
        assert!(first.easy_apply);
        assert_eq!(first.job_type, JobType::Contract);
        assert_eq!(first.requirements, vec!["Build Selenium suites", "Maintain CI pipelines"]);
        assert_eq!(
            first.application_url.as_deref(),
            Some("https://www.indeed.com/viewjob?jk=a1b2c3d4")
        );
        let salary = first.salary.as_ref().unwrap();
        assert_eq!(salary.period, Some(SalaryPeriod::Hour));
        assert_eq!(salary.max, Some(60.0));
        assert!(first.posted_date.is_some());

        let second = &jobs[1];
        assert_eq!(second.id, "indeed-card1");
        assert!(!second.is_remote);
        assert_eq!(
            second.application_url.as_deref(),
            Some("https://www.indeed.com/company/Umbrella/jobs/Manual-Tester-123")
        );
    }

    #[test]
    fn test_nested_card_wrappers_yield_one_job() {
        let page = r#"
<ul class="jobsearch-ResultsList">
  <li>
    <div class="cardOutline tapItem">
      <div class="slider_container"><div class="job_seen_beacon">
        <table><tbody><tr><td class="resultContent">
          <h2 class="jobTitle"><a data-jk="abc123" href="/rc/clk?jk=abc123"><span title="SDET">SDET</span></a></h2>
          <span data-testid="company-name">Initech</span>
          <div data-testid="text-location">Remote</div>
        </td></tr></tbody></table>
      </div></div>
    </div>
  </li>
  <li>
    <div class="cardOutline tapItem">
      <div class="job_seen_beacon"><td class="resultContent">
        <h2 class="jobTitle"><a data-jk="def456"><span title="QA Analyst">QA Analyst</span></a></h2>
      </td></div>
    </div>
  </li>
</ul>"#;
        let jobs = IndeedExtractor.extract(page).unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["indeed-abc123", "indeed-def456"]);
        assert_eq!(jobs[0].company, "Initech");
    }

    #[test]
    fn test_search_url_maps_worldwide_to_remote() {
        let url = IndeedDriver::search_url(&query()).unwrap();
        assert!(url.contains("l=remote"));
        assert!(url.contains("q=QA+automation+engineer"));
    }

    #[tokio::test]
    async fn test_network_failure_yields_empty_list() {
        let fetcher = FakeFetcher::failing(|platform| ScoutError::Network {
            platform,
            kind: NetworkFailure::ConnectionRefused,
            message: "refused".to_string(),
        });
        let driver = IndeedDriver::new(fetcher.clone(), RetryPolicy::none());
        assert!(driver.search(&query(), None).await.is_empty());
        assert_eq!(fetcher.calls(), 1);
    }
}
