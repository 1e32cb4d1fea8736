// src/drivers/upwork.rs
//! Upwork job search; listings are only served to signed-in users

use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;
use tracing::info;
use url::Url;

use super::extract::{
    all_texts, find_attr_by_selectors, find_text_by_selectors, selector, selectors, PageExtractor,
};
use super::fetch::{ContentKind, Fetcher, PageRequest};
use super::salary::parse_salary;
use super::{fetch_listings, usable_session, Driver, SearchQuery};
use crate::error::ScoutError;
use crate::retry::RetryPolicy;
use crate::types::{AuthSession, Job, JobType, Platform, SalaryPeriod};
use crate::utils::{parse_posted_date, resolve_url};

const SEARCH_URL: &str = "https://www.upwork.com/nx/search/jobs/";

pub struct UpworkDriver {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PageExtractor>,
    retry: RetryPolicy,
}

impl UpworkDriver {
    pub fn new(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self::with_extractor(fetcher, Arc::new(UpworkExtractor), retry)
    }

    pub fn with_extractor(fetcher: Arc<dyn Fetcher>, extractor: Arc<dyn PageExtractor>, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            extractor,
            retry,
        }
    }

    pub fn search_url(query: &SearchQuery) -> Result<String, ScoutError> {
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[("q", query.keywords.as_str()), ("sort", "recency"), ("per_page", "50")],
        )
        .map_err(|e| ScoutError::parse(Platform::Upwork, format!("search url: {}", e)))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl Driver for UpworkDriver {
    fn platform(&self) -> Platform {
        Platform::Upwork
    }

    fn requires_auth(&self) -> bool {
        true
    }

    async fn collect(&self, query: &SearchQuery, session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError> {
        let Some(session) = usable_session(session) else {
            if let Some(kind) = session.and_then(|s| s.error) {
                info!(platform = %Platform::Upwork, "Skipping search, session failed: {}", kind);
            }
            return Err(ScoutError::SessionRequired {
                platform: Platform::Upwork,
            });
        };
        let request =
            PageRequest::new(Platform::Upwork, Self::search_url(query)?, ContentKind::Html).with_session(Some(session));
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

pub struct UpworkExtractor;

/// `/jobs/Title_~01abc/` carries the ciphertext id after the tilde
fn ciphertext_id(href: &str) -> Option<String> {
    let after = href.split('~').nth(1)?;
    let id: String = after.chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
    (!id.is_empty()).then_some(id)
}

impl PageExtractor for UpworkExtractor {
    fn platform(&self) -> Platform {
        Platform::Upwork
    }

    fn extract(&self, body: &str) -> Result<Vec<Job>, ScoutError> {
        let platform = Platform::Upwork;
        let document = Html::parse_document(body);
        let card_sel = selector(platform, "article[data-test='JobTile'], section.job-tile")?;
        let title_sel = selectors(platform, &["h2.job-tile-title a", "h2.job-tile-title", "h2 a"])?;
        let link_sel = selectors(platform, &["h2.job-tile-title a", "a[href*='/jobs/']"])?;
        let rate_sel = selectors(platform, &["[data-test='job-type-label']"])?;
        let budget_sel = selectors(platform, &["[data-test='is-fixed-price'] strong", "[data-test='budget']"])?;
        let description_sel = selectors(platform, &["[data-test='JobDescription'] p", "[data-test='UpCLineClamp JobDescription']"])?;
        let token_sel = selector(platform, "[data-test='token'] span, [data-test='token']")?;
        let date_sel = selectors(platform, &["[data-test='job-pubilshed-date'] span:last-child", "small span"])?;
        let location_sel = selectors(platform, &["[data-test='location']"])?;

        let mut jobs = Vec::new();
        for (index, card) in document.select(&card_sel).enumerate() {
            let Some(title) = find_text_by_selectors(card, &title_sel) else {
                continue;
            };
            let href = find_attr_by_selectors(card, &link_sel, "href");
            let native_id = card
                .value()
                .attr("data-ev-job-uid")
                .map(str::to_string)
                .or_else(|| href.as_deref().and_then(ciphertext_id))
                .unwrap_or_else(|| format!("card{}", index));

            let mut job = Job::new(platform, &native_id, title);
            job.company = "Upwork Client".to_string();
            job.is_remote = true;
            if let Some(location) = find_text_by_selectors(card, &location_sel) {
                job.allowed_locations = Some(vec![location]);
            }
            job.application_url = href.and_then(|h| resolve_url(platform.base_url(), &h)).map(|u| {
                // drop the search referrer
                u.split('?').next().unwrap_or(&u).to_string()
            });
            job.description = find_text_by_selectors(card, &description_sel).unwrap_or_default();

            for token in all_texts(card, &token_sel) {
                job.push_skill(&token);
            }

            let rate = find_text_by_selectors(card, &rate_sel).unwrap_or_default();
            if rate.to_lowercase().contains("fixed") {
                job.job_type = JobType::Project;
                job.salary = find_text_by_selectors(card, &budget_sel)
                    .and_then(|b| parse_salary(&b))
                    .map(|mut salary| {
                        salary.period = Some(SalaryPeriod::Project);
                        salary
                    });
            } else {
                job.job_type = JobType::Freelance;
                job.salary = parse_salary(&rate).filter(|s| s.min.is_some());
            }

            job.posted_date = find_text_by_selectors(card, &date_sel).and_then(|raw| parse_posted_date(&raw));
            jobs.push(job);
        }
        Ok(jobs)
    }
}
