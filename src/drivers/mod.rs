// src/drivers/mod.rs
//! Platform drivers: one per job source, all behind the same failure-isolating interface

pub mod extract;
pub mod fetch;
pub mod freelancer;
pub mod indeed;
pub mod linkedin;
pub mod remoteok;
pub mod remotive;
pub mod salary;
pub mod upwork;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

pub use extract::PageExtractor;
pub use fetch::{ContentKind, FetchedPage, Fetcher, HttpFetcher, PageClient, PageRequest};
pub use freelancer::FreelancerDriver;
pub use indeed::IndeedDriver;
pub use linkedin::LinkedInDriver;
pub use remoteok::RemoteOkDriver;
pub use remotive::RemotiveDriver;
pub use upwork::UpworkDriver;

use crate::error::ScoutError;
use crate::retry::RetryPolicy;
use crate::session::detect_challenge;
use crate::types::{AuthSession, Job, Platform};

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub keywords: String,
    pub location: String,
    /// Upper bound on listings collected from one platform
    pub max_listings: usize,
}

impl SearchQuery {
    pub fn new(keywords: impl Into<String>, location: impl Into<String>, max_listings: usize) -> Self {
        Self {
            keywords: keywords.into(),
            location: location.into(),
            max_listings,
        }
    }
}

#[async_trait]
pub trait Driver: Send + Sync {
    fn platform(&self) -> Platform;

    /// Listings are only reachable with an authenticated session
    fn requires_auth(&self) -> bool {
        false
    }

    /// Whether a session is worth preparing for this platform at all
    fn accepts_session(&self) -> bool {
        self.requires_auth()
    }

    /// Collect listings, reporting failures as typed errors
    async fn collect(&self, query: &SearchQuery, session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError>;

    /// Collect listings; never fails. Problems are logged and yield an empty list.
    async fn search(&self, query: &SearchQuery, session: Option<&AuthSession>) -> Vec<Job> {
        let platform = self.platform();
        match self.collect(query, session).await {
            Ok(jobs) => {
                info!(%platform, "Collected {} listings", jobs.len());
                jobs
            }
            Err(e) => {
                warn!(%platform, kind = e.kind_label(), "Search failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Only authenticated sessions are handed to a listing request
pub fn usable_session(session: Option<&AuthSession>) -> Option<&AuthSession> {
    session.filter(|s| s.is_usable())
}

/// The shared pipeline every driver runs: fetch with retry, refuse
/// challenge pages, extract, cap and sanitize.
pub(crate) async fn fetch_listings(
    fetcher: &dyn Fetcher,
    extractor: &dyn PageExtractor,
    retry: &RetryPolicy,
    request: PageRequest,
    max_listings: usize,
) -> Result<Vec<Job>, ScoutError> {
    let platform = extractor.platform();
    let label = format!("{} listing fetch", platform);
    let request = &request;
    let page = retry.run(&label, move |_| fetcher.fetch(request)).await?;

    let extracted = match extractor.extract(&page.body) {
        Ok(jobs) => jobs,
        Err(e) => {
            // JSON endpoints answer a challenge with an HTML interstitial
            if let Some(marker) = detect_challenge(&page.body) {
                return Err(ScoutError::Blocked {
                    platform,
                    marker: marker.to_string(),
                });
            }
            return Err(e);
        }
    };

    if extracted.is_empty() && request.kind == ContentKind::Html {
        if let Some(marker) = detect_challenge(&page.body) {
            return Err(ScoutError::Blocked {
                platform,
                marker: marker.to_string(),
            });
        }
    }

    Ok(sanitize(platform, extracted, max_listings))
}

/// Drop malformed records, enforce the source tag and the listing cap
fn sanitize(platform: Platform, jobs: Vec<Job>, max_listings: usize) -> Vec<Job> {
    jobs.into_iter()
        .filter(|job| !job.title.trim().is_empty())
        .map(|mut job| {
            job.source = platform;
            if !job.has_valid_url() {
                warn!(%platform, id = %job.id, "Dropping malformed application URL");
                job.application_url = None;
            }
            job
        })
        .take(max_listings)
        .collect()
}

/// The registered drivers, keyed by platform
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: BTreeMap<Platform, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in driver sharing one fetcher
    pub fn with_defaults(fetcher: Arc<dyn Fetcher>, retry: RetryPolicy) -> Self {
        Self::new()
            .register(Arc::new(LinkedInDriver::new(fetcher.clone(), retry.clone())))
            .register(Arc::new(IndeedDriver::new(fetcher.clone(), retry.clone())))
            .register(Arc::new(UpworkDriver::new(fetcher.clone(), retry.clone())))
            .register(Arc::new(FreelancerDriver::new(fetcher.clone(), retry.clone())))
            .register(Arc::new(RemotiveDriver::new(fetcher.clone(), retry.clone())))
            .register(Arc::new(RemoteOkDriver::new(fetcher, retry)))
    }

    /// Add a driver, replacing any already registered for its platform
    pub fn register(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.insert(driver.platform(), driver);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn Driver>> {
        self.drivers.get(&platform).cloned()
    }

    /// Drivers for the requested platforms, in request order, skipping unknown ones
    pub fn select(&self, platforms: &[Platform]) -> Vec<Arc<dyn Driver>> {
        let mut selected: Vec<Arc<dyn Driver>> = Vec::new();
        for platform in platforms {
            if selected.iter().any(|d| d.platform() == *platform) {
                continue;
            }
            match self.get(*platform) {
                Some(driver) => selected.push(driver),
                None => warn!(%platform, "No driver registered"),
            }
        }
        selected
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.drivers.keys().copied().collect()
    }
}
