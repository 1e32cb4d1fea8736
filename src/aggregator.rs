// src/aggregator.rs
//! Runs every configured driver with failure isolation and merges the results

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AggregationSettings;
use crate::drivers::{Driver, DriverRegistry, SearchQuery};
use crate::error::{AggregationReport, PlatformOutcome, ScoutError};
use crate::retry::Pacer;
use crate::session::SessionStore;
use crate::types::{AuthSession, Job, Platform};

/// Jobs from one run plus what each platform contributed
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub jobs: Vec<Job>,
    pub report: AggregationReport,
}

pub struct Aggregator {
    registry: DriverRegistry,
    sessions: Arc<SessionStore>,
    query: SearchQuery,
    platforms: Vec<Platform>,
    concurrency: usize,
    pacer: Arc<Pacer>,
    prepared: OnceCell<HashMap<Platform, AuthSession>>,
}

impl Aggregator {
    pub fn new(
        registry: DriverRegistry,
        sessions: Arc<SessionStore>,
        query: SearchQuery,
        settings: &AggregationSettings,
    ) -> Self {
        let platforms = registry.platforms();
        Self {
            registry,
            sessions,
            query,
            platforms,
            concurrency: settings.concurrency.max(1),
            pacer: Arc::new(Pacer::new(settings.request_delay())),
            prepared: OnceCell::new(),
        }
    }

    /// Restrict (and order) the platforms searched
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    /// Merged jobs from every driver; fails only when all of them came back empty
    pub async fn search_all(&self) -> Result<Vec<Job>, ScoutError> {
        self.run().await.map(|aggregation| aggregation.jobs)
    }

    pub async fn run(&self) -> Result<Aggregation, ScoutError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("aggregation", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: String) -> Result<Aggregation, ScoutError> {
        let drivers = self.registry.select(&self.platforms);
        info!(
            "Searching {} platform(s) for '{}' (concurrency {})",
            drivers.len(),
            self.query.keywords,
            self.concurrency
        );

        let sessions = self.sessions_for_run(&drivers).await;

        let results: Vec<(Platform, Result<Vec<Job>, String>, Option<&'static str>)> = if self.concurrency <= 1 {
            let mut results = Vec::with_capacity(drivers.len());
            for driver in &drivers {
                self.pacer.wait().await;
                results.push(self.invoke(driver.as_ref(), sessions.get(&driver.platform())).await);
            }
            results
        } else {
            stream::iter(drivers.iter())
                .map(|driver| self.invoke(driver.as_ref(), sessions.get(&driver.platform())))
                .buffered(self.concurrency)
                .collect()
                .await
        };

        let mut jobs = Vec::new();
        let mut outcomes = Vec::with_capacity(results.len());
        for (platform, result, kind) in results {
            match result {
                Ok(found) => {
                    outcomes.push(PlatformOutcome {
                        platform,
                        job_count: found.len(),
                        failure: None,
                        failure_kind: None,
                    });
                    jobs.extend(found.into_iter().map(|mut job| {
                        job.source = platform;
                        job
                    }));
                }
                Err(reason) => outcomes.push(PlatformOutcome {
                    platform,
                    job_count: 0,
                    failure: Some(reason),
                    failure_kind: kind.map(str::to_string),
                }),
            }
        }

        let report = AggregationReport { run_id, outcomes };
        if jobs.is_empty() {
            warn!("No jobs found: {}", report);
            return Err(ScoutError::NoJobsFound(report));
        }

        ensure_unique_ids(&mut jobs);
        info!("Aggregated {} jobs: {}", jobs.len(), report);
        Ok(Aggregation { jobs, report })
    }

    /// One driver call, isolated from panics and errors
    async fn invoke(
        &self,
        driver: &dyn Driver,
        session: Option<&AuthSession>,
    ) -> (Platform, Result<Vec<Job>, String>, Option<&'static str>) {
        let platform = driver.platform();
        let outcome = AssertUnwindSafe(driver.collect(&self.query, session))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(jobs)) => {
                info!(%platform, "Collected {} listings", jobs.len());
                (platform, Ok(jobs), None)
            }
            Ok(Err(e)) => {
                warn!(%platform, kind = e.kind_label(), "Driver failed: {}", e);
                (platform, Err(e.to_string()), Some(e.kind_label()))
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(%platform, "Driver panicked: {}", message);
                (platform, Err(format!("driver panicked: {}", message)), Some("panic"))
            }
        }
    }

    /// Sessions are obtained once per aggregator. Later runs only revalidate
    /// the ones that were authenticated; failed platforms are not retried.
    async fn sessions_for_run(&self, drivers: &[Arc<dyn Driver>]) -> HashMap<Platform, AuthSession> {
        let wanted: HashSet<Platform> = drivers
            .iter()
            .filter(|d| d.accepts_session())
            .map(|d| d.platform())
            .collect();

        let mut first_run = false;
        let prepared = self
            .prepared
            .get_or_init(|| async {
                first_run = true;
                let mut sessions = HashMap::new();
                for platform in Platform::ALL.iter().filter(|p| wanted.contains(*p)) {
                    let session = self.sessions.session_for(*platform).await;
                    if !session.is_usable() {
                        info!(
                            %platform,
                            "No usable session ({}), continuing without",
                            session.error.map(|e| e.to_string()).unwrap_or_else(|| "unauthenticated".to_string())
                        );
                    }
                    sessions.insert(*platform, session);
                }
                sessions
            })
            .await;

        if first_run {
            return prepared.clone();
        }

        let mut sessions = HashMap::with_capacity(prepared.len());
        for (platform, session) in prepared {
            let current = if session.is_usable() {
                self.sessions.session_for(*platform).await
            } else {
                session.clone()
            };
            sessions.insert(*platform, current);
        }
        sessions
    }
}

/// Suffix colliding ids with `-2`, `-3`, ... so ids are unique within the run
fn ensure_unique_ids(jobs: &mut [Job]) {
    let mut seen: HashSet<String> = HashSet::with_capacity(jobs.len());
    for job in jobs.iter_mut() {
        if seen.insert(job.id.clone()) {
            continue;
        }
        let mut n = 2;
        let mut candidate = format!("{}-{}", job.id, n);
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", job.id, n);
        }
        job.id = candidate.clone();
        seen.insert(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, StaticCredentials};
    use crate::session::{Authenticator, RecordedSessions};
    use crate::types::AuthErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Returns(usize),
        Fails,
        Panics,
    }

    struct FakeDriver {
        platform: Platform,
        behaviour: Behaviour,
        wants_session: bool,
        seen_session: std::sync::Mutex<Option<bool>>,
    }

    impl FakeDriver {
        fn new(platform: Platform, behaviour: Behaviour) -> Self {
            Self {
                platform,
                behaviour,
                wants_session: false,
                seen_session: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Driver for FakeDriver {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn accepts_session(&self) -> bool {
            self.wants_session
        }

        async fn collect(&self, _query: &SearchQuery, session: Option<&AuthSession>) -> Result<Vec<Job>, ScoutError> {
            *self.seen_session.lock().unwrap() = Some(session.is_some_and(|s| s.is_usable()));
            match self.behaviour {
                Behaviour::Returns(n) => Ok((0..n)
                    .map(|i| Job::new(self.platform, &i.to_string(), format!("QA Engineer {}", i)))
                    .collect()),
                Behaviour::Fails => Err(ScoutError::parse(self.platform, "layout changed")),
                Behaviour::Panics => panic!("selector engine exploded"),
            }
        }
    }

    struct CountingLogin {
        calls: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl Authenticator for CountingLogin {
        async fn login(&self, platform: Platform, _credentials: &Credentials) -> AuthSession {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                AuthSession::authenticated(
                    platform,
                    crate::session::login::parse_cookie_header("sid=1", ".example.com"),
                    "jobradar-test",
                )
            } else {
                AuthSession::failed(platform, AuthErrorKind::ChallengeDetected, "captcha")
            }
        }
    }

    fn store(login: Arc<CountingLogin>, dir: &std::path::Path) -> Arc<SessionStore> {
        let credentials =
            StaticCredentials::new().with(Platform::LinkedIn, Credentials::new("qa@example.com", "pw"));
        Arc::new(SessionStore::new(
            Arc::new(credentials),
            login,
            RecordedSessions::new(dir),
            chrono::Duration::hours(12),
        ))
    }

    fn settings(concurrency: usize) -> AggregationSettings {
        AggregationSettings {
            concurrency,
            request_delay_ms: 0,
        }
    }

    fn aggregator(drivers: Vec<FakeDriver>, concurrency: usize, login: Arc<CountingLogin>, dir: &std::path::Path) -> Aggregator {
        let mut registry = DriverRegistry::new();
        let mut order = Vec::new();
        for driver in drivers {
            order.push(driver.platform);
            registry = registry.register(Arc::new(driver));
        }
        Aggregator::new(
            registry,
            store(login, dir),
            SearchQuery::new("qa", "Worldwide", 20),
            &settings(concurrency),
        )
        .with_platforms(order)
    }

    fn login(succeed: bool) -> Arc<CountingLogin> {
        Arc::new(CountingLogin {
            calls: AtomicUsize::new(0),
            succeed,
        })
    }

    #[tokio::test]
    async fn test_failing_and_panicking_drivers_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        for concurrency in [1, 3] {
            let agg = aggregator(
                vec![
                    FakeDriver::new(Platform::Remotive, Behaviour::Returns(2)),
                    FakeDriver::new(Platform::Indeed, Behaviour::Panics),
                    FakeDriver::new(Platform::RemoteOk, Behaviour::Returns(1)),
                ],
                concurrency,
                login(true),
                dir.path(),
            );
            let aggregation = agg.run().await.unwrap();
            assert_eq!(aggregation.jobs.len(), 3);
            let sources: Vec<Platform> = aggregation.jobs.iter().map(|j| j.source).collect();
            assert_eq!(sources, vec![Platform::Remotive, Platform::Remotive, Platform::RemoteOk]);

            let indeed = &aggregation.report.outcomes[1];
            assert_eq!(indeed.platform, Platform::Indeed);
            assert_eq!(indeed.failure_kind.as_deref(), Some("panic"));
            assert!(indeed.reason().contains("selector engine exploded"));
        }
    }

    #[tokio::test]
    async fn test_all_empty_is_no_jobs_found() {
        let dir = tempfile::tempdir().unwrap();
        let agg = aggregator(
            vec![
                FakeDriver::new(Platform::Remotive, Behaviour::Returns(0)),
                FakeDriver::new(Platform::Freelancer, Behaviour::Fails),
            ],
            1,
            login(true),
            dir.path(),
        );
        match agg.search_all().await {
            Err(ScoutError::NoJobsFound(report)) => {
                assert_eq!(report.attempted(), vec![Platform::Remotive, Platform::Freelancer]);
                let text = report.to_string();
                assert!(text.contains("remotive: returned no listings"));
                assert!(text.contains("layout changed"));
            }
            other => panic!("expected NoJobsFound, got {:?}", other.map(|j| j.len())),
        }
    }

    #[tokio::test]
    async fn test_sessions_prepared_once_per_aggregator() {
        let dir = tempfile::tempdir().unwrap();
        let counter = login(false);
        let mut linkedin = FakeDriver::new(Platform::LinkedIn, Behaviour::Returns(1));
        linkedin.wants_session = true;
        let agg = aggregator(vec![linkedin], 1, counter.clone(), dir.path());

        agg.search_all().await.unwrap();
        agg.search_all().await.unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authenticated_session_reaches_driver() {
        let dir = tempfile::tempdir().unwrap();
        let counter = login(true);
        let mut linkedin = FakeDriver::new(Platform::LinkedIn, Behaviour::Returns(1));
        linkedin.wants_session = true;
        let driver = Arc::new(linkedin);
        let registry = DriverRegistry::new().register(driver.clone());
        let agg = Aggregator::new(
            registry,
            store(counter.clone(), dir.path()),
            SearchQuery::new("qa", "Worldwide", 20),
            &settings(1),
        );

        agg.search_all().await.unwrap();
        agg.search_all().await.unwrap();
        assert_eq!(*driver.seen_session.lock().unwrap(), Some(true));
        // the second run reuses the cached session
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ids_are_made_unique() {
        let mut jobs = vec![
            Job::new(Platform::Remotive, "1", "a"),
            Job::new(Platform::Remotive, "1", "b"),
            Job::new(Platform::Remotive, "1-2", "c"),
            Job::new(Platform::Remotive, "1", "d"),
        ];
        ensure_unique_ids(&mut jobs);
        let ids: HashSet<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(jobs[0].id, "remotive-1");
        assert_eq!(jobs[1].id, "remotive-1-2");
    }
}
