// src/cli.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use jobradar::config::AppConfig;
use jobradar::credentials::EnvCredentials;
use jobradar::drivers::{DriverRegistry, HttpFetcher, SearchQuery};
use jobradar::retry::Pacer;
use jobradar::session::{
    AutomatedLogin, ChallengeResolver, ConsolePrompt, FailFast, LoginFlow, RecordedSessions, SessionStore,
};
use jobradar::utils::truncate_chars;
use jobradar::{Aggregator, Job, MatchResult, Platform, Profile, ScoutError, Scorer};

#[derive(Parser)]
#[command(name = "jobradar")]
#[command(about = "Discover, filter and rank QA job postings across platforms")]
pub struct Cli {
    /// Configuration file (defaults to $JOBRADAR_CONFIG or ./jobradar.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Search every enabled platform, filter, and optionally rank against a profile
    Search {
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Limit the search to these platforms (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
        /// Override the configured search keywords
        #[arg(long)]
        query: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        #[arg(long)]
        min_score: Option<u8>,
        /// Pause for manual resolution when a login hits a challenge
        #[arg(long)]
        interactive: bool,
    },
    /// Show credential and recorded-session availability per platform
    Check,
    /// Obtain a session for one platform and report its state
    Login {
        platform: Platform,
        /// Persist the session as a recorded session
        #[arg(long)]
        save: bool,
        #[arg(long)]
        interactive: bool,
    },
    /// Score a JSON array of jobs against a profile
    Score {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        jobs: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Search {
            profile,
            platforms,
            query,
            format,
            min_score,
            interactive,
        } => {
            let profile = profile.as_deref().map(load_profile).transpose()?;
            let platforms = if platforms.is_empty() {
                config.search.platforms.clone()
            } else {
                platforms
            };
            let query = SearchQuery::new(
                query.unwrap_or_else(|| config.search.query.clone()),
                config.search.location.clone(),
                config.search.max_listings_per_platform,
            );
            search(&config, query, platforms, profile, format, min_score, interactive).await
        }
        Command::Check => check(&config).await,
        Command::Login {
            platform,
            save,
            interactive,
        } => login(&config, platform, save, interactive).await,
        Command::Score {
            profile,
            jobs,
            format,
        } => {
            let profile = load_profile(&profile)?;
            let content =
                std::fs::read_to_string(&jobs).with_context(|| format!("Failed to read {}", jobs.display()))?;
            let jobs: Vec<Job> =
                serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", jobs.display()))?;
            let scorer = Scorer::new(config.scoring.clone());
            print_ranked(&scorer.rank(&jobs, &profile), format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ===== Wiring =====

fn session_store(config: &AppConfig, interactive: bool) -> Arc<SessionStore> {
    let resolver: Arc<dyn ChallengeResolver> = if interactive || config.session.interactive {
        Arc::new(ConsolePrompt {
            wait: Duration::from_secs(config.session.challenge_wait_secs),
        })
    } else {
        Arc::new(FailFast)
    };
    let pacer = Arc::new(Pacer::new(config.aggregation.request_delay()));
    let login = AutomatedLogin::new(config.http.clone(), config.retry.clone(), pacer, resolver);
    Arc::new(SessionStore::new(
        Arc::new(EnvCredentials::load()),
        Arc::new(login),
        RecordedSessions::new(&config.session.sessions_dir),
        config.session.ttl(),
    ))
}

fn registry(config: &AppConfig) -> DriverRegistry {
    DriverRegistry::with_defaults(Arc::new(HttpFetcher::new(config.http.clone())), config.retry.clone())
}

fn load_profile(path: &Path) -> Result<Profile> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read profile {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse profile {}", path.display()))
}

// ===== Commands =====

async fn search(
    config: &AppConfig,
    query: SearchQuery,
    platforms: Vec<Platform>,
    profile: Option<Profile>,
    format: OutputFormat,
    min_score: Option<u8>,
    interactive: bool,
) -> Result<ExitCode> {
    let filter = config.filter.compile().context("Invalid filter configuration")?;
    let aggregator = Aggregator::new(
        registry(config),
        session_store(config, interactive),
        query,
        &config.aggregation,
    )
    .with_platforms(platforms);

    let aggregation = match aggregator.run().await {
        Ok(aggregation) => aggregation,
        Err(ScoutError::NoJobsFound(report)) => {
            eprintln!("No jobs found on any platform:");
            for outcome in &report.outcomes {
                eprintln!("  {:<11} {}", outcome.platform.as_str(), outcome.reason());
            }
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    let jobs = filter.apply(aggregation.jobs);
    info!("{} jobs after filtering", jobs.len());

    match profile {
        Some(profile) => {
            let scorer = Scorer::new(config.scoring.clone());
            let ranked: Vec<MatchResult<'_>> = scorer
                .rank(&jobs, &profile)
                .into_iter()
                .filter(|r| min_score.map_or(true, |min| r.score >= min))
                .collect();
            print_ranked(&ranked, format)?;
        }
        None => {
            if min_score.is_some() {
                warn!("--min-score has no effect without --profile");
            }
            print_jobs(&jobs, format)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn check(config: &AppConfig) -> Result<ExitCode> {
    let store = session_store(config, false);
    let registry = registry(config);

    println!(
        "{:<11} {:<8} {:<12} {:<11} {:<9}",
        "PLATFORM", "ENABLED", "CREDENTIALS", "LOGIN FLOW", "RECORDED"
    );
    for platform in Platform::ALL {
        let enabled = config.search.platforms.contains(&platform);
        let requires_auth = registry.get(platform).is_some_and(|d| d.requires_auth());
        let credentials = if store.check_credentials(platform) {
            "yes"
        } else if requires_auth {
            "MISSING"
        } else {
            "no"
        };
        println!(
            "{:<11} {:<8} {:<12} {:<11} {:<9}",
            platform.as_str(),
            yes_no(enabled),
            credentials,
            yes_no(LoginFlow::for_platform(platform).is_some()),
            yes_no(store.recorded().exists(platform).await),
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn login(config: &AppConfig, platform: Platform, save: bool, interactive: bool) -> Result<ExitCode> {
    let store = session_store(config, interactive);
    let session = store.session_for(platform).await;

    if session.is_authenticated {
        println!(
            "{}: authenticated ({} cookies)",
            platform,
            session.cookies.len()
        );
        if save {
            let path = store.recorded().save(&session).await?;
            println!("Saved to {}", path.display());
        }
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{}: {} ({})",
            platform,
            session.error.map(|e| e.to_string()).unwrap_or_else(|| "failed".to_string()),
            session.error_details.as_deref().unwrap_or("no details")
        );
        Ok(ExitCode::FAILURE)
    }
}

// ===== Output =====

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[derive(Serialize)]
struct Row<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<u8>,
    id: &'a str,
    source: &'static str,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    remote: bool,
    job_type: String,
    salary: String,
    url: &'a str,
    matched_skills: String,
}

impl<'a> Row<'a> {
    fn new(job: &'a Job, score: Option<u8>, matched: &[String]) -> Self {
        let salary = job
            .salary
            .as_ref()
            .map(|s| match (s.min, s.max, &s.text) {
                (Some(min), Some(max), _) if min != max => format!("{:.0}-{:.0}", min, max),
                (Some(v), _, _) | (None, Some(v), _) => format!("{:.0}", v),
                (None, None, Some(text)) => text.clone(),
                (None, None, None) => String::new(),
            })
            .unwrap_or_default();
        Self {
            score,
            id: &job.id,
            source: job.source.as_str(),
            title: &job.title,
            company: &job.company,
            location: &job.location,
            remote: job.is_remote,
            job_type: job.job_type.to_string(),
            salary,
            url: job.application_url.as_deref().unwrap_or(""),
            matched_skills: matched.join("; "),
        }
    }
}

fn print_rows(rows: &[Row<'_>], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows).context("Failed to serialize results")?);
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                writer.serialize(row).context("Failed to write CSV row")?;
            }
            writer.flush().context("Failed to flush CSV output")?;
        }
        OutputFormat::Table => {
            println!(
                "{:>5}  {:<10} {:<48} {:<24} {:<20} URL",
                "SCORE", "SOURCE", "TITLE", "COMPANY", "LOCATION"
            );
            for row in rows {
                println!(
                    "{:>5}  {:<10} {:<48} {:<24} {:<20} {}",
                    row.score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    row.source,
                    truncate_chars(row.title, 48),
                    truncate_chars(row.company, 24),
                    truncate_chars(row.location, 20),
                    row.url
                );
            }
            println!("{} job(s)", rows.len());
        }
    }
    Ok(())
}

fn print_jobs(jobs: &[Job], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(jobs).context("Failed to serialize jobs")?);
        return Ok(());
    }
    let rows: Vec<Row<'_>> = jobs.iter().map(|job| Row::new(job, None, &[])).collect();
    print_rows(&rows, format)
}

fn print_ranked(results: &[MatchResult<'_>], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(results).context("Failed to serialize results")?);
        return Ok(());
    }
    let rows: Vec<Row<'_>> = results
        .iter()
        .map(|r| Row::new(r.job, Some(r.score), &r.matched_skills))
        .collect();
    print_rows(&rows, format)
}
