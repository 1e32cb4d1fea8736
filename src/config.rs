// src/config.rs
//! Layered configuration: defaults, then the environment's section of
//! `jobradar.yaml`, then a few environment-variable overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::filter::FilterConfig;
use crate::matching::ScoringWeights;
use crate::retry::RetryPolicy;
use crate::types::{Platform, DEFAULT_IDENTITY};

const DEFAULT_CONFIG_FILE: &str = "jobradar.yaml";
/// One year
const MAX_SESSION_TTL_MINUTES: i64 = 525_600;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchSettings,
    pub aggregation: AggregationSettings,
    pub retry: RetryPolicy,
    pub session: SessionSettings,
    pub filter: FilterConfig,
    pub scoring: ScoringWeights,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub query: String,
    pub location: String,
    pub max_listings_per_platform: usize,
    pub platforms: Vec<Platform>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            query: "QA automation engineer".to_string(),
            location: "Worldwide".to_string(),
            max_listings_per_platform: 20,
            platforms: Platform::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// 1 runs drivers one after another; larger values bound parallelism
    pub concurrency: usize,
    pub request_delay_ms: u64,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            request_delay_ms: 2_000,
        }
    }
}

impl AggregationSettings {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub sessions_dir: PathBuf,
    pub ttl_minutes: i64,
    pub interactive: bool,
    pub challenge_wait_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("sessions"),
            ttl_minutes: 720,
            interactive: false,
            challenge_wait_secs: 300,
        }
    }
}

impl SessionSettings {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.ttl_minutes.clamp(1, MAX_SESSION_TTL_MINUTES))
            .unwrap_or_else(|| chrono::Duration::hours(12))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_IDENTITY.to_string(),
            timeout_secs: 30,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration for the current environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let environment = Self::get_environment();
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var("JOBRADAR_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };
        info!(
            "Loading configuration for environment: {} ({})",
            environment,
            config_path.display()
        );

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            Self::from_yaml_str(&content, &environment)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else if path.is_some() {
            anyhow::bail!("Config file not found: {}", config_path.display());
        } else {
            info!("No {} found, using defaults", config_path.display());
            Self::default()
        };

        config.apply_env_overrides()?;
        config.session.sessions_dir = Self::resolve_path(&config.session.sessions_dir)?;
        config.validate()?;
        Ok(config)
    }

    fn get_environment() -> String {
        std::env::var("JOBRADAR_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "local".to_string())
    }

    /// Pick one environment section out of a multi-environment YAML document
    pub fn from_yaml_str(content: &str, environment: &str) -> Result<Self> {
        let sections: HashMap<String, AppConfig> =
            serde_yaml::from_str(content).context("Invalid YAML configuration")?;

        sections.get(environment).cloned().with_context(|| {
            let mut known: Vec<&String> = sections.keys().collect();
            known.sort();
            format!(
                "No '{}' section in configuration (found: {:?})",
                environment, known
            )
        })
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(query) = std::env::var("JOBRADAR_QUERY") {
            self.search.query = query;
        }
        if let Ok(dir) = std::env::var("JOBRADAR_SESSIONS_DIR") {
            self.session.sessions_dir = PathBuf::from(dir);
        }
        if let Ok(concurrency) = std::env::var("JOBRADAR_CONCURRENCY") {
            self.aggregation.concurrency = concurrency
                .parse()
                .context("JOBRADAR_CONCURRENCY must be a positive integer")?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.aggregation.concurrency == 0 {
            anyhow::bail!("aggregation.concurrency must be at least 1");
        }
        if self.search.max_listings_per_platform == 0 {
            anyhow::bail!("search.max_listings_per_platform must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if !(1..=MAX_SESSION_TTL_MINUTES).contains(&self.session.ttl_minutes) {
            anyhow::bail!(
                "session.ttl_minutes must be between 1 and {}",
                MAX_SESSION_TTL_MINUTES
            );
        }
        self.filter
            .compile()
            .context("Invalid filter configuration")?;
        Ok(())
    }

    fn resolve_path(path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            let current_dir = std::env::current_dir().context("Failed to get current directory")?;
            Ok(current_dir.join(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
local:
  search:
    query: "sdet"
    max_listings_per_platform: 5
    platforms: [remotive, remoteok]
  aggregation:
    concurrency: 2
    request_delay_ms: 0
  scoring:
    remote_bonus: 25
production:
  session:
    sessions_dir: /var/lib/jobradar/sessions
    interactive: false
"#;

    #[test]
    fn test_environment_section_is_selected() {
        let config = AppConfig::from_yaml_str(SAMPLE, "local").unwrap();
        assert_eq!(config.search.query, "sdet");
        assert_eq!(config.search.max_listings_per_platform, 5);
        assert_eq!(
            config.search.platforms,
            vec![Platform::Remotive, Platform::RemoteOk]
        );
        assert_eq!(config.aggregation.concurrency, 2);
        assert_eq!(config.scoring.remote_bonus, 25.0);
        // untouched sections keep their defaults
        assert_eq!(config.session.ttl_minutes, 720);
        assert_eq!(config.scoring.skill_weight, 40.0);

        let production = AppConfig::from_yaml_str(SAMPLE, "production").unwrap();
        assert_eq!(
            production.session.sessions_dir,
            PathBuf::from("/var/lib/jobradar/sessions")
        );
        assert_eq!(production.search.max_listings_per_platform, 20);
    }

    #[test]
    fn test_missing_environment_section_is_an_error() {
        let err = AppConfig::from_yaml_str(SAMPLE, "staging").unwrap_err();
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn test_defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());

        let mut config = AppConfig::default();
        config.aggregation.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_ttl_is_bounded() {
        let config = AppConfig::from_yaml_str(
            "local:\n  session:\n    ttl_minutes: 9223372036854775807\n",
            "local",
        )
        .unwrap();
        assert!(config.validate().is_err());
        assert_eq!(config.session.ttl(), chrono::Duration::days(365));

        let mut session = SessionSettings::default();
        session.ttl_minutes = -5;
        assert_eq!(session.ttl(), chrono::Duration::minutes(1));
        session.ttl_minutes = 90;
        assert_eq!(session.ttl(), chrono::Duration::minutes(90));
    }
}
