//! Job discovery across employment platforms: per-platform sessions, scraping
//! drivers, failure-isolated aggregation, relevance filtering and profile scoring.

pub mod aggregator;
pub mod config;
pub mod credentials;
pub mod drivers;
pub mod error;
pub mod filter;
pub mod matching;
pub mod retry;
pub mod session;
pub mod types;
pub mod utils;

pub use aggregator::{Aggregation, Aggregator};
pub use config::AppConfig;
pub use drivers::{Driver, DriverRegistry, SearchQuery};
pub use error::{AggregationReport, PlatformOutcome, ScoutError};
pub use filter::{FilterConfig, JobFilter};
pub use matching::{Scorer, ScoringWeights};
pub use session::SessionStore;
pub use types::{AuthSession, Job, JobType, MatchResult, Platform, Profile, Skill};
