// src/types/job.rs
//! Canonical job record shared by every platform driver

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ===== Platforms =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Indeed,
    Upwork,
    Freelancer,
    Remotive,
    RemoteOk,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::LinkedIn,
        Platform::Indeed,
        Platform::Upwork,
        Platform::Freelancer,
        Platform::Remotive,
        Platform::RemoteOk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Indeed => "indeed",
            Platform::Upwork => "upwork",
            Platform::Freelancer => "freelancer",
            Platform::Remotive => "remotive",
            Platform::RemoteOk => "remoteok",
        }
    }

    /// Root used to resolve relative links found in listings
    pub fn base_url(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "https://www.linkedin.com",
            Platform::Indeed => "https://www.indeed.com",
            Platform::Upwork => "https://www.upwork.com",
            Platform::Freelancer => "https://www.freelancer.com",
            Platform::Remotive => "https://remotive.com",
            Platform::RemoteOk => "https://remoteok.com",
        }
    }

    /// Prefix used for credential environment variables, e.g. `JOBRADAR_LINKEDIN`
    pub fn env_prefix(&self) -> String {
        format!("JOBRADAR_{}", self.as_str().to_uppercase())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linkedin" => Ok(Platform::LinkedIn),
            "indeed" => Ok(Platform::Indeed),
            "upwork" => Ok(Platform::Upwork),
            "freelancer" => Ok(Platform::Freelancer),
            "remotive" => Ok(Platform::Remotive),
            "remoteok" | "remote-ok" | "remote_ok" => Ok(Platform::RemoteOk),
            other => Err(format!(
                "Unknown platform: {}. Use one of: {}",
                other,
                Platform::ALL
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

// ===== Job type =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Freelance,
    Project,
}

impl JobType {
    /// Map the many spellings platforms use onto the canonical set
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "full-time" | "fulltime" | "permanent" => Some(JobType::FullTime),
            "part-time" | "parttime" => Some(JobType::PartTime),
            "contract" | "contractor" | "contract-to-hire" => Some(JobType::Contract),
            "temporary" | "temp" | "internship" => Some(JobType::Temporary),
            "freelance" | "freelancer" | "hourly" => Some(JobType::Freelance),
            "project" | "fixed" | "fixed-price" => Some(JobType::Project),
            _ => None,
        }
    }

    /// Types that earn the freelance/contract bonus when scoring
    pub fn is_flexible(&self) -> bool {
        matches!(
            self,
            JobType::Freelance | JobType::Project | JobType::Contract | JobType::Temporary
        )
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobType::FullTime => "full-time",
            JobType::PartTime => "part-time",
            JobType::Contract => "contract",
            JobType::Temporary => "temporary",
            JobType::Freelance => "freelance",
            JobType::Project => "project",
        };
        f.write_str(label)
    }
}

// ===== Salary =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryPeriod {
    Hour,
    Day,
    Month,
    Year,
    Project,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Salary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<SalaryPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Salary {
    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

// ===== Job =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub is_remote: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub posted_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub application_url: Option<String>,
    #[serde(default)]
    pub easy_apply: bool,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<Salary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_locations: Option<Vec<String>>,
    pub source: Platform,
}

impl Job {
    /// Start a record with the documented defaults filled in
    pub fn new(source: Platform, native_id: &str, title: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", source, native_id.trim()),
            title: title.into(),
            company: String::new(),
            location: "Remote".to_string(),
            is_remote: false,
            description: String::new(),
            requirements: Vec::new(),
            skills: Vec::new(),
            posted_date: None,
            application_url: None,
            easy_apply: false,
            job_type: JobType::default(),
            salary: None,
            allowed_locations: None,
            source,
        }
    }

    /// Add a skill unless an equal one (case-insensitive) is already present
    pub fn push_skill(&mut self, skill: &str) {
        let skill = skill.trim();
        if skill.is_empty() {
            return;
        }
        if !self.skills.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            self.skills.push(skill.to_string());
        }
    }

    /// `application_url`, when present, must be an absolute HTTP(S) URL
    pub fn has_valid_url(&self) -> bool {
        match &self.application_url {
            None => true,
            Some(raw) => url::Url::parse(raw)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
                .unwrap_or(false),
        }
    }
}
