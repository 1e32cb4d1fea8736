// src/filter.rs
//! Relevance and location filtering, then within-run deduplication

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::types::Job;
use crate::utils::normalize_key;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Whole-word, case-insensitive role patterns; one must appear in title, description or skills
    pub relevance_patterns: Vec<String>,
    pub accepted_keywords: Vec<String>,
    /// Regions the candidate can work from, accepted like the keywords above
    pub target_regions: Vec<String>,
    /// Restrictions that rule a non-remote job out unless an accepted keyword is also present
    pub disallowed_regions: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            relevance_patterns: strings(&[
                "qa",
                "quality assurance",
                "quality engineer",
                "test engineer",
                "test automation",
                "automation tester",
                "sdet",
                "tester",
                "software testing",
            ]),
            accepted_keywords: strings(&["remote", "worldwide", "anywhere", "global"]),
            target_regions: Vec::new(),
            disallowed_regions: strings(&[
                "us only",
                "usa only",
                "u.s. only",
                "united states only",
                "us citizens only",
                "canada only",
                "uk only",
                "eu only",
            ]),
        }
    }
}

impl FilterConfig {
    pub fn compile(&self) -> Result<JobFilter, regex::Error> {
        Ok(JobFilter {
            relevance: word_alternation(&self.relevance_patterns)?,
            accepted: word_alternation(&self.accepted_keywords)?,
            target: word_alternation(&self.target_regions)?,
            disallowed: word_alternation(&self.disallowed_regions)?,
        })
    }
}

/// `\b(?:a|b|c)\b`, case-insensitive; `None` when no usable term is configured
fn word_alternation(terms: &[String]) -> Result<Option<Regex>, regex::Error> {
    let escaped: Vec<String> = terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"(?i)\b(?:{})\b", escaped.join("|"))).map(Some)
}

fn matches(pattern: &Option<Regex>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|p| p.is_match(text))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterStats {
    pub input: usize,
    pub irrelevant: usize,
    pub outside_location: usize,
    pub duplicates: usize,
    pub kept: usize,
}

#[derive(Debug, Clone)]
pub struct JobFilter {
    relevance: Option<Regex>,
    accepted: Option<Regex>,
    target: Option<Regex>,
    disallowed: Option<Regex>,
}

impl JobFilter {
    pub fn is_relevant(&self, job: &Job) -> bool {
        let text = format!("{}\n{}\n{}", job.title, job.description, job.skills.join(", "));
        matches(&self.relevance, &text)
    }

    fn is_accepted_place(&self, text: &str) -> bool {
        matches(&self.accepted, text) || matches(&self.target, text)
    }

    /// Remote jobs always pass. Otherwise a non-empty allowed list made up
    /// solely of disallowed regions excludes the job, and the location (plus
    /// any allowed locations) must name an accepted keyword or target region.
    pub fn location_passes(&self, job: &Job) -> bool {
        if job.is_remote {
            return true;
        }
        let allowed: &[String] = job.allowed_locations.as_deref().unwrap_or(&[]);

        let only_disallowed = !allowed.is_empty()
            && allowed
                .iter()
                .all(|a| matches(&self.disallowed, a) && !self.is_accepted_place(a));
        if only_disallowed {
            return false;
        }

        self.is_accepted_place(&job.location) || allowed.iter().any(|a| self.is_accepted_place(a))
    }

    pub fn accepts(&self, job: &Job) -> bool {
        self.is_relevant(job) && self.location_passes(job)
    }

    /// Filter, then deduplicate, keeping the first occurrence of each key
    pub fn apply(&self, jobs: Vec<Job>) -> Vec<Job> {
        self.apply_with_stats(jobs).0
    }

    pub fn apply_with_stats(&self, jobs: Vec<Job>) -> (Vec<Job>, FilterStats) {
        let mut stats = FilterStats {
            input: jobs.len(),
            ..Default::default()
        };

        let mut relevant = Vec::with_capacity(jobs.len());
        for job in jobs {
            if !self.is_relevant(&job) {
                debug!(id = %job.id, "Not relevant: {}", job.title);
                stats.irrelevant += 1;
            } else if !self.location_passes(&job) {
                debug!(id = %job.id, "Location not accepted: {}", job.location);
                stats.outside_location += 1;
            } else {
                relevant.push(job);
            }
        }

        let before = relevant.len();
        let kept = dedup(relevant);
        stats.duplicates = before - kept.len();
        stats.kept = kept.len();
        info!(
            "Filtered {} jobs: {} kept, {} irrelevant, {} outside location, {} duplicates",
            stats.input, stats.kept, stats.irrelevant, stats.outside_location, stats.duplicates
        );
        (kept, stats)
    }
}

/// Normalized application URL, or company + title when there is none
pub fn dedup_key(job: &Job) -> String {
    match job.application_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => url.to_lowercase(),
        None => format!("{}|{}", normalize_key(&job.company), normalize_key(&job.title)),
    }
}

/// Keep the first job for each dedup key, in input order
pub fn dedup(jobs: Vec<Job>) -> Vec<Job> {
    let mut seen = HashSet::new();
    jobs.into_iter().filter(|job| seen.insert(dedup_key(job))).collect()
}
