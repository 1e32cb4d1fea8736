// src/matching.rs
//! Profile-to-job compatibility scoring

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Job, MatchResult, Profile};
use crate::utils::{contains_word, count_word_occurrences, normalize_key};

/// Points awarded by each scoring rule. Loaded from the `scoring` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub flexible_bonus: f64,
    pub remote_bonus: f64,
    pub preferred_location_bonus: f64,
    /// Awarded in full when every listed job skill is covered by the profile
    pub skill_weight: f64,
    pub text_match_per_hit: f64,
    pub text_match_cap: f64,
    /// Used when the job lists no skills and none of the profile's appear in its text
    pub text_unverified: f64,
    pub role_bonus: f64,
    pub experience_bonus: f64,
    pub min_experience_years: f64,
    pub role_keywords: Vec<String>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            flexible_bonus: 5.0,
            remote_bonus: 30.0,
            preferred_location_bonus: 15.0,
            skill_weight: 40.0,
            text_match_per_hit: 5.0,
            text_match_cap: 30.0,
            text_unverified: 20.0,
            role_bonus: 20.0,
            experience_bonus: 10.0,
            min_experience_years: 2.0,
            role_keywords: [
                "qa",
                "quality assurance",
                "quality engineer",
                "sdet",
                "test",
                "tester",
                "testing",
                "test automation",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scorer {
    weights: ScoringWeights,
}

fn points(value: f64) -> String {
    format!("+{:.0}", value)
}

impl Scorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Weighted sum of the rules below, clamped to 0..=100 and rounded.
    /// A profile without usable skills scores 0 with no detail.
    pub fn score<'a>(&self, job: &'a Job, profile: &Profile) -> MatchResult<'a> {
        let Some(skills) = profile.valid_skills() else {
            debug!(id = %job.id, "Profile has no usable skills, scoring 0");
            return MatchResult::zero(job);
        };
        let w = &self.weights;
        let mut result = MatchResult::zero(job);
        let mut total = 0.0;

        if job.job_type.is_flexible() {
            total += w.flexible_bonus;
            result
                .reasons
                .push(format!("{} engagement ({})", job.job_type, points(w.flexible_bonus)));
        }

        if job.is_remote {
            total += w.remote_bonus;
            result.reasons.push(format!("Remote position ({})", points(w.remote_bonus)));
        } else if let Some(preferred) = profile
            .preferred_locations
            .iter()
            .find(|p| !p.trim().is_empty() && contains_word(&job.location, p))
        {
            total += w.preferred_location_bonus;
            result.reasons.push(format!(
                "Preferred location {} ({})",
                preferred,
                points(w.preferred_location_bonus)
            ));
        }

        if !job.skills.is_empty() {
            let profile_keys: Vec<String> = skills.iter().map(|s| normalize_key(&s.name)).collect();
            for skill in &job.skills {
                if profile_keys.contains(&normalize_key(skill)) {
                    result.matched_skills.push(skill.clone());
                } else {
                    result.missing_skills.push(skill.clone());
                }
            }
            let earned = result.matched_skills.len() as f64 / job.skills.len() as f64 * w.skill_weight;
            total += earned;
            if !result.matched_skills.is_empty() {
                result.reasons.push(format!(
                    "Matches {}/{} listed skills ({})",
                    result.matched_skills.len(),
                    job.skills.len(),
                    points(earned)
                ));
            }
        } else {
            let text = format!("{}\n{}", job.title, job.description);
            let mut hits = 0;
            for skill in &skills {
                let found = count_word_occurrences(&text, &skill.name);
                if found > 0 {
                    hits += found;
                    result.matched_skills.push(skill.name.trim().to_string());
                }
            }
            if hits > 0 {
                let earned = (hits as f64 * w.text_match_per_hit).min(w.text_match_cap);
                total += earned;
                result.reasons.push(format!(
                    "Profile skills mentioned {} time(s) in the posting ({})",
                    hits,
                    points(earned)
                ));
            } else {
                total += w.text_unverified;
                result.reasons.push(format!(
                    "No skills listed; role plausibly relevant but unverified ({})",
                    points(w.text_unverified)
                ));
            }
        }

        if w
            .role_keywords
            .iter()
            .any(|k| contains_word(&job.title, k) || contains_word(&job.description, k))
        {
            total += w.role_bonus;
            result.reasons.push(format!("QA/testing role ({})", points(w.role_bonus)));
        }

        let years = profile.total_years() as f64;
        if years >= w.min_experience_years {
            total += w.experience_bonus;
            result
                .reasons
                .push(format!("{:.1} years of experience ({})", years, points(w.experience_bonus)));
        }

        result.score = total.clamp(0.0, 100.0).round() as u8;
        result
    }

    /// Score every job and sort by score, highest first; ties keep input order
    pub fn rank<'a>(&self, jobs: &'a [Job], profile: &Profile) -> Vec<MatchResult<'a>> {
        let mut results: Vec<MatchResult<'a>> = jobs.iter().map(|job| self.score(job, profile)).collect();
        results.sort_by(|a, b| b.score.cmp(&a.score));
        results
    }
}
