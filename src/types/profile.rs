// src/types/profile.rs
use serde::{Deserialize, Serialize};

use super::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub years: f32,
    #[serde(default)]
    pub level: SkillLevel,
    #[serde(default)]
    pub category: Option<String>,
}

impl Skill {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            years: 0.0,
            level: SkillLevel::default(),
            category: None,
        }
    }
}

/// Candidate profile supplied by the caller; read-only during scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<Skill>>,
    #[serde(default)]
    pub preferred_locations: Vec<String>,
    #[serde(default)]
    pub experience_years: Option<f32>,
}

impl Profile {
    pub fn with_skills(names: &[&str]) -> Self {
        Self {
            skills: Some(names.iter().map(|n| Skill::new(n)).collect()),
            ..Default::default()
        }
    }

    /// Skills with a usable name; `None` when the list is missing or holds nothing usable
    pub fn valid_skills(&self) -> Option<Vec<&Skill>> {
        let skills: Vec<&Skill> = self
            .skills
            .as_ref()?
            .iter()
            .filter(|s| !s.name.trim().is_empty())
            .collect();
        if skills.is_empty() {
            None
        } else {
            Some(skills)
        }
    }

    /// Explicit total if given, otherwise the longest single skill history
    pub fn total_years(&self) -> f32 {
        if let Some(years) = self.experience_years {
            return years;
        }
        self.skills
            .iter()
            .flatten()
            .map(|s| s.years)
            .fold(0.0_f32, f32::max)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult<'a> {
    pub job: &'a Job,
    pub score: u8,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub reasons: Vec<String>,
}

impl<'a> MatchResult<'a> {
    pub fn zero(job: &'a Job) -> Self {
        Self {
            job,
            score: 0,
            matched_skills: Vec::new(),
            missing_skills: Vec::new(),
            reasons: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parses_from_toml() {
        let raw = r#"
            name = "Ada"
            preferred_locations = ["Berlin", "Remote"]

            [[skills]]
            name = "Selenium"
            years = 4
            level = "advanced"
            category = "automation"

            [[skills]]
            name = "Python"
            years = 2.5
        "#;
        let profile: Profile = toml::from_str(raw).unwrap();
        let skills = profile.valid_skills().unwrap();
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].level, SkillLevel::Advanced);
        assert_eq!(profile.total_years(), 4.0);
    }

    #[test]
    fn test_missing_or_blank_skills_are_invalid() {
        assert!(Profile::default().valid_skills().is_none());
        assert!(Profile::with_skills(&["", "  "]).valid_skills().is_none());
        assert!(Profile::with_skills(&["Cypress"]).valid_skills().is_some());
    }

    #[test]
    fn test_explicit_experience_wins() {
        let mut profile = Profile::with_skills(&["Java"]);
        profile.experience_years = Some(1.0);
        assert_eq!(profile.total_years(), 1.0);
    }
}
