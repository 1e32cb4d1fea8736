// src/types/mod.rs
pub mod job;
pub mod profile;
pub mod session;

pub use job::{Job, JobType, Platform, Salary, SalaryPeriod};
pub use profile::{MatchResult, Profile, Skill, SkillLevel};
pub use session::{AuthErrorKind, AuthSession, SessionCookie, SessionState, DEFAULT_IDENTITY};
