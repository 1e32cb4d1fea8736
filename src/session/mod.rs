// src/session/mod.rs
pub mod challenge;
pub mod login;
pub mod provider;
pub mod recorded;
pub mod store;

pub use challenge::{detect_challenge, ChallengeResolver, ConsolePrompt, FailFast};
pub use login::{Authenticator, AutomatedLogin, LoginFlow};
pub use provider::{LoginProvider, ProviderKind, RecordedProvider, SessionProvider};
pub use recorded::RecordedSessions;
pub use store::SessionStore;
