//! Bantay moderation: phone and language verification, strike
//! enforcement, appeals, and the admin control surface.

pub mod admin;
pub mod authz;
pub mod config;
pub mod contact;
pub mod enforcement;
pub mod error;
pub mod groups;
pub mod language;
pub mod phone;
pub mod service;
mod store;
pub mod verification;

pub use admin::ModerationStats;
pub use authz::{Authorizer, StaticAdminSet};
pub use config::{LanguagePrompt, LanguageTestConfig, ModerationConfig};
pub use contact::ContactPayload;
pub use enforcement::ViolationOutcome;
pub use error::{ModerationError, ModerationResult};
pub use groups::GroupRegistry;
pub use service::{JoinDecision, ModerationService, UserProfile};
pub use verification::{ContactOutcome, LanguageOutcome, VerificationPrompt};
