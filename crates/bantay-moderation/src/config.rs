//! Moderation configuration.

use chrono::TimeDelta;
use serde::Deserialize;

use crate::error::ModerationError;

/// A language-check question with the answers it accepts.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LanguagePrompt {
    pub question: String,
    /// Words or short phrases; matched case-insensitively on word
    /// boundaries.
    pub accepted_keywords: Vec<String>,
}

impl LanguagePrompt {
    fn new(question: &str, keywords: &[&str]) -> Self {
        Self {
            question: question.into(),
            accepted_keywords: keywords.iter().map(|k| (*k).into()).collect(),
        }
    }
}

/// Configuration for the Filipino language check.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LanguageTestConfig {
    pub prompts: Vec<LanguagePrompt>,
    /// Distinct accepted keywords an answer must contain to pass.
    pub min_keyword_hits: usize,
}

impl Default for LanguageTestConfig {
    fn default() -> Self {
        Self {
            prompts: vec![
                LanguagePrompt::new(
                    "Kumusta ka ngayong araw? Sumagot sa isang buong pangungusap.",
                    &[
                        "mabuti", "maayos", "ayos", "okay lang", "masaya", "pagod",
                        "salamat", "naman", "ako", "po", "medyo", "lang",
                    ],
                ),
                LanguagePrompt::new(
                    "Ano ang paborito mong pagkaing Pilipino at bakit?",
                    &[
                        "adobo", "sinigang", "lechon", "kare kare", "sisig", "pancit",
                        "lumpia", "halo halo", "tinola", "bulalo", "paborito", "gusto",
                        "kasi", "masarap", "ko",
                    ],
                ),
                LanguagePrompt::new(
                    "Saan ka nakatira sa Pilipinas?",
                    &[
                        "nakatira", "taga", "ako", "sa", "probinsya", "lungsod", "bayan",
                        "maynila", "cebu", "davao", "ngayon", "po",
                    ],
                ),
            ],
            min_keyword_hits: 2,
        }
    }
}

/// Longest accepted strike lifetime: one hundred years.
pub const MAX_STRIKE_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Configuration for verification and enforcement.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Active strikes that trigger an automatic ban (default: 3).
    pub strike_threshold: u32,
    /// Strike lifetime in seconds. `None` means strikes never expire.
    pub strike_ttl_secs: Option<u64>,
    /// Failed language attempts before the user is rejected (default: 3).
    pub max_language_attempts: u32,
    pub language_test: LanguageTestConfig,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            strike_threshold: 3,
            strike_ttl_secs: None,
            max_language_attempts: 3,
            language_test: LanguageTestConfig::default(),
        }
    }
}

impl ModerationConfig {
    /// Strike lifetime. Values too large for a `TimeDelta` mean strikes
    /// never expire.
    pub fn strike_ttl(&self) -> Option<TimeDelta> {
        self.strike_ttl_secs
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(TimeDelta::try_seconds)
    }

    /// Reject configurations the state machine cannot run with.
    pub fn validate(&self) -> Result<(), ModerationError> {
        if self.strike_threshold == 0 {
            return Err(ModerationError::Validation(
                "strike_threshold must be at least 1".into(),
            ));
        }
        if self.max_language_attempts == 0 {
            return Err(ModerationError::Validation(
                "max_language_attempts must be at least 1".into(),
            ));
        }
        if let Some(secs) = self.strike_ttl_secs {
            if secs == 0 || secs > MAX_STRIKE_TTL_SECS {
                return Err(ModerationError::Validation(format!(
                    "strike_ttl_secs must be between 1 and {MAX_STRIKE_TTL_SECS}"
                )));
            }
        }
        if self.language_test.prompts.is_empty() {
            return Err(ModerationError::Validation(
                "at least one language prompt is required".into(),
            ));
        }
        if let Some(prompt) = self
            .language_test
            .prompts
            .iter()
            .find(|p| p.accepted_keywords.len() < self.language_test.min_keyword_hits)
        {
            return Err(ModerationError::Validation(format!(
                "prompt '{}' has fewer keywords than min_keyword_hits",
                prompt.question
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ModerationConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = ModerationConfig {
            strike_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ModerationError::Validation(_))
        ));
    }

    #[test]
    fn empty_prompt_list_is_rejected() {
        let mut config = ModerationConfig::default();
        config.language_test.prompts.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn strikes_never_expire_by_default() {
        assert_eq!(ModerationConfig::default().strike_ttl(), None);
        let config = ModerationConfig {
            strike_ttl_secs: Some(60),
            ..Default::default()
        };
        assert_eq!(config.strike_ttl(), Some(TimeDelta::seconds(60)));
    }

    #[test]
    fn out_of_range_ttl_is_rejected() {
        for secs in [0, MAX_STRIKE_TTL_SECS + 1, u64::MAX] {
            let config = ModerationConfig {
                strike_ttl_secs: Some(secs),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{secs}");
        }
        let config = ModerationConfig {
            strike_ttl_secs: Some(MAX_STRIKE_TTL_SECS),
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn unrepresentable_ttl_never_expires() {
        let config = ModerationConfig {
            strike_ttl_secs: Some(u64::MAX),
            ..Default::default()
        };
        assert_eq!(config.strike_ttl(), None);
    }
}
