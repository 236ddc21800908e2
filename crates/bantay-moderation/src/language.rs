//! Deterministic scoring for the Filipino language check.

use bantay_core::models::user_record::PlatformUserId;

use crate::config::{LanguagePrompt, LanguageTestConfig};

/// Result of scoring one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageScore {
    pub hits: usize,
    pub passed: bool,
}

/// The prompt a user is asked. Stable across retries and restarts.
pub fn prompt_for(config: &LanguageTestConfig, user_id: PlatformUserId) -> Option<&LanguagePrompt> {
    let len = i64::try_from(config.prompts.len()).ok().filter(|len| *len > 0)?;
    let index = usize::try_from(user_id.rem_euclid(len)).ok()?;
    config.prompts.get(index)
}

/// Lowercase, drop punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count the distinct accepted keywords present in `answer`.
pub fn score(prompt: &LanguagePrompt, answer: &str, min_hits: usize) -> LanguageScore {
    let padded = format!(" {} ", normalize(answer));

    let mut keywords: Vec<String> = prompt
        .accepted_keywords
        .iter()
        .map(|k| normalize(k))
        .filter(|k| !k.is_empty())
        .collect();
    keywords.sort();
    keywords.dedup();

    let hits = keywords
        .iter()
        .filter(|k| padded.contains(&format!(" {k} ")))
        .count();

    LanguageScore {
        hits,
        passed: hits >= min_hits.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> LanguagePrompt {
        LanguagePrompt {
            question: "Kumusta ka?".into(),
            accepted_keywords: vec!["mabuti".into(), "Okay lang".into(), "salamat".into()],
        }
    }

    #[test]
    fn passing_answer_scores_enough_hits() {
        let s = score(&prompt(), "Mabuti naman, salamat!", 2);
        assert_eq!(s, LanguageScore { hits: 2, passed: true });
    }

    #[test]
    fn phrases_match_across_punctuation() {
        let s = score(&prompt(), "okay... LANG po", 1);
        assert!(s.passed);
    }

    #[test]
    fn keywords_only_match_whole_words() {
        let s = score(&prompt(), "salamatan mabutihin", 1);
        assert_eq!(s.hits, 0);
        assert!(!s.passed);
    }

    #[test]
    fn repeated_keywords_count_once() {
        let s = score(&prompt(), "mabuti mabuti mabuti", 2);
        assert_eq!(s.hits, 1);
        assert!(!s.passed);
    }

    #[test]
    fn english_answer_fails() {
        assert!(!score(&prompt(), "I am fine, thank you", 1).passed);
    }

    #[test]
    fn zero_min_hits_still_needs_one_keyword() {
        assert!(!score(&prompt(), "", 0).passed);
    }

    #[test]
    fn prompt_choice_is_stable_per_user() {
        let config = LanguageTestConfig::default();
        let n = config.prompts.len() as i64;
        assert_eq!(prompt_for(&config, 5), prompt_for(&config, 5 + n));
        assert!(prompt_for(&config, -7).is_some());

        let empty = LanguageTestConfig {
            prompts: Vec::new(),
            min_keyword_hits: 1,
        };
        assert!(prompt_for(&empty, 1).is_none());
    }
}
