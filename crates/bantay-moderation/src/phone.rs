//! Philippine phone number validation.
//!
//! Accepts the forms users and the platform actually send
//! (`+639171234567`, `639171234567`, `09171234567`, with spaces,
//! dashes, dots or parentheses) and normalizes them to E.164 `+63...`.
//! Mobile subscribers are `9` plus nine digits; landlines are an area
//! code starting `2`..`8` plus the local number, nine digits in all.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ModerationError;

static PH_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\+63|63|0)(9\d{9}|[2-8]\d{8})$").expect("valid PH number regex")
});

/// Normalize `raw` to `+63` E.164 form.
pub fn normalize(raw: &str) -> Result<String, ModerationError> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    PH_NUMBER
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|subscriber| format!("+63{}", subscriber.as_str()))
        .ok_or_else(|| ModerationError::InvalidPhoneFormat(raw.to_string()))
}

/// Human-friendly international form, e.g. `+63 917 123 4567`.
///
/// Expects a number produced by [`normalize`]; anything else is
/// returned unchanged.
pub fn display(e164: &str) -> String {
    match e164.strip_prefix("+63") {
        Some(sub) if sub.len() == 10 && sub.starts_with('9') => {
            format!("+63 {} {} {}", &sub[..3], &sub[3..6], &sub[6..])
        }
        Some(sub) if sub.len() == 9 && sub.starts_with('2') => {
            format!("+63 2 {} {}", &sub[1..5], &sub[5..])
        }
        Some(sub) if sub.len() == 9 => {
            format!("+63 {} {} {}", &sub[..2], &sub[2..5], &sub[5..])
        }
        _ => e164.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_common_mobile_forms() {
        for raw in [
            "+639171234567",
            "639171234567",
            "09171234567",
            "+63 917 123 4567",
            "0917-123-4567",
            "(0917) 123.4567",
        ] {
            assert_eq!(normalize(raw).unwrap(), "+639171234567", "input {raw}");
        }
    }

    #[test]
    fn accepts_landlines() {
        assert_eq!(normalize("+63 2 8123 4567").unwrap(), "+63281234567");
        assert_eq!(normalize("032 123 4567").unwrap(), "+63321234567");
    }

    #[test]
    fn rejects_foreign_and_malformed_numbers() {
        for raw in [
            "",
            "+14155552671",
            "+6591234567",
            "+63917123456",
            "+6391712345678",
            "+63117123456",
            "09171234567x",
            "+63 917 ABC 4567",
        ] {
            assert!(
                matches!(normalize(raw), Err(ModerationError::InvalidPhoneFormat(_))),
                "input {raw} should be rejected"
            );
        }
    }

    #[test]
    fn display_groups_mobile_digits() {
        assert_eq!(display("+639171234567"), "+63 917 123 4567");
        assert_eq!(display("+63281234567"), "+63 2 8123 4567");
        assert_eq!(display("not a number"), "not a number");
    }

    proptest! {
        #[test]
        fn every_mobile_subscriber_normalizes_to_e164(sub in "9[0-9]{9}") {
            let expected = format!("+63{sub}");
            prop_assert_eq!(normalize(&format!("0{sub}")).unwrap(), expected.clone());
            prop_assert_eq!(normalize(&format!("63{sub}")).unwrap(), expected.clone());
            prop_assert_eq!(normalize(&expected).unwrap(), expected);
        }

        #[test]
        fn normalized_numbers_are_fixed_points(raw in "\\PC{0,20}") {
            if let Ok(e164) = normalize(&raw) {
                prop_assert!(e164.starts_with("+63"));
                prop_assert_eq!(normalize(&e164).unwrap(), e164);
            }
        }
    }
}
