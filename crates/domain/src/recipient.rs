//! Recipient and message validation at the send boundary.
//!
//! Normalization rule: strip everything but digits, apply the default
//! country prefix when the digit count matches the local-number length,
//! reject anything outside the configured digit range.  Violations are
//! `Error::Validation` and never reach the messaging client.

use crate::config::MessagingConfig;
use crate::error::{Error, Result};

/// Normalize a raw recipient into the canonical digits-only identifier.
pub fn normalize_recipient(raw: &str, cfg: &MessagingConfig) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(Error::Validation(format!(
            "recipient {raw:?} contains no digits"
        )));
    }

    let normalized = if digits.len() == cfg.local_number_digits {
        format!("{}{digits}", cfg.default_country_code)
    } else {
        digits
    };

    if normalized.len() < cfg.min_digits || normalized.len() > cfg.max_digits {
        return Err(Error::Validation(format!(
            "recipient has {} digits, expected between {} and {}",
            normalized.len(),
            cfg.min_digits,
            cfg.max_digits
        )));
    }

    Ok(normalized)
}

/// Validate a message body: non-empty and under the configured cap.
pub fn validate_message(body: &str, cfg: &MessagingConfig) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::Validation("message must not be empty".into()));
    }
    let len = body.chars().count();
    if len > cfg.max_message_len {
        return Err(Error::Validation(format!(
            "message is {len} characters, limit is {}",
            cfg.max_message_len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MessagingConfig {
        MessagingConfig::default()
    }

    #[test]
    fn no_digits_rejected() {
        let err = normalize_recipient("abc", &cfg()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn local_number_gets_country_prefix() {
        // 9 digits = local format with default config, prefix "34".
        let n = normalize_recipient("612345678", &cfg()).unwrap();
        assert_eq!(n, "34612345678");
        assert_eq!(n.len(), 11);
    }

    #[test]
    fn formatting_characters_stripped() {
        let n = normalize_recipient("+34 612-345-678", &cfg()).unwrap();
        assert_eq!(n, "34612345678");
    }

    #[test]
    fn full_international_number_kept_as_is() {
        let n = normalize_recipient("4915123456789", &cfg()).unwrap();
        assert_eq!(n, "4915123456789");
    }

    #[test]
    fn too_short_rejected() {
        assert!(normalize_recipient("123", &cfg()).is_err());
    }

    #[test]
    fn too_long_rejected() {
        assert!(normalize_recipient("1234567890123456", &cfg()).is_err());
    }

    #[test]
    fn empty_message_rejected() {
        assert!(validate_message("", &cfg()).is_err());
    }

    #[test]
    fn oversized_message_rejected() {
        let body = "x".repeat(cfg().max_message_len + 1);
        assert!(validate_message(&body, &cfg()).is_err());
    }

    #[test]
    fn normal_message_accepted() {
        assert!(validate_message("hello there", &cfg()).is_ok());
    }
}
