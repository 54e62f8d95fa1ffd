//! Request Validation
//!
//! Shape validation collects every field failure before reporting, so a
//! request missing three members gets all three names back in one
//! `ValidationException` instead of a fail-fast drip. Handlers run a
//! [`Validator`] over the decoded request, call [`Validator::finish`], and
//! only then touch the store.
//!
//! Semantic failures discovered later (a hash key outside the shard's range,
//! a retention decrease that isn't a decrease) are `InvalidArgumentException`
//! and fail fast, since by then the shape is known good.

use kinesis_mock_core::{KinesisError, Result};

/// Names must be 1–128 characters from [a-zA-Z0-9_.-].
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Tag keys/values allow letters, digits, spaces and `_ . / = + - @ :`.
pub fn is_valid_tag_text(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '.' | '/' | '=' | '+' | '-' | '@' | ':'))
}

/// Collects field errors; empty on success.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.error(message);
        }
    }

    /// Required string member. Returns an empty placeholder when absent;
    /// [`Self::finish`] fails in that case so the placeholder is never used.
    pub fn required_string(&mut self, field: &str, value: Option<&str>) -> String {
        match value {
            Some(v) => v.to_string(),
            None => {
                self.error(format!("{} is required", field));
                String::new()
            }
        }
    }

    /// Required member that must also satisfy the resource-name pattern.
    pub fn required_name(&mut self, field: &str, value: Option<&str>) -> String {
        let v = self.required_string(field, value);
        if !v.is_empty() && !is_valid_name(&v) {
            self.error(format!(
                "{} must match [a-zA-Z0-9_.-]+ and be at most 128 characters",
                field
            ));
        }
        v
    }

    pub fn required_i64(&mut self, field: &str, value: Option<i64>) -> i64 {
        match value {
            Some(v) => v,
            None => {
                self.error(format!("{} is required", field));
                0
            }
        }
    }

    /// Inclusive range check, applied only when the member is present.
    pub fn range_i64(&mut self, field: &str, value: Option<i64>, min: i64, max: i64) {
        if let Some(v) = value {
            if v < min || v > max {
                self.error(format!("{} must be between {} and {}", field, min, max));
            }
        }
    }

    /// Decimal 128-bit hash key, when present.
    pub fn hash_key(&mut self, field: &str, value: Option<&str>) -> Option<u128> {
        match value {
            None => None,
            Some(v) => match v.parse::<u128>() {
                Ok(key) => Some(key),
                Err(_) => {
                    self.error(format!(
                        "{} must be a decimal integer between 0 and 2^128-1",
                        field
                    ));
                    None
                }
            },
        }
    }

    /// Required decimal hash key; placeholder zero when absent or garbled
    /// (an error is recorded and [`Self::finish`] fails).
    pub fn required_hash_key(&mut self, field: &str, value: Option<&str>) -> u128 {
        match value {
            None => {
                self.error(format!("{} is required", field));
                0
            }
            Some(_) => self.hash_key(field, value).unwrap_or(0),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// One ValidationException carrying every collected failure.
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(KinesisError::Validation(format!(
                "{} validation error(s) detected: {}",
                self.errors.len(),
                self.errors.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("my-stream_1.0"));
        assert!(is_valid_name("a"));
        assert!(is_valid_name(&"x".repeat(128)));
    }

    #[test]
    fn test_invalid_names() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name(&"x".repeat(129)));
        assert!(!is_valid_name("has space"));
        assert!(!is_valid_name("sla/sh"));
        assert!(!is_valid_name("émoji"));
    }

    #[test]
    fn test_tag_text_charset() {
        assert!(is_valid_tag_text("env=prod west-2 team@data"));
        assert!(is_valid_tag_text(""));
        assert!(!is_valid_tag_text("no|pipes"));
    }

    #[test]
    fn test_all_errors_collected_into_one_message() {
        let mut v = Validator::new();
        v.required_string("StreamName", None);
        v.required_i64("ShardCount", None);
        v.range_i64("Limit", Some(0), 1, 10_000);
        let err = v.finish().unwrap_err();
        assert!(matches!(err, KinesisError::Validation(_)));
        let message = err.to_string();
        assert!(message.starts_with("3 validation error(s) detected"));
        assert!(message.contains("StreamName is required"));
        assert!(message.contains("ShardCount is required"));
        assert!(message.contains("Limit must be between 1 and 10000"));
    }

    #[test]
    fn test_finish_ok_when_clean() {
        let mut v = Validator::new();
        let name = v.required_name("StreamName", Some("s1"));
        assert_eq!(name, "s1");
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_hash_key_parsing() {
        let mut v = Validator::new();
        assert_eq!(v.hash_key("Key", Some("0")), Some(0));
        assert_eq!(
            v.hash_key("Key", Some(&u128::MAX.to_string())),
            Some(u128::MAX)
        );
        assert!(v.is_ok());
        assert_eq!(v.hash_key("Key", Some("not-a-number")), None);
        assert_eq!(v.hash_key("Key", Some("-1")), None);
        assert!(v.finish().is_err());
    }

    #[test]
    fn test_range_check_skipped_when_absent() {
        let mut v = Validator::new();
        v.range_i64("Limit", None, 1, 100);
        assert!(v.finish().is_ok());
    }
}
