//! Input Validation Gate
//!
//! Every value that arrives from the chat platform passes through here before
//! it reaches the sanitizer or the store.
//!
//! Information Hiding:
//! - Character classes and bounds kept in one place
//! - Whitespace normalization rules hidden behind `message_content`

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Hard upper bound for any history capacity
pub const CAPACITY_CEILING: u8 = 100;
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_ACTOR_NAME_CHARS: usize = 32;
pub const MAX_MODEL_NAME_CHARS: usize = 128;

static ACTOR_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}\p{N}_][\p{L}\p{N}_.]*$").expect("actor name pattern"));
static PLATFORM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{1,20}$").expect("id pattern"));
static MODEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._:/-]*$").expect("model name pattern"));
static HORIZONTAL_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\t\x0B\x0C\r \u{A0}]+").expect("space pattern"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("newline pattern"));

/// Bounds supplied by startup configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    max_history_capacity: u8,
    max_message_length: usize,
}

impl Limits {
    pub fn new(max_history_capacity: u8, max_message_length: usize) -> Result<Self> {
        if max_history_capacity == 0 || max_history_capacity > CAPACITY_CEILING {
            return Err(Error::invalid(
                "max_history_capacity",
                format!("must be between 1 and {}", CAPACITY_CEILING),
            ));
        }
        if max_message_length == 0 {
            return Err(Error::invalid("max_message_length", "must be at least 1"));
        }
        Ok(Self {
            max_history_capacity,
            max_message_length,
        })
    }

    pub fn max_history_capacity(&self) -> u8 {
        self.max_history_capacity
    }

    pub fn max_message_length(&self) -> usize {
        self.max_message_length
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_history_capacity: CAPACITY_CEILING,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

/// Platform username: letters, digits, `_` and `.`, at most 32 characters.
///
/// `-` is excluded because it joins the segments of a storage key. A leading
/// `.` is rejected since the sanitizer strips it, which would let `.alice`
/// share a key with `alice`.
pub fn actor_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidKey("actor name is empty".to_string()));
    }
    if name.chars().count() > MAX_ACTOR_NAME_CHARS {
        return Err(Error::InvalidKey(format!(
            "actor name is longer than {} characters",
            MAX_ACTOR_NAME_CHARS
        )));
    }
    if !ACTOR_NAME.is_match(name) {
        return Err(Error::InvalidKey(format!(
            "actor name {:?} may only contain letters, digits, '_' and '.', and may not start with '.'",
            name
        )));
    }
    Ok(name.to_string())
}

/// Numeric channel, thread or guild identifier
pub fn platform_id(raw: &str) -> Result<String> {
    let id = raw.trim();
    if !PLATFORM_ID.is_match(id) {
        return Err(Error::InvalidKey(format!(
            "identifier {:?} must be 1 to 20 digits",
            id
        )));
    }
    Ok(id.to_string())
}

/// History capacity within `1..=limits.max_history_capacity`
pub fn capacity(value: i64, limits: &Limits) -> Result<u8> {
    let max = i64::from(limits.max_history_capacity);
    if !(1..=max).contains(&value) {
        return Err(Error::invalid(
            "capacity",
            format!("{} is outside 1..={}", value, max),
        ));
    }
    Ok(value as u8)
}

pub fn model_name(raw: &str) -> Result<String> {
    let model = raw.trim();
    if model.is_empty() || model.len() > MAX_MODEL_NAME_CHARS || !MODEL_NAME.is_match(model) {
        return Err(Error::invalid(
            "model",
            format!("{:?} is not a valid model name", model),
        ));
    }
    Ok(model.to_string())
}

/// Normalize whitespace, then enforce the length bound in characters.
///
/// Runs of spaces and tabs collapse to one space, line endings become `\n`,
/// more than one blank line collapses to one, and the ends are trimmed.
pub fn message_content(raw: &str, limits: &Limits) -> Result<String> {
    let unified = raw.replace("\r\n", "\n");
    let spaced = HORIZONTAL_SPACE.replace_all(&unified, " ");
    let lines: Vec<&str> = spaced.split('\n').map(str::trim).collect();
    let joined = lines.join("\n");
    let normalized = BLANK_LINES.replace_all(&joined, "\n\n");
    let content = normalized.trim();

    if content.is_empty() {
        return Err(Error::invalid("message", "content is empty"));
    }
    let length = content.chars().count();
    if length > limits.max_message_length {
        return Err(Error::invalid(
            "message",
            format!(
                "{} characters exceeds the limit of {}",
                length, limits.max_message_length
            ),
        ));
    }
    Ok(content.to_string())
}

pub fn parse_bool(field: &'static str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(Error::invalid(field, format!("{:?} is not a boolean", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_bounds() {
        assert!(Limits::new(0, 10).is_err());
        assert!(Limits::new(101, 10).is_err());
        assert!(Limits::new(100, 0).is_err());
        let limits = Limits::new(10, 200).unwrap();
        assert_eq!(limits.max_history_capacity(), 10);
    }

    #[test]
    fn test_actor_names() {
        assert_eq!(actor_name("  kevin.s_2 ").unwrap(), "kevin.s_2");
        assert_eq!(actor_name("ñandú").unwrap(), "ñandú");
        let long = "x".repeat(33);
        for bad in ["", "   ", "../etc", "a-b", "a/b", "a b", long.as_str()] {
            assert!(matches!(actor_name(bad), Err(Error::InvalidKey(_))), "{:?}", bad);
        }
    }

    #[test]
    fn test_actor_names_survive_sanitizing_unchanged() {
        for bad in [".alice", "..alice", "...", "."] {
            assert!(matches!(actor_name(bad), Err(Error::InvalidKey(_))), "{:?}", bad);
        }
        for good in ["alice", "a.lice", "alice.", "_alice", "kevin.s_2"] {
            let name = actor_name(good).unwrap();
            let key = crate::storage::StorageKey::sanitize(&name).unwrap();
            assert_eq!(key.as_str(), name);
        }
    }

    #[test]
    fn test_platform_ids() {
        assert_eq!(platform_id("1234567890").unwrap(), "1234567890");
        assert!(platform_id("12a").is_err());
        assert!(platform_id("").is_err());
        assert!(platform_id(&"9".repeat(21)).is_err());
    }

    #[test]
    fn test_capacity_range() {
        let limits = Limits::new(50, 4000).unwrap();
        assert_eq!(capacity(1, &limits).unwrap(), 1);
        assert_eq!(capacity(50, &limits).unwrap(), 50);
        assert!(capacity(0, &limits).is_err());
        assert!(capacity(51, &limits).is_err());
        assert!(capacity(-3, &limits).is_err());
    }

    #[test]
    fn test_model_names() {
        assert_eq!(model_name("llama3.2:3b").unwrap(), "llama3.2:3b");
        assert_eq!(model_name("library/mistral").unwrap(), "library/mistral");
        assert!(model_name("").is_err());
        assert!(model_name("-rf").is_err());
        assert!(model_name("two words").is_err());
    }

    #[test]
    fn test_message_normalization() {
        let limits = Limits::default();
        let content = message_content("  hello \t  world \r\n\r\n\r\n\n  next  ", &limits).unwrap();
        assert_eq!(content, "hello world\n\nnext");
    }

    #[test]
    fn test_message_length_counted_after_normalization() {
        let limits = Limits::new(10, 5).unwrap();
        assert_eq!(message_content("  a   b  ", &limits).unwrap(), "a b");
        assert!(message_content("abcdef", &limits).is_err());
        assert!(message_content("   \n  ", &limits).is_err());
        // characters, not bytes
        assert_eq!(message_content("ééééé", &limits).unwrap(), "ééééé");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("stream", "ON").unwrap());
        assert!(!parse_bool("stream", "false").unwrap());
        assert!(parse_bool("stream", "maybe").is_err());
    }
}
