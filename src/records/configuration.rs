//! Configuration records and typed options
//!
//! Information Hiding:
//! - On-disk option bag kept as a sorted map so unknown keys survive updates
//! - Known options exposed only through the closed `ConfigOption` enum

use super::validation::{self, Limits};
use crate::error::{Error, Result};
use crate::storage::{Document, StorageKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const CONFIG_PREFIX: &str = "config";

/// Scalar stored under one option name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            OptionValue::Number(value) => value.as_u64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(value) => write!(f, "{}", value),
            OptionValue::Number(value) => write!(f, "{}", value),
            OptionValue::Text(value) => write!(f, "{}", value),
        }
    }
}

/// Who a configuration record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// A single chat user
    Actor,
    /// A guild / server
    Group,
}

impl Namespace {
    fn segment(&self) -> &'static str {
        match self {
            Namespace::Actor => "user",
            Namespace::Group => "group",
        }
    }

    /// `config-user-<name>` or `config-group-<id>`. `owner` must already have
    /// passed the validation gate.
    pub fn key(&self, owner: &str) -> Result<StorageKey> {
        StorageKey::from_segments(&[CONFIG_PREFIX, self.segment(), owner])
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Every option the bot knows how to write
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOption {
    /// Model used for this user's replies
    SwitchModel(String),
    /// Number of messages kept in the user's context window
    ModifyCapacity(u8),
    /// Stream replies instead of sending them whole
    MessageStream(bool),
    /// Whether the bot answers in this guild at all
    ToggleChat(bool),
}

impl ConfigOption {
    pub const SWITCH_MODEL: &'static str = "switch-model";
    pub const MODIFY_CAPACITY: &'static str = "modify-capacity";
    pub const MESSAGE_STREAM: &'static str = "message-stream";
    pub const TOGGLE_CHAT: &'static str = "toggle-chat";

    pub fn name(&self) -> &'static str {
        match self {
            ConfigOption::SwitchModel(_) => Self::SWITCH_MODEL,
            ConfigOption::ModifyCapacity(_) => Self::MODIFY_CAPACITY,
            ConfigOption::MessageStream(_) => Self::MESSAGE_STREAM,
            ConfigOption::ToggleChat(_) => Self::TOGGLE_CHAT,
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            ConfigOption::ToggleChat(_) => Namespace::Group,
            _ => Namespace::Actor,
        }
    }

    pub fn value(&self) -> OptionValue {
        match self {
            ConfigOption::SwitchModel(model) => OptionValue::Text(model.clone()),
            ConfigOption::ModifyCapacity(capacity) => OptionValue::Number((*capacity).into()),
            ConfigOption::MessageStream(flag) | ConfigOption::ToggleChat(flag) => {
                OptionValue::Bool(*flag)
            }
        }
    }

    /// Parse textual input, e.g. from a slash command or the CLI.
    pub fn parse(name: &str, raw: &str, limits: &Limits) -> Result<Self> {
        let option = match name.trim() {
            Self::SWITCH_MODEL => ConfigOption::SwitchModel(raw.to_string()),
            Self::MODIFY_CAPACITY => {
                let value = raw.trim().parse::<i64>().map_err(|_| {
                    Error::invalid("capacity", format!("{:?} is not an integer", raw))
                })?;
                ConfigOption::ModifyCapacity(validation::capacity(value, limits)?)
            }
            Self::MESSAGE_STREAM => {
                ConfigOption::MessageStream(validation::parse_bool("message-stream", raw)?)
            }
            Self::TOGGLE_CHAT => ConfigOption::ToggleChat(validation::parse_bool("toggle-chat", raw)?),
            other => {
                return Err(Error::invalid(
                    "option",
                    format!("unknown option {:?}", other),
                ))
            }
        };
        option.validated(limits)
    }

    /// Run the typed value through the validation gate.
    pub fn validated(self, limits: &Limits) -> Result<Self> {
        Ok(match self {
            ConfigOption::SwitchModel(model) => {
                ConfigOption::SwitchModel(validation::model_name(&model)?)
            }
            ConfigOption::ModifyCapacity(capacity) => {
                ConfigOption::ModifyCapacity(validation::capacity(i64::from(capacity), limits)?)
            }
            flag @ (ConfigOption::MessageStream(_) | ConfigOption::ToggleChat(_)) => flag,
        })
    }
}

/// `{ "name": ..., "options": { ... } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationRecord {
    pub name: String,
    pub options: BTreeMap<String, OptionValue>,
}

impl Document for ConfigurationRecord {
    const REQUIRED_FIELDS: &'static [&'static str] = &["name", "options"];
    const KIND: &'static str = "configuration";
}

impl ConfigurationRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    /// Sparse merge: only `option`'s key changes.
    pub fn set(&mut self, option: &ConfigOption) {
        self.options.insert(option.name().to_string(), option.value());
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    pub fn model(&self) -> Option<&str> {
        self.get(ConfigOption::SWITCH_MODEL).and_then(OptionValue::as_str)
    }

    pub fn capacity(&self) -> Option<u8> {
        self.get(ConfigOption::MODIFY_CAPACITY)
            .and_then(OptionValue::as_u64)
            .and_then(|value| u8::try_from(value).ok())
    }

    pub fn stream(&self) -> Option<bool> {
        self.get(ConfigOption::MESSAGE_STREAM).and_then(OptionValue::as_bool)
    }

    pub fn chat_enabled(&self) -> Option<bool> {
        self.get(ConfigOption::TOGGLE_CHAT).and_then(OptionValue::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_keys() {
        assert_eq!(Namespace::Actor.key("alice").unwrap().as_str(), "config-user-alice");
        assert_eq!(Namespace::Group.key("42").unwrap().as_str(), "config-group-42");
    }

    #[test]
    fn test_parse_options() {
        let limits = Limits::new(20, 4000).unwrap();
        assert_eq!(
            ConfigOption::parse("modify-capacity", " 10 ", &limits).unwrap(),
            ConfigOption::ModifyCapacity(10)
        );
        assert_eq!(
            ConfigOption::parse("message-stream", "on", &limits).unwrap(),
            ConfigOption::MessageStream(true)
        );
        assert_eq!(
            ConfigOption::parse("switch-model", "llama3:8b", &limits).unwrap(),
            ConfigOption::SwitchModel("llama3:8b".into())
        );
        assert!(ConfigOption::parse("modify-capacity", "21", &limits).is_err());
        assert!(ConfigOption::parse("modify-capacity", "ten", &limits).is_err());
        assert!(ConfigOption::parse("favourite-colour", "blue", &limits).is_err());
    }

    #[test]
    fn test_option_namespaces() {
        assert_eq!(ConfigOption::ToggleChat(true).namespace(), Namespace::Group);
        assert_eq!(ConfigOption::MessageStream(true).namespace(), Namespace::Actor);
    }

    #[test]
    fn test_set_is_sparse_merge() {
        let mut record = ConfigurationRecord::new("alice");
        record.set(&ConfigOption::SwitchModel("a".into()));
        record.set(&ConfigOption::ModifyCapacity(10));

        assert_eq!(record.model(), Some("a"));
        assert_eq!(record.capacity(), Some(10));
        assert_eq!(record.stream(), None);
    }

    #[test]
    fn test_unknown_options_preserved() {
        let raw = json!({
            "name": "alice",
            "options": { "legacy-flag": true, "switch-model": "old" }
        });
        let mut record: ConfigurationRecord = serde_json::from_value(raw).unwrap();
        record.set(&ConfigOption::SwitchModel("new".into()));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(
            back,
            json!({
                "name": "alice",
                "options": { "legacy-flag": true, "switch-model": "new" }
            })
        );
    }
}
