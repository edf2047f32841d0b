//! Conversation records
//!
//! A conversation document is a snapshot of one context window. The
//! in-memory queue is authoritative; every save rewrites `messages` whole.

use crate::error::Result;
use crate::storage::{Document, StorageKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Owner written for channels whose history is shared by everyone in it
pub const SHARED_CONTEXT_OWNER: &str = "shared-context";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Attachment references (URLs or encoded images)
    #[serde(default)]
    pub images: Vec<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }
}

/// Whose history a conversation document holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOwner {
    Actor(String),
    Shared,
}

impl ConversationOwner {
    pub fn as_str(&self) -> &str {
        match self {
            ConversationOwner::Actor(name) => name,
            ConversationOwner::Shared => SHARED_CONTEXT_OWNER,
        }
    }

    /// `<channel>-<owner>`. Both parts must already have passed the
    /// validation gate.
    pub fn key(&self, channel_id: &str) -> Result<StorageKey> {
        StorageKey::from_segments(&[channel_id, self.as_str()])
    }
}

impl fmt::Display for ConversationOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Channel or thread identifier
    pub id: String,
    /// Channel or thread display name
    #[serde(default)]
    pub name: String,
    /// Actor name or [`SHARED_CONTEXT_OWNER`]
    pub user: String,
    /// Oldest first
    pub messages: Vec<Message>,
}

impl Document for ConversationRecord {
    const REQUIRED_FIELDS: &'static [&'static str] = &["id", "user", "messages"];
    const KIND: &'static str = "conversation";
}

impl ConversationRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner: &ConversationOwner) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            user: owner.as_str().to_string(),
            messages: Vec::new(),
        }
    }

    pub fn owner(&self) -> ConversationOwner {
        if self.user == SHARED_CONTEXT_OWNER {
            ConversationOwner::Shared
        } else {
            ConversationOwner::Actor(self.user.clone())
        }
    }
}
