//! Chatkeep - file-backed configuration and conversation storage
//!
//! This library persists per-user and per-channel records for a chat bot
//! under concurrent access: a sanitizing key gate, an atomic per-key-locked
//! JSON document store, and a bounded context window for message history.

pub mod api;
mod config;
pub mod context;
pub mod error;
pub mod records;
pub mod storage;
pub mod utils;

pub mod cli;

pub use api::ContextStore;
pub use config::{LimitsConfig, LoggingConfig, Settings, StorageConfig};
pub use context::{BoundedQueue, ConversationContext};
pub use error::{Error, Result};
pub use records::{
    ConfigOption, ConfigurationRecord, ConversationOwner, ConversationRecord, Message,
};
pub use storage::{Lookup, StorageKey};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
