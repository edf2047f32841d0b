//! Record Schemas
//!
//! Typed views over the store's raw JSON documents, plus the validation gate
//! every externally supplied value passes through.

pub mod configuration;
pub mod conversation;
pub mod validation;

pub use configuration::{ConfigOption, ConfigurationRecord, Namespace, OptionValue};
pub use conversation::{ConversationOwner, ConversationRecord, Message, Role, SHARED_CONTEXT_OWNER};
pub use validation::Limits;
