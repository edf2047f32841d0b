//! Conversation context window
//!
//! Information Hiding:
//! - Queue eviction rules hidden in `BoundedQueue`
//! - Load/trim/save lifecycle hidden in `ConversationContext`

pub mod queue;
pub mod session;

pub use queue::BoundedQueue;
pub use session::ConversationContext;
