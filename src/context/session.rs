//! Conversation Context - one request's view of a channel's history
//!
//! Information Hiding:
//! - Storage key derivation and persistence hidden behind `save`/`clear`
//! - Eviction bookkeeping for rollback internalized
//! - Loaded once per request, saved once afterwards, then dropped

use super::queue::BoundedQueue;
use crate::api::ContextStore;
use crate::error::Result;
use crate::records::validation;
use crate::records::{ConversationOwner, ConversationRecord, Message};

/// History window for one (channel, owner) pair
pub struct ConversationContext {
    store: ContextStore,
    channel_id: String,
    channel_name: String,
    owner: ConversationOwner,
    history: BoundedQueue<Message>,
    /// What each push since load evicted, newest push last
    evictions: Vec<Vec<Message>>,
}

impl ConversationContext {
    /// Seed a queue from a stored record.
    ///
    /// A stored history longer than `capacity` (the capacity was lowered since
    /// it was written) is trimmed from the oldest end before seeding.
    pub(crate) fn load(
        store: ContextStore,
        channel_id: String,
        channel_name: String,
        owner: ConversationOwner,
        record: Option<ConversationRecord>,
        capacity: usize,
    ) -> Result<Self> {
        let mut history = BoundedQueue::new(capacity)?;

        if let Some(record) = record {
            let mut messages = record.messages;
            if messages.len() > capacity {
                let excess = messages.len() - capacity;
                tracing::info!(
                    "[Conversation {}-{}] Dropping {} messages above capacity {}",
                    channel_id,
                    owner,
                    excess,
                    capacity
                );
                messages.drain(..excess);
            }
            history.set_contents(messages)?;
        }

        Ok(Self {
            store,
            channel_id,
            channel_name,
            owner,
            history,
            evictions: Vec::new(),
        })
    }

    /// Add the user's message after running it through the validation gate.
    pub fn push_user(&mut self, content: &str, images: Vec<String>) -> Result<()> {
        let content = validation::message_content(content, &self.store.limits())?;
        self.push(Message::user(content).with_images(images));
        Ok(())
    }

    /// Add a reply from the inference backend. Stored verbatim.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    fn push(&mut self, message: Message) {
        let evicted = self.history.push(message);
        self.evictions.push(evicted);
    }

    /// Undo the most recent push, e.g. when generating a reply failed.
    ///
    /// Messages that push evicted are restored at the head. Repeated calls
    /// walk back through earlier pushes; once those are exhausted the newest
    /// loaded message is dropped with nothing to restore.
    pub fn rollback(&mut self) -> Option<Message> {
        let evicted = self.evictions.pop().unwrap_or_default();
        self.history.undo_push(evicted)
    }

    /// Apply a new window size. Takes effect on the next push.
    pub fn set_capacity(&mut self, capacity: u8) -> Result<()> {
        let capacity = validation::capacity(i64::from(capacity), &self.store.limits())?;
        self.history.set_capacity(usize::from(capacity))
    }

    /// Persist the window, replacing whatever was stored.
    pub async fn save(&self) -> Result<()> {
        self.store
            .write_conversation(&self.channel_id, &self.channel_name, &self.owner, &self.history)
            .await
    }

    /// Forget the history in memory and on disk.
    pub async fn clear(&mut self) -> Result<bool> {
        self.history.clear();
        self.evictions.clear();
        self.store
            .purge_conversation(&self.channel_id, &self.owner)
            .await
    }

    pub fn history(&self) -> &BoundedQueue<Message> {
        &self.history
    }

    pub fn messages(&self) -> Vec<Message> {
        self.history.to_vec()
    }

    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn owner(&self) -> &ConversationOwner {
        &self.owner
    }
}
