//! Collaborator-facing API
//!
//! The dispatch layer talks to storage only through [`ContextStore`]. Every
//! identifier and value passes the validation gate here before it is turned
//! into a storage key or written.
//!
//! Information Hiding:
//! - Key layout (`config-user-*`, `config-group-*`, `<channel>-<owner>`) hidden
//! - Backend choice hidden behind `DocumentStore`
//! - Default record synthesis hidden from callers

use crate::config::Settings;
use crate::context::{BoundedQueue, ConversationContext};
use crate::error::{Error, Result};
use crate::records::validation::{self, Limits};
use crate::records::{
    ConfigOption, ConfigurationRecord, ConversationOwner, ConversationRecord, Message, Namespace,
};
use crate::storage::filesystem::FileSystemBackend;
use crate::storage::{DocumentBackend, DocumentStore, Lookup, StorageKey};
use std::sync::Arc;

/// Configuration and conversation storage for the bot
#[derive(Clone)]
pub struct ContextStore {
    documents: DocumentStore,
    limits: Limits,
    default_capacity: u8,
}

impl ContextStore {
    /// Open the file-backed store described by `settings`.
    pub async fn open(settings: &Settings) -> Result<Self> {
        let limits = settings.limits()?;
        let default_capacity = settings.default_capacity()?;
        let backend = FileSystemBackend::new(settings.storage.data_root.clone()).await?;

        tracing::info!(
            "Context store opened at {:?} (max capacity {}, default capacity {})",
            backend.root(),
            limits.max_history_capacity(),
            default_capacity
        );
        Ok(Self::with_backend(Arc::new(backend), limits, default_capacity))
    }

    pub fn with_backend(
        backend: Arc<dyn DocumentBackend>,
        limits: Limits,
        default_capacity: u8,
    ) -> Self {
        let default_capacity = default_capacity.clamp(1, limits.max_history_capacity());
        Self {
            documents: DocumentStore::new(backend),
            limits,
            default_capacity,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Validate a display name and return the storage-safe form.
    pub fn sanitize_actor_name(&self, raw: &str) -> Result<String> {
        let name = validation::actor_name(raw)?;
        Ok(StorageKey::sanitize(&name)?.to_string())
    }

    // ---------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------

    pub async fn read_actor_configuration(
        &self,
        actor: &str,
    ) -> Result<Lookup<ConfigurationRecord>> {
        let key = Namespace::Actor.key(&validation::actor_name(actor)?)?;
        self.documents.get(&key).await
    }

    pub async fn read_group_configuration(
        &self,
        group_id: &str,
    ) -> Result<Lookup<ConfigurationRecord>> {
        let key = Namespace::Group.key(&validation::platform_id(group_id)?)?;
        self.documents.get(&key).await
    }

    pub async fn write_actor_option(&self, actor: &str, option: ConfigOption) -> Result<()> {
        let actor = validation::actor_name(actor)?;
        self.write_option(Namespace::Actor, actor, option).await
    }

    pub async fn write_group_option(&self, group_id: &str, option: ConfigOption) -> Result<()> {
        let group_id = validation::platform_id(group_id)?;
        self.write_option(Namespace::Group, group_id, option).await
    }

    async fn write_option(
        &self,
        namespace: Namespace,
        owner: String,
        option: ConfigOption,
    ) -> Result<()> {
        if option.namespace() != namespace {
            return Err(Error::invalid(
                "option",
                format!(
                    "'{}' is a {} option, not a {} option",
                    option.name(),
                    option.namespace(),
                    namespace
                ),
            ));
        }
        let option = option.validated(&self.limits)?;
        let key = namespace.key(&owner)?;

        let default = ConfigurationRecord::new(owner);

        tracing::debug!("[ContextStore] Setting {} on '{}'", option.name(), key);
        self.documents
            .upsert(&key, default, move |mut record: ConfigurationRecord| {
                record.set(&option);
                record
            })
            .await
    }

    /// Window size for an actor: their `modify-capacity` option, else the
    /// configured default. Values above the current bound are clamped.
    pub async fn history_capacity(&self, actor: &str) -> Result<u8> {
        let configured = self
            .read_actor_configuration(actor)
            .await?
            .into_option()
            .and_then(|record| record.capacity());

        Ok(configured
            .map(|capacity| capacity.clamp(1, self.limits.max_history_capacity()))
            .unwrap_or(self.default_capacity))
    }

    // ---------------------------------------------------------------
    // Conversations
    // ---------------------------------------------------------------

    fn conversation_key(
        &self,
        channel_id: &str,
        owner: &ConversationOwner,
    ) -> Result<(String, StorageKey)> {
        let channel_id = validation::platform_id(channel_id)?;
        if let ConversationOwner::Actor(name) = owner {
            validation::actor_name(name)?;
        }
        let key = owner.key(&channel_id)?;
        Ok((channel_id, key))
    }

    pub async fn read_conversation(
        &self,
        channel_id: &str,
        owner: &ConversationOwner,
    ) -> Result<Lookup<ConversationRecord>> {
        let (_, key) = self.conversation_key(channel_id, owner)?;
        self.documents.get(&key).await
    }

    /// Replace the stored history with the queue's contents.
    ///
    /// A queue holding more messages than its capacity (the capacity was
    /// lowered and nothing has been pushed since) is refused.
    pub async fn write_conversation(
        &self,
        channel_id: &str,
        channel_name: &str,
        owner: &ConversationOwner,
        history: &BoundedQueue<Message>,
    ) -> Result<()> {
        if history.is_oversized() {
            return Err(Error::CapacityExceeded {
                len: history.len(),
                capacity: history.capacity(),
            });
        }

        let (channel_id, key) = self.conversation_key(channel_id, owner)?;
        let messages = history.to_vec();
        let name = channel_name.to_string();
        let default = ConversationRecord::new(channel_id, channel_name, owner);

        tracing::debug!(
            "[ContextStore] Saving {} messages to '{}'",
            messages.len(),
            key
        );
        self.documents
            .upsert(&key, default, move |mut record: ConversationRecord| {
                record.messages = messages;
                if !name.is_empty() {
                    record.name = name;
                }
                record
            })
            .await
    }

    /// Load a conversation into a context window sized for its owner.
    pub async fn open_conversation(
        &self,
        channel_id: &str,
        channel_name: &str,
        owner: &ConversationOwner,
    ) -> Result<ConversationContext> {
        let (channel_id, key) = self.conversation_key(channel_id, owner)?;

        let capacity = match owner {
            ConversationOwner::Actor(name) => self.history_capacity(name).await?,
            ConversationOwner::Shared => self.default_capacity,
        };
        let record = self.documents.get::<ConversationRecord>(&key).await?;

        ConversationContext::load(
            self.clone(),
            channel_id,
            channel_name.to_string(),
            owner.clone(),
            record.into_option(),
            usize::from(capacity),
        )
    }

    // ---------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------

    pub async fn purge_actor(&self, actor: &str) -> Result<bool> {
        let key = Namespace::Actor.key(&validation::actor_name(actor)?)?;
        self.documents.delete(&key).await
    }

    pub async fn purge_group(&self, group_id: &str) -> Result<bool> {
        let key = Namespace::Group.key(&validation::platform_id(group_id)?)?;
        self.documents.delete(&key).await
    }

    pub async fn purge_conversation(
        &self,
        channel_id: &str,
        owner: &ConversationOwner,
    ) -> Result<bool> {
        let (_, key) = self.conversation_key(channel_id, owner)?;
        self.documents.delete(&key).await
    }

    pub async fn list_keys(&self) -> Result<Vec<StorageKey>> {
        self.documents.keys().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryBackend;

    fn store() -> ContextStore {
        ContextStore::with_backend(
            Arc::new(InMemoryBackend::new()),
            Limits::new(20, 4000).unwrap(),
            5,
        )
    }

    #[tokio::test]
    async fn test_sanitize_actor_name() {
        let store = store();
        assert_eq!(store.sanitize_actor_name(" alice ").unwrap(), "alice");
        assert!(matches!(
            store.sanitize_actor_name("../../etc/passwd"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_dotted_names_cannot_reach_another_users_records() {
        let store = store();
        store
            .write_actor_option("alice", ConfigOption::SwitchModel("mine".into()))
            .await
            .unwrap();
        let mut queue = BoundedQueue::new(3).unwrap();
        queue.push(Message::user("private"));
        store
            .write_conversation("8", "general", &ConversationOwner::Actor("alice".into()), &queue)
            .await
            .unwrap();

        for impostor in [".alice", "..alice"] {
            let err = store
                .write_actor_option(impostor, ConfigOption::SwitchModel("other".into()))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidKey(_)));
            assert!(matches!(
                store.sanitize_actor_name(impostor),
                Err(Error::InvalidKey(_))
            ));
            assert!(matches!(
                store
                    .read_conversation("8", &ConversationOwner::Actor(impostor.into()))
                    .await,
                Err(Error::InvalidKey(_))
            ));
        }

        let record = store.read_actor_configuration("alice").await.unwrap().into_option().unwrap();
        assert_eq!(record.model(), Some("mine"));
    }

    #[tokio::test]
    async fn test_options_merge_across_writes() {
        let store = store();
        store
            .write_actor_option("alice", ConfigOption::SwitchModel("a".into()))
            .await
            .unwrap();
        store
            .write_actor_option("alice", ConfigOption::ModifyCapacity(10))
            .await
            .unwrap();

        let record = store
            .read_actor_configuration("alice")
            .await
            .unwrap()
            .into_option()
            .unwrap();
        assert_eq!(record.name, "alice");
        assert_eq!(record.model(), Some("a"));
        assert_eq!(record.capacity(), Some(10));
    }

    #[tokio::test]
    async fn test_option_namespace_enforced() {
        let store = store();
        let err = store
            .write_actor_option("alice", ConfigOption::ToggleChat(false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));

        store
            .write_group_option("42", ConfigOption::ToggleChat(false))
            .await
            .unwrap();
        let group = store.read_group_configuration("42").await.unwrap().into_option().unwrap();
        assert_eq!(group.chat_enabled(), Some(false));
    }

    #[tokio::test]
    async fn test_capacity_option_bounded() {
        let store = store();
        let err = store
            .write_actor_option("alice", ConfigOption::ModifyCapacity(21))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
        assert!(!store.read_actor_configuration("alice").await.unwrap().is_found());
    }

    #[tokio::test]
    async fn test_history_capacity_falls_back_to_default() {
        let store = store();
        assert_eq!(store.history_capacity("bob").await.unwrap(), 5);

        store
            .write_actor_option("bob", ConfigOption::ModifyCapacity(12))
            .await
            .unwrap();
        assert_eq!(store.history_capacity("bob").await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_invalid_identifiers_never_reach_storage() {
        let store = store();
        assert!(store
            .read_conversation("../1", &ConversationOwner::Shared)
            .await
            .is_err());
        assert!(store
            .read_conversation("1", &ConversationOwner::Actor("a/b".into()))
            .await
            .is_err());
        assert!(store.purge_group("abc").await.is_err());
        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_conversation_rewrites_messages() {
        let store = store();
        let owner = ConversationOwner::Shared;
        let mut queue = BoundedQueue::new(2).unwrap();
        queue.push(Message::user("one"));
        store.write_conversation("7", "general", &owner, &queue).await.unwrap();

        queue.push(Message::assistant("two"));
        queue.push(Message::user("three"));
        store.write_conversation("7", "", &owner, &queue).await.unwrap();

        let record = store.read_conversation("7", &owner).await.unwrap().into_option().unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.name, "general");
        assert_eq!(record.user, "shared-context");
        let contents: Vec<&str> = record.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
    }
}
