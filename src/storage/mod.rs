//! Document Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind `DocumentBackend`
//! - Schema checks and default synthesis hidden in `DocumentStore`
//! - Callers see typed records and `Lookup`, never raw JSON or file paths

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod filesystem;
pub mod keys;
pub mod memory;

pub use keys::StorageKey;

/// Outcome of reading a key: expected absence is not an error
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Lookup::NotFound, Lookup::Found)
    }
}

/// Mutation applied to a raw document under the key's lock.
///
/// Receives `None` when no document exists yet.
pub type RawMutator = Box<dyn FnOnce(Option<Value>) -> Result<Value> + Send + 'static>;

/// Raw JSON persistence. Implementations own locking and atomicity.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Read one document. `NotFound` only when nothing is stored under `key`.
    async fn load(&self, key: &StorageKey) -> Result<Lookup<Value>>;

    /// Read-modify-write `key`, serialized against other updates of the same key
    async fn update(&self, key: &StorageKey, mutator: RawMutator) -> Result<()>;

    /// Remove `key`, returning whether anything was removed
    async fn remove(&self, key: &StorageKey) -> Result<bool>;

    /// All keys currently stored
    async fn keys(&self) -> Result<Vec<StorageKey>>;

    /// Where `key` lives, as reported in `CorruptDocument` errors
    fn location(&self, key: &StorageKey) -> PathBuf;
}

/// A record type with a fixed JSON shape
pub trait Document: Serialize + DeserializeOwned + Send + 'static {
    /// Top-level fields that must be present for the document to be valid
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Name used in logs and error messages
    const KIND: &'static str;
}

/// Typed view over a backend
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self { backend }
    }

    /// Read and validate a document.
    pub async fn get<D: Document>(&self, key: &StorageKey) -> Result<Lookup<D>> {
        match self.backend.load(key).await? {
            Lookup::Found(raw) => {
                let location = self.backend.location(key);
                Ok(Lookup::Found(decode::<D>(key, &location, raw)?))
            }
            Lookup::NotFound => Ok(Lookup::NotFound),
        }
    }

    /// Apply `mutator` to the stored document, or to `default` if none exists.
    ///
    /// A corrupt stored document fails the update and is left untouched.
    pub async fn upsert<D, F>(&self, key: &StorageKey, default: D, mutator: F) -> Result<()>
    where
        D: Document,
        F: FnOnce(D) -> D + Send + 'static,
    {
        let owned_key = key.clone();
        let location = self.backend.location(key);
        let raw: RawMutator = Box::new(move |current: Option<Value>| -> Result<Value> {
            let document = match current {
                Some(raw) => decode::<D>(&owned_key, &location, raw)?,
                None => default,
            };
            serde_json::to_value(mutator(document)).map_err(|e| {
                Error::invalid("document", format!("cannot serialize {}: {}", D::KIND, e))
            })
        });

        self.backend.update(key, raw).await
    }

    pub async fn delete(&self, key: &StorageKey) -> Result<bool> {
        self.backend.remove(key).await
    }

    pub async fn keys(&self) -> Result<Vec<StorageKey>> {
        self.backend.keys().await
    }
}

/// Check required fields, then map the raw JSON onto `D`.
fn decode<D: Document>(key: &StorageKey, location: &Path, raw: Value) -> Result<D> {
    let object = raw.as_object().ok_or_else(|| {
        Error::corrupt(location, format!("{} is not a JSON object", D::KIND))
    })?;

    let missing: Vec<&str> = D::REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        tracing::warn!(
            "[DocumentStore] {} '{}' is missing fields: {:?}",
            D::KIND,
            key,
            missing
        );
        return Err(Error::corrupt(
            location,
            format!("{} missing required fields: {}", D::KIND, missing.join(", ")),
        ));
    }

    serde_json::from_value(raw).map_err(|e| {
        tracing::warn!("[DocumentStore] {} '{}' failed to decode: {}", D::KIND, key, e);
        Error::corrupt(location, e.to_string())
    })
}
