//! File System Document Storage
//!
//! Information Hiding:
//! - File paths, staging files and JSON encoding hidden from users
//! - Per-key lock registry hidden behind `update`
//! - Data root confinement delegated to `StorageKey::resolve`

use super::keys::{DOCUMENT_EXTENSION, STAGING_SUFFIX};
use super::{DocumentBackend, Lookup, RawMutator, StorageKey};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// File system storage - each document is a JSON file
/// Files are stored as {data_root}/{key}.json and staged through {key}.json.tmp
pub struct FileSystemBackend {
    root: PathBuf,
    /// One lock per resolved path. Entries are never evicted.
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileSystemBackend {
    pub async fn new(data_root: impl Into<PathBuf>) -> Result<Self> {
        let data_root = data_root.into();
        fs::create_dir_all(&data_root)
            .await
            .map_err(|e| Error::io(format!("create data root {:?}", data_root), e))?;

        let root = fs::canonicalize(&data_root)
            .await
            .map_err(|e| Error::io(format!("canonicalize data root {:?}", data_root), e))?;

        let backend = Self {
            root,
            locks: Mutex::new(HashMap::new()),
        };
        backend.sweep_staged().await?;

        tracing::debug!("[FileSystemBackend] Opened data root {:?}", backend.root);
        Ok(backend)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lookup-or-insert under the registry lock, so two callers racing on a
    /// fresh key always share one mutex.
    async fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Remove staging files left behind by an interrupted write.
    /// The committed document next to each one is still intact.
    async fn sweep_staged(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::io("read data root", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io("read data root entry", e))?
        {
            let path = entry.path();
            let staged = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(&format!(".{}{}", DOCUMENT_EXTENSION, STAGING_SUFFIX)))
                .unwrap_or(false);
            if staged {
                tracing::info!("[FileSystemBackend] Removing stale staging file {:?}", path);
                fs::remove_file(&path)
                    .await
                    .map_err(|e| Error::io(format!("remove {:?}", path), e))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for FileSystemBackend {
    async fn load(&self, key: &StorageKey) -> Result<Lookup<Value>> {
        let path = key.resolve(&self.root)?;
        let document = read_document(&path).await?;

        tracing::debug!(
            "[FileSystemBackend] Loaded '{}' ({})",
            key,
            if document.is_some() { "found" } else { "absent" }
        );
        Ok(document.into())
    }

    async fn update(&self, key: &StorageKey, mutator: RawMutator) -> Result<()> {
        let path = key.resolve(&self.root)?;
        let lock = self.lock_for(&path).await;

        // Waiting here is the only cancellable point. Once the guard is held the
        // read-modify-write runs on its own task and finishes even if the caller
        // is dropped.
        let guard = lock.lock_owned().await;

        let task = tokio::spawn(async move {
            let _guard = guard;
            let current = read_document(&path).await?;
            let next = mutator(current)?;
            write_atomic(&path, &next).await
        });

        match task.await {
            Ok(result) => {
                if result.is_ok() {
                    tracing::debug!("[FileSystemBackend] Committed '{}'", key);
                }
                result
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Error::io(
                format!("update task for '{}'", key),
                std::io::Error::new(ErrorKind::Other, e.to_string()),
            )),
        }
    }

    async fn remove(&self, key: &StorageKey) -> Result<bool> {
        let path = key.resolve(&self.root)?;
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("[FileSystemBackend] Deleted '{}'", key);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("[FileSystemBackend] '{}' does not exist, nothing to delete", key);
                Ok(false)
            }
            Err(e) => Err(Error::io(format!("delete {:?}", path), e)),
        }
    }

    async fn keys(&self) -> Result<Vec<StorageKey>> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::io("read data root", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io("read data root entry", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(DOCUMENT_EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(StorageKey::from_file_stem)
            {
                keys.push(key);
            }
        }

        keys.sort();
        tracing::debug!("[FileSystemBackend] Listed {} documents", keys.len());
        Ok(keys)
    }

    fn location(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

/// `None` only when the file is missing; anything unreadable as a JSON
/// document is an error.
async fn read_document(path: &Path) -> Result<Option<Value>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(format!("read {:?}", path), e)),
    };

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        tracing::warn!("[FileSystemBackend] Empty document at {:?}", path);
        return Err(Error::corrupt(path, "file is empty"));
    }

    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        tracing::warn!("[FileSystemBackend] Unparsable document at {:?}: {}", path, e);
        Error::corrupt(path, e.to_string())
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_os_string();
    staged.push(STAGING_SUFFIX);
    staged.into()
}

/// Write to `<path>.tmp`, flush to disk, then rename over `path`.
async fn write_atomic(path: &Path, document: &Value) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(document)
        .map_err(|e| Error::invalid("document", format!("cannot encode: {}", e)))?;
    bytes.push(b'\n');

    let staged = staging_path(path);
    let staged_write = async {
        let mut file = fs::File::create(&staged).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        fs::rename(&staged, path).await
    };

    if let Err(e) = staged_write.await {
        let _ = fs::remove_file(&staged).await;
        return Err(Error::io(format!("commit {:?}", path), e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn backend() -> (TempDir, FileSystemBackend) {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        (temp_dir, backend)
    }

    fn set(value: Value) -> RawMutator {
        Box::new(move |_: Option<Value>| -> Result<Value> { Ok(value) })
    }

    #[tokio::test]
    async fn test_update_and_load() {
        let (_dir, backend) = backend().await;
        let key = StorageKey::sanitize("doc").unwrap();

        backend.update(&key, set(json!({"a": 1}))).await.unwrap();
        let loaded = backend.load(&key).await.unwrap();
        assert_eq!(loaded, Lookup::Found(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let (_dir, backend) = backend().await;
        let key = StorageKey::sanitize("missing").unwrap();
        assert_eq!(backend.load(&key).await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_empty_and_garbage_files_are_corrupt() {
        let (dir, backend) = backend().await;

        fs::write(dir.path().join("empty.json"), "").await.unwrap();
        fs::write(dir.path().join("garbage.json"), "{not json").await.unwrap();

        for name in ["empty", "garbage"] {
            let key = StorageKey::sanitize(name).unwrap();
            let err = backend.load(&key).await.unwrap_err();
            assert!(matches!(err, Error::CorruptDocument { .. }), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_no_staging_file_left_behind() {
        let (dir, backend) = backend().await;
        let key = StorageKey::sanitize("doc").unwrap();
        backend.update(&key, set(json!({"a": 1}))).await.unwrap();

        assert!(dir.path().join("doc.json").exists());
        assert!(!dir.path().join("doc.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_mutator_keeps_previous_document() {
        let (_dir, backend) = backend().await;
        let key = StorageKey::sanitize("doc").unwrap();
        backend.update(&key, set(json!({"v": 1}))).await.unwrap();

        let failing: RawMutator = Box::new(|_: Option<Value>| -> Result<Value> { Err(Error::invalid("v", "rejected")) });
        assert!(backend.update(&key, failing).await.is_err());

        assert_eq!(backend.load(&key).await.unwrap(), Lookup::Found(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_remove_reports_whether_deleted() {
        let (_dir, backend) = backend().await;
        let key = StorageKey::sanitize("doc").unwrap();
        backend.update(&key, set(json!({}))).await.unwrap();

        assert!(backend.remove(&key).await.unwrap());
        assert!(!backend.remove(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_skip_staging_and_foreign_files() {
        let (dir, backend) = backend().await;
        for name in ["b", "a"] {
            let key = StorageKey::sanitize(name).unwrap();
            backend.update(&key, set(json!({}))).await.unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "x").await.unwrap();

        let keys: Vec<String> = backend.keys().await.unwrap().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_stale_staging_files_swept_on_open() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("doc.json"), "{\"v\":1}").unwrap();
        std::fs::write(temp_dir.path().join("doc.json.tmp"), "{\"v\":").unwrap();

        let backend = FileSystemBackend::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();

        assert!(!temp_dir.path().join("doc.json.tmp").exists());
        let key = StorageKey::sanitize("doc").unwrap();
        assert_eq!(backend.load(&key).await.unwrap(), Lookup::Found(json!({"v": 1})));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_serialize() {
        let (_dir, backend) = backend().await;
        let backend = Arc::new(backend);
        let key = StorageKey::sanitize("counter").unwrap();

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let backend = backend.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    let bump: RawMutator = Box::new(|current: Option<Value>| -> Result<Value> {
                        let n = current
                            .and_then(|v| v.get("n").and_then(Value::as_u64))
                            .unwrap_or(0);
                        Ok(json!({ "n": n + 1 }))
                    });
                    backend.update(&key, bump).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(backend.load(&key).await.unwrap(), Lookup::Found(json!({"n": 40})));
    }
}
