use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{KeyValueStore, StoreError};

type Entries = BTreeMap<String, String>;

/// Key-value store kept as one JSON object in a single file.
///
/// Every write replaces the file through a temp file and a rename, so readers
/// never observe a half written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        info!(path = %path.display(), "file store opened");

        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Entries, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    // mutations start over from an empty object when the file is corrupt;
    // the flag tells the caller the file must be rewritten
    async fn read_for_update(&self) -> Result<(Entries, bool), StoreError> {
        match self.read().await {
            Ok(entries) => Ok((entries, false)),
            Err(StoreError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "discarding corrupt store file");
                Ok((Entries::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    async fn write(&self, entries: &Entries) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let encoded =
            serde_json::to_string_pretty(entries).map_err(|e| StoreError::Encoding(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, encoded).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let (mut entries, _) = self.read_for_update().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let (mut entries, discarded) = self.read_for_update().await?;
        if entries.remove(key).is_none() && !discarded {
            return Ok(());
        }
        self.write(&entries).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
