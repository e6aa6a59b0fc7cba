use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::errors::{ClientError, ClientResult};
use crate::domain::ports::SessionStore;

/// Key/value pairs persisted as a single JSON object on disk.
pub struct FileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    write_lock: AsyncMutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> ClientResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                ClientError::Storage(format!(
                    "Corrupt session file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }

    async fn write_all(&self, values: &HashMap<String, String>) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| storage_error(parent, e))?;
            }
        }
        let contents = serde_json::to_string(values)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }
}

fn storage_error(path: &Path, err: std::io::Error) -> ClientError {
    ClientError::Storage(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn save(&self, key: &str, value: &str) -> ClientResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await
    }

    async fn remove(&self, key: &str) -> ClientResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key).is_some() {
            self.write_all(&values).await?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &str) -> ClientResult<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> ClientResult<()> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> ClientResult<()> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::SESSION_TOKEN_KEY;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("teamflow-test-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let path = temp_path("session.json");
        let store = FileSessionStore::new(&path);

        assert_eq!(store.load(SESSION_TOKEN_KEY).await.unwrap(), None);
        store.save(SESSION_TOKEN_KEY, "tok-1").await.unwrap();

        let reopened = FileSessionStore::new(&path);
        assert_eq!(
            reopened.load(SESSION_TOKEN_KEY).await.unwrap().as_deref(),
            Some("tok-1")
        );

        reopened.remove(SESSION_TOKEN_KEY).await.unwrap();
        assert_eq!(store.load(SESSION_TOKEN_KEY).await.unwrap(), None);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let path = temp_path("session.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = FileSessionStore::new(&path);
        let err = store.load(SESSION_TOKEN_KEY).await.unwrap_err();
        assert!(matches!(err, ClientError::Storage(_)));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_remove_missing_key_is_ok() {
        let store = InMemorySessionStore::new();
        store.remove("absent").await.unwrap();
        assert_eq!(store.load("absent").await.unwrap(), None);
    }
}
