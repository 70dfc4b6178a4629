//! Local-disk backend used when object storage is not configured.
//! Keys map directly onto paths under the configured root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{ObjectStore, StorageError};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn io_err(path: &Path, e: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(parent, e))?;
        }
        fs::write(&path, data)
            .await
            .map_err(|e| Self::io_err(&path, e))?;
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { key: key.to_string() })
            }
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&path, e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.path_for(key)).await.unwrap_or(false))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_err(&dir, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::io_err(&dir, e))?
            {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    let key = rel.to_string_lossy().replace('\\', "/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        format!("local://{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let url = store
            .put("protocols/1/photos/original/2.jpg", b"bytes".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "local://protocols/1/photos/original/2.jpg");
        assert_eq!(
            store.get("protocols/1/photos/original/2.jpg").await.unwrap(),
            b"bytes"
        );
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(matches!(
            store.get("protocols/1/x.jpg").await,
            Err(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn overwrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put("k/a.json", b"one".to_vec(), "application/json").await.unwrap();
        store.put("k/a.json", b"two".to_vec(), "application/json").await.unwrap();
        assert_eq!(store.get("k/a.json").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.delete("never/existed.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn list_and_delete_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store.put("protocols/5/photos/thumb/1.webp", b"a".to_vec(), "image/webp").await.unwrap();
        store.put("protocols/5/photos/gallery/1.jpg", b"b".to_vec(), "image/jpeg").await.unwrap();
        store.put("protocols/6/photos/thumb/2.webp", b"c".to_vec(), "image/webp").await.unwrap();

        let listed = store.list("protocols/5/").await.unwrap();
        assert_eq!(listed.len(), 2);

        let removed = store.delete_prefix("protocols/5/").await.unwrap();
        assert_eq!(removed, 2);
        assert!(!store.exists("protocols/5/photos/thumb/1.webp").await.unwrap());
        assert!(store.exists("protocols/6/photos/thumb/2.webp").await.unwrap());
    }
}
