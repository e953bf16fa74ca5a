//! Raw bid-document bytes, addressed by an opaque storage reference.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::StoreError;

/// Source of raw document bytes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, StoreError>;
}

/// Documents kept as files under one root directory.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `source` into the store and return its storage reference.
    pub async fn import(&self, source: &Path) -> Result<String, StoreError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Other(format!("no filename in {}", source.display())))?;
        let storage_ref = format!("{}-{filename}", uuid::Uuid::new_v4());
        tokio::fs::create_dir_all(&self.root).await?;
        let bytes = tokio::fs::copy(source, self.root.join(&storage_ref)).await?;
        info!(storage_ref = %storage_ref, bytes, "imported document");
        Ok(storage_ref)
    }

    fn resolve(&self, storage_ref: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(storage_ref);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if storage_ref.is_empty() || !plain {
            return Err(StoreError::Other(format!(
                "invalid storage reference: {storage_ref:?}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn fetch(&self, storage_ref: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(storage_ref)?;
        Ok(tokio::fs::read(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn import_then_fetch() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("acme bid.txt");
        std::fs::write(&source, "Install ductwork throughout").unwrap();

        let store = FsDocumentStore::new(tmp.path().join("docs"));
        let storage_ref = store.import(&source).await.unwrap();
        assert!(storage_ref.ends_with("-acme bid.txt"));
        let bytes = store.fetch(&storage_ref).await.unwrap();
        assert_eq!(bytes, b"Install ductwork throughout");
    }

    #[tokio::test]
    async fn rejects_escaping_references() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FsDocumentStore::new(tmp.path());
        assert!(matches!(store.fetch("../etc/passwd").await, Err(StoreError::Other(_))));
        assert!(matches!(store.fetch("/etc/passwd").await, Err(StoreError::Other(_))));
        assert!(matches!(store.fetch("").await, Err(StoreError::Other(_))));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FsDocumentStore::new(tmp.path());
        assert!(matches!(store.fetch("absent.pdf").await, Err(StoreError::Io(_))));
    }
}
