use crate::types::DataReference;
use bytes::Bytes;
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("artifact not found: {0}")]
    NotFound(DataReference),

    #[error("artifact store failed at {path}: {source}")]
    Backend {
        path: DataReference,
        #[source]
        source: object_store::Error,
    },
}

/// Result of probing an artifact without reading it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    exists: bool,
    size: u64,
}

impl Metadata {
    pub fn missing() -> Self {
        Self {
            exists: false,
            size: 0,
        }
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Durable storage for node inputs and outputs
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Probe an artifact. A missing artifact is not an error.
    async fn head(&self, path: &DataReference) -> Result<Metadata, StorageError>;

    /// Copy an artifact byte-for-byte
    async fn copy_raw(&self, src: &DataReference, dst: &DataReference) -> Result<(), StorageError>;

    async fn get(&self, path: &DataReference) -> Result<Option<Bytes>, StorageError>;

    async fn put(&self, path: &DataReference, data: Bytes) -> Result<(), StorageError>;
}

/// Artifact store backed by any `object_store` implementation (S3, local
/// filesystem, in-memory)
pub struct ObjectStoreArtifactStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreArtifactStore {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// In-process store, for local runs and tests
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), "")
    }

    fn key(&self, path: &DataReference) -> Path {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            Path::from(path.as_str())
        } else {
            Path::from(format!("{}/{}", prefix, path.as_str().trim_start_matches('/')))
        }
    }

    fn backend_error(path: &DataReference, source: object_store::Error) -> StorageError {
        StorageError::Backend {
            path: path.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl ArtifactStore for ObjectStoreArtifactStore {
    async fn head(&self, path: &DataReference) -> Result<Metadata, StorageError> {
        match self.store.head(&self.key(path)).await {
            Ok(meta) => Ok(Metadata {
                exists: true,
                size: meta.size as u64,
            }),
            Err(object_store::Error::NotFound { .. }) => Ok(Metadata::missing()),
            Err(e) => Err(Self::backend_error(path, e)),
        }
    }

    async fn copy_raw(&self, src: &DataReference, dst: &DataReference) -> Result<(), StorageError> {
        match self.store.copy(&self.key(src), &self.key(dst)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound(src.clone())),
            Err(e) => Err(Self::backend_error(src, e)),
        }
    }

    async fn get(&self, path: &DataReference) -> Result<Option<Bytes>, StorageError> {
        match self.store.get(&self.key(path)).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| Self::backend_error(path, e))?;
                Ok(Some(bytes))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Self::backend_error(path, e)),
        }
    }

    async fn put(&self, path: &DataReference, data: Bytes) -> Result<(), StorageError> {
        self.store
            .put(&self.key(path), data.into())
            .await
            .map_err(|e| Self::backend_error(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_head_and_copy() {
        let store = ObjectStoreArtifactStore::in_memory();
        let src = DataReference::new("runs/r1/n1/end-node/outputs.json");
        let dst = DataReference::new("runs/r1/n1/outputs.json");

        assert!(!store.head(&src).await.unwrap().exists());

        store.put(&src, Bytes::from(r#"{"out":5}"#)).await.unwrap();
        let meta = store.head(&src).await.unwrap();
        assert!(meta.exists());
        assert_eq!(meta.size(), 9);

        store.copy_raw(&src, &dst).await.unwrap();
        assert_eq!(store.get(&dst).await.unwrap().unwrap(), Bytes::from(r#"{"out":5}"#));
    }

    #[tokio::test]
    async fn test_copy_of_missing_artifact_is_not_found() {
        let store = ObjectStoreArtifactStore::in_memory();
        let result = store
            .copy_raw(&DataReference::new("a/missing"), &DataReference::new("b/dst"))
            .await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_local_filesystem_store_with_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let local = object_store::local::LocalFileSystem::new_with_prefix(temp_dir.path()).unwrap();
        let store = ObjectStoreArtifactStore::new(Arc::new(local), "tenant-a");

        let path = DataReference::new("runs/r1/inputs.json");
        store.put(&path, Bytes::from("{}")).await.unwrap();

        assert!(store.head(&path).await.unwrap().exists());
        assert!(temp_dir.path().join("tenant-a/runs/r1/inputs.json").exists());
        assert!(store.get(&DataReference::new("runs/r2/inputs.json")).await.unwrap().is_none());
    }
}
