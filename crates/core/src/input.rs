use crate::storage::ArtifactStore;
use crate::types::{DataReference, LiteralMap};
use anyhow::Context;
use std::sync::Arc;

/// Source of a node's resolved input values
#[async_trait::async_trait]
pub trait InputReader: Send + Sync {
    async fn get(&self) -> anyhow::Result<LiteralMap>;
}

/// Inputs already held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticInputReader {
    inputs: LiteralMap,
}

impl StaticInputReader {
    pub fn new(inputs: LiteralMap) -> Self {
        Self { inputs }
    }
}

#[async_trait::async_trait]
impl InputReader for StaticInputReader {
    async fn get(&self) -> anyhow::Result<LiteralMap> {
        Ok(self.inputs.clone())
    }
}

/// Reads a JSON inputs file written by the upstream nodes. A node without an
/// inputs file has no inputs.
pub struct StoredInputReader {
    store: Arc<dyn ArtifactStore>,
    path: DataReference,
}

impl StoredInputReader {
    pub fn new(store: Arc<dyn ArtifactStore>, path: DataReference) -> Self {
        Self { store, path }
    }

    /// Reader for `<data_dir>/<inputs_file>`
    pub fn for_node(store: Arc<dyn ArtifactStore>, data_dir: &DataReference, inputs_file: &str) -> Self {
        Self::new(store, data_dir.join(inputs_file))
    }
}

#[async_trait::async_trait]
impl InputReader for StoredInputReader {
    async fn get(&self) -> anyhow::Result<LiteralMap> {
        let Some(bytes) = self.store.get(&self.path).await? else {
            tracing::debug!("No inputs file at {}, using empty inputs", self.path);
            return Ok(LiteralMap::new());
        };

        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to decode inputs at {}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectStoreArtifactStore;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_stored_inputs() {
        let store: Arc<dyn ArtifactStore> = Arc::new(ObjectStoreArtifactStore::in_memory());
        let data_dir = DataReference::new("runs/r1/n1");
        store
            .put(&data_dir.join("inputs.json"), Bytes::from(r#"{"x":5}"#))
            .await
            .unwrap();

        let inputs = StoredInputReader::for_node(store, &data_dir, "inputs.json")
            .get()
            .await
            .unwrap();
        assert_eq!(inputs.get("x"), Some(&serde_json::json!(5)));
    }

    #[tokio::test]
    async fn test_missing_inputs_file_means_no_inputs() {
        let store: Arc<dyn ArtifactStore> = Arc::new(ObjectStoreArtifactStore::in_memory());
        let reader = StoredInputReader::new(store, DataReference::new("runs/r1/n1/inputs.json"));
        assert!(reader.get().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_inputs_file_is_an_error() {
        let store: Arc<dyn ArtifactStore> = Arc::new(ObjectStoreArtifactStore::in_memory());
        let path = DataReference::new("runs/r1/n1/inputs.json");
        store.put(&path, Bytes::from("not json")).await.unwrap();

        let err = StoredInputReader::new(store, path).get().await.unwrap_err();
        assert!(err.to_string().contains("failed to decode inputs"));
    }
}
