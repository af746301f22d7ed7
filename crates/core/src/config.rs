use crate::storage::{ArtifactStore, ObjectStoreArtifactStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MAX_UNIQUE_ID_LENGTH: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// File name a node writes its outputs to, inside its output directory
    #[serde(default = "default_outputs_file")]
    pub outputs_file: String,

    /// File name a node's resolved inputs are read from, inside its data directory
    #[serde(default = "default_inputs_file")]
    pub inputs_file: String,

    #[serde(default = "default_max_unique_id_length")]
    pub max_unique_id_length: usize,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    Local,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Root directory for the local backend
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Key prefix applied to every artifact
    #[serde(default)]
    pub prefix: String,
}

fn default_outputs_file() -> String {
    "outputs.json".to_string()
}

fn default_inputs_file() -> String {
    "inputs.json".to_string()
}

fn default_max_unique_id_length() -> usize {
    DEFAULT_MAX_UNIQUE_ID_LENGTH
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            outputs_file: default_outputs_file(),
            inputs_file: default_inputs_file(),
            max_unique_id_length: default_max_unique_id_length(),
            storage: StorageConfig::default(),
        }
    }
}

impl HandlerConfig {
    pub fn load(config_path: &Path) -> Result<Self> {
        // Load config file if it exists, otherwise use defaults
        if !config_path.exists() {
            tracing::info!(
                "Configuration file {} not found, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read configuration file")?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration file")
    }
}

impl StorageConfig {
    /// Construct the configured artifact store
    pub fn build(&self) -> Result<Arc<dyn ArtifactStore>> {
        let store: Arc<dyn object_store::ObjectStore> = match self.backend {
            StorageBackend::Memory => Arc::new(object_store::memory::InMemory::new()),
            StorageBackend::Local => {
                let root = self
                    .root
                    .as_ref()
                    .context("Local storage backend requires a root directory")?;
                std::fs::create_dir_all(root).context("Failed to create storage root")?;
                Arc::new(
                    object_store::local::LocalFileSystem::new_with_prefix(root)
                        .context("Failed to open local storage root")?,
                )
            }
        };

        Ok(Arc::new(ObjectStoreArtifactStore::new(store, self.prefix.clone())))
    }
}
