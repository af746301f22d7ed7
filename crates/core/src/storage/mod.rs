pub mod artifact;

pub use artifact::{ArtifactStore, Metadata, ObjectStoreArtifactStore, StorageError};
