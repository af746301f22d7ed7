//! Retry-safe identities for nodes nested inside other nodes.
//!
//! A child node's unique ID is derived from its own ID, the unique ID of the
//! node that encloses it and the enclosing node's current attempt. The same
//! triple always yields the same ID, so recomputing IDs on every
//! reconciliation tick is harmless, while a new attempt of the enclosing node
//! gets a disjoint set of child IDs.

use crate::types::{NodeId, UniqueNodeId};
use sha2::{Digest, Sha256};

pub const MIN_UNIQUE_ID_LENGTH: usize = 8;
/// One leading letter plus a full hex-encoded SHA-256 digest
pub const MAX_UNIQUE_ID_LENGTH: usize = 65;

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("cannot compute a unique ID for an empty node ID")]
    EmptyNodeId,

    #[error("cannot compute a unique ID for node {0}: parent unique ID is empty")]
    EmptyParentId(NodeId),

    #[error("unique ID length {length} is outside the encodable range {min}..={max}")]
    InvalidLength { length: usize, min: usize, max: usize },
}

/// Compute the fixed-length unique ID of `node_id` running under attempt
/// `attempt` of the node identified by `parent`.
pub fn compute_unique_id(
    node_id: &NodeId,
    parent: &UniqueNodeId,
    attempt: u32,
    length: usize,
) -> Result<UniqueNodeId, IdError> {
    if !(MIN_UNIQUE_ID_LENGTH..=MAX_UNIQUE_ID_LENGTH).contains(&length) {
        return Err(IdError::InvalidLength {
            length,
            min: MIN_UNIQUE_ID_LENGTH,
            max: MAX_UNIQUE_ID_LENGTH,
        });
    }
    if node_id.as_str().is_empty() {
        return Err(IdError::EmptyNodeId);
    }
    if parent.as_str().is_empty() {
        return Err(IdError::EmptyParentId(node_id.clone()));
    }

    // Length-prefix every part so ("a-1", 0, "b") and ("a", 1, "0-b") never collide.
    let attempt = attempt.to_string();
    let mut hasher = Sha256::new();
    for part in [parent.as_str(), attempt.as_str(), node_id.as_str()] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());

    // IDs end up in resource names, which must start with a letter.
    Ok(UniqueNodeId(format!("f{}", &digest[..length - 1])))
}
