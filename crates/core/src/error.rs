use crate::lookup::LookupError;
use crate::storage::StorageError;
use crate::types::{NodeId, SubWorkflowId};

/// A tick that ends in `Err` made no phase decision; the caller retries the
/// whole tick later.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("node {0} is not a workflow node")]
    NotAWorkflowNode(NodeId),

    #[error("failed to find sub workflow with ID [{0}]")]
    SubWorkflowNotFound(SubWorkflowId),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Executor(anyhow::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to enqueue owner workflow: {0}")]
    Enqueue(#[source] anyhow::Error),
}
