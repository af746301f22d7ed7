use crate::input::InputReader;
use crate::status::NodeStatus;
use crate::storage::ArtifactStore;
use crate::workflow::{ExecutionContext, Node};

/// Schedules another reconciliation tick for the workflow that owns a node
pub trait EnqueueOwner: Send + Sync {
    fn enqueue(&self) -> anyhow::Result<()>;
}

impl<F> EnqueueOwner for F
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn enqueue(&self) -> anyhow::Result<()> {
        self()
    }
}

/// Everything a node handler may touch during one tick. The status is
/// borrowed exclusively: ticks for a node never overlap.
pub struct NodeExecutionContext<'a> {
    pub node: &'a Node,
    pub execution_context: &'a ExecutionContext,
    pub status: &'a mut NodeStatus,
    pub inputs: &'a dyn InputReader,
    pub data_store: &'a dyn ArtifactStore,
    pub enqueue_owner: &'a dyn EnqueueOwner,
}

impl<'a> NodeExecutionContext<'a> {
    pub fn new(
        node: &'a Node,
        execution_context: &'a ExecutionContext,
        status: &'a mut NodeStatus,
        inputs: &'a dyn InputReader,
        data_store: &'a dyn ArtifactStore,
        enqueue_owner: &'a dyn EnqueueOwner,
    ) -> Self {
        Self {
            node,
            execution_context,
            status,
            inputs,
            data_store,
            enqueue_owner,
        }
    }

    /// Attempt of the enclosing node this tick runs under
    pub fn current_attempt(&self) -> u32 {
        self.status.attempts()
    }
}
