//! The recursive node executor, as consumed by workflow node handlers.
//!
//! Walking an arbitrary node graph (and dispatching leaf tasks) is the
//! executor's job; handlers only hand it a graph, a [`NodeLookup`] and the
//! node to start from, and interpret the aggregate state it reports.

use crate::lookup::NodeLookup;
use crate::types::{ExecutionError, LiteralMap, NodeId};
use crate::workflow::{ExecutionContext, SubWorkflow};

/// Rolled-up state of a node graph after one recursive pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutorPhase {
    #[default]
    Running,
    /// Some nodes finished and others became runnable; another pass is due
    PartiallyComplete,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorState {
    pub phase: ExecutorPhase,
    pub error: Option<ExecutionError>,
}

impl ExecutorState {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn partially_complete() -> Self {
        Self {
            phase: ExecutorPhase::PartiallyComplete,
            error: None,
        }
    }

    pub fn complete() -> Self {
        Self {
            phase: ExecutorPhase::Complete,
            error: None,
        }
    }

    pub fn failed(error: ExecutionError) -> Self {
        Self {
            phase: ExecutorPhase::Failed,
            error: Some(error),
        }
    }

    pub fn has_failed(&self) -> bool {
        self.phase == ExecutorPhase::Failed
    }

    pub fn is_complete(&self) -> bool {
        self.phase == ExecutorPhase::Complete
    }

    pub fn is_partially_complete(&self) -> bool {
        self.phase == ExecutorPhase::PartiallyComplete
    }
}

/// Generic recursive node executor
#[async_trait::async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Drive `graph` forward starting at `start_node` and report its
    /// aggregate state
    async fn recursive_node_handler(
        &self,
        ctx: &ExecutionContext,
        graph: &SubWorkflow,
        lookup: &mut NodeLookup<'_>,
        start_node: &NodeId,
    ) -> anyhow::Result<ExecutorState>;

    /// Make `inputs` the outputs of the graph's start node
    async fn set_inputs_for_start_node(
        &self,
        ctx: &ExecutionContext,
        graph: &SubWorkflow,
        lookup: &mut NodeLookup<'_>,
        inputs: &LiteralMap,
    ) -> anyhow::Result<ExecutorState>;

    /// Abort every node of `graph` reachable from `start_node`
    async fn abort_handler(
        &self,
        ctx: &ExecutionContext,
        graph: &SubWorkflow,
        lookup: &mut NodeLookup<'_>,
        start_node: &NodeId,
        reason: &str,
    ) -> anyhow::Result<()>;
}
