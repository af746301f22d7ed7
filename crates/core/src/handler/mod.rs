//! Node handlers: one reconciliation tick of a node's state machine.

pub mod context;
pub mod subworkflow;
pub mod transition;
pub mod workflow_node;


pub use context::{EnqueueOwner, NodeExecutionContext};
pub use subworkflow::SubWorkflowHandler;
pub use transition::{ExecutionInfo, OutputInfo, Phase, PhaseInfo, Transition};
pub use workflow_node::WorkflowNodeHandler;

use crate::error::HandlerError;

/// Capability every node kind's handler provides to the node state machine
#[async_trait::async_trait]
pub trait NodeHandler: Send + Sync {
    /// Run one tick and decide the node's next phase
    async fn handle(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError>;

    /// Stop the node and everything it started
    async fn abort(&self, ctx: &mut NodeExecutionContext<'_>, reason: &str) -> Result<(), HandlerError>;
}

/// The body of a workflow node. Each entry point is a complete tick.
#[async_trait::async_trait]
pub trait WorkflowNodeBackend: Send + Sync {
    /// First tick: set inputs and start executing
    async fn start(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError>;

    /// Later ticks while executing
    async fn check_status(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError>;

    /// Ticks after the body failed and the node moved to failing
    async fn handle_failing(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError>;

    async fn abort(&self, ctx: &mut NodeExecutionContext<'_>, reason: &str) -> Result<(), HandlerError>;
}
