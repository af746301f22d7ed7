use super::context::NodeExecutionContext;
use super::subworkflow::SubWorkflowHandler;
use super::transition::{Phase, Transition};
use super::{NodeHandler, WorkflowNodeBackend};
use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::executor::NodeExecutor;
use crate::status::{WorkflowNodePhase, WorkflowNodeState};
use crate::workflow::NodeKind;
use std::sync::Arc;

/// Handler for workflow nodes. Picks the entry point of the backend from the
/// phase persisted on the node's status.
pub struct WorkflowNodeHandler {
    backend: Arc<dyn WorkflowNodeBackend>,
}

impl WorkflowNodeHandler {
    pub fn new(backend: Arc<dyn WorkflowNodeBackend>) -> Self {
        Self { backend }
    }

    /// Handler executing inline sub-workflows through `node_executor`
    pub fn for_sub_workflows(node_executor: Arc<dyn NodeExecutor>, config: HandlerConfig) -> Self {
        Self::new(Arc::new(SubWorkflowHandler::new(node_executor, config)))
    }

    fn ensure_workflow_node(ctx: &NodeExecutionContext<'_>) -> Result<(), HandlerError> {
        match ctx.node.kind {
            NodeKind::Workflow { .. } => Ok(()),
            _ => Err(HandlerError::NotAWorkflowNode(ctx.node.id.clone())),
        }
    }
}

#[async_trait::async_trait]
impl NodeHandler for WorkflowNodeHandler {
    async fn handle(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError> {
        Self::ensure_workflow_node(ctx)?;

        let attempt = ctx.current_attempt();
        let recorded = ctx.status.workflow_node_state();
        let phase = if recorded.attempt == attempt {
            recorded.phase
        } else {
            // The record belongs to an earlier attempt; start over.
            tracing::info!(
                "Node {} moved to attempt {}, restarting its sub-workflow",
                ctx.node.id,
                attempt
            );
            ctx.status.set_workflow_node_state(WorkflowNodeState::new(
                WorkflowNodePhase::Undefined,
                None,
                attempt,
            ));
            WorkflowNodePhase::Undefined
        };

        match phase {
            WorkflowNodePhase::Undefined => {
                let transition = self.backend.start(ctx).await?;
                // A failing start already recorded its own state.
                if transition.phase() == Phase::Running
                    && ctx.status.workflow_node_state().phase == WorkflowNodePhase::Undefined
                {
                    ctx.status.set_workflow_node_state(WorkflowNodeState::new(
                        WorkflowNodePhase::Executing,
                        None,
                        attempt,
                    ));
                }
                Ok(transition)
            }
            WorkflowNodePhase::Executing => self.backend.check_status(ctx).await,
            WorkflowNodePhase::Failing => self.backend.handle_failing(ctx).await,
        }
    }

    async fn abort(&self, ctx: &mut NodeExecutionContext<'_>, reason: &str) -> Result<(), HandlerError> {
        Self::ensure_workflow_node(ctx)?;
        self.backend.abort(ctx, reason).await
    }
}
