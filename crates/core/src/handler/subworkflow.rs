use super::context::NodeExecutionContext;
use super::transition::{ExecutionInfo, OutputInfo, PhaseInfo, Transition};
use super::WorkflowNodeBackend;
use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::executor::{ExecutorPhase, NodeExecutor};
use crate::lookup::{NodeLookup, NodeLookupBuilder};
use crate::status::{WorkflowNodePhase, WorkflowNodeState};
use crate::types::codes::{RUNTIME_EXECUTION_ERROR, SUBWORKFLOW_EXECUTION_FAILED};
use crate::types::{DataReference, ExecutionError, ExecutionErrorKind};
use crate::workflow::SubWorkflow;
use std::sync::Arc;

/// Executes workflow nodes whose body is an inline sub-workflow, by driving
/// the sub-workflow graph through the recursive node executor.
pub struct SubWorkflowHandler {
    node_executor: Arc<dyn NodeExecutor>,
    config: HandlerConfig,
}

impl SubWorkflowHandler {
    pub fn new(node_executor: Arc<dyn NodeExecutor>, config: HandlerConfig) -> Self {
        Self {
            node_executor,
            config,
        }
    }

    fn resolve_sub_workflow(ctx: &NodeExecutionContext<'_>) -> Result<Arc<SubWorkflow>, HandlerError> {
        let sub_id = ctx
            .node
            .sub_workflow_ref()
            .ok_or_else(|| HandlerError::NotAWorkflowNode(ctx.node.id.clone()))?;

        ctx.execution_context
            .find_sub_workflow(sub_id)
            .ok_or_else(|| HandlerError::SubWorkflowNotFound(sub_id.clone()))
    }

    fn resolution_failure(err: HandlerError) -> Transition {
        Transition::ephemeral(PhaseInfo::failure_with(
            ExecutionErrorKind::System,
            SUBWORKFLOW_EXECUTION_FAILED,
            err.to_string(),
        ))
    }

    fn outputs_file(&self, dir: &DataReference) -> DataReference {
        dir.join(&self.config.outputs_file)
    }

    /// Give every sub-workflow node an identity for the current attempt
    fn link_children(
        &self,
        ctx: &mut NodeExecutionContext<'_>,
        sub_workflow: &SubWorkflow,
    ) -> Result<(), HandlerError> {
        let attempt = ctx.current_attempt();
        NodeLookupBuilder::new(sub_workflow, &mut *ctx.status)
            .max_unique_id_length(self.config.max_unique_id_length)
            .build_for_attempt(attempt)?;
        Ok(())
    }

    /// Seed the start node with the enclosing node's inputs, then drive the
    /// sub-workflow
    async fn start_and_handle(
        &self,
        ctx: &mut NodeExecutionContext<'_>,
        sub_workflow: &SubWorkflow,
    ) -> Result<Transition, HandlerError> {
        let inputs = match ctx.inputs.get().await {
            Ok(inputs) => inputs,
            Err(e) => {
                tracing::warn!("Failed to read inputs of node {}: {:#}", ctx.node.id, e);
                return Ok(Transition::ephemeral(PhaseInfo::failure_with(
                    ExecutionErrorKind::System,
                    RUNTIME_EXECUTION_ERROR,
                    format!("failed to read input: {:#}", e),
                )));
            }
        };

        let start_status = {
            let mut lookup = NodeLookup::new(sub_workflow, &mut *ctx.status);
            // Errors here are system errors, retried with the whole tick.
            self.node_executor
                .set_inputs_for_start_node(ctx.execution_context, sub_workflow, &mut lookup, &inputs)
                .await
                .map_err(HandlerError::Executor)?
        };

        if start_status.has_failed() {
            return Ok(Transition::ephemeral(PhaseInfo::failure(reported_error(
                start_status.error,
            ))));
        }

        self.handle_sub_workflow(ctx, sub_workflow).await
    }

    /// Run one recursive pass over the sub-workflow and translate its
    /// aggregate state into a transition of the enclosing node
    async fn handle_sub_workflow(
        &self,
        ctx: &mut NodeExecutionContext<'_>,
        sub_workflow: &SubWorkflow,
    ) -> Result<Transition, HandlerError> {
        let start_node = sub_workflow.start_node();
        let state = {
            let mut lookup = NodeLookup::new(sub_workflow, &mut *ctx.status);
            self.node_executor
                .recursive_node_handler(ctx.execution_context, sub_workflow, &mut lookup, &start_node)
                .await
                .map_err(HandlerError::Executor)?
        };

        match state.phase {
            ExecutorPhase::Failed => {
                let error = reported_error(state.error);
                let attempt = ctx.current_attempt();
                ctx.status.set_workflow_node_state(WorkflowNodeState::new(
                    WorkflowNodePhase::Failing,
                    Some(error.clone()),
                    attempt,
                ));

                if sub_workflow.on_failure_node().is_some() {
                    tracing::info!(
                        "Sub-workflow {} failed, node {} will run its failure node",
                        sub_workflow.id,
                        ctx.node.id
                    );
                    return Ok(Transition::ephemeral(PhaseInfo::failing(error)));
                }

                Ok(Transition::ephemeral(PhaseInfo::failure(error)))
            }
            ExecutorPhase::Complete => self.propagate_outputs(ctx, sub_workflow).await,
            ExecutorPhase::PartiallyComplete => {
                ctx.enqueue_owner.enqueue().map_err(HandlerError::Enqueue)?;
                Ok(Transition::ephemeral(PhaseInfo::running()))
            }
            ExecutorPhase::Running => Ok(Transition::ephemeral(PhaseInfo::running())),
        }
    }

    /// Copy the end node's outputs file to the enclosing node's output
    /// location, if the sub-workflow declares outputs at all
    async fn propagate_outputs(
        &self,
        ctx: &mut NodeExecutionContext<'_>,
        sub_workflow: &SubWorkflow,
    ) -> Result<Transition, HandlerError> {
        if sub_workflow.output_bindings().is_empty() {
            return Ok(Transition::ephemeral(PhaseInfo::success(None)));
        }

        let end_output_dir = sub_workflow
            .end_node()
            .and_then(|end| ctx.status.child_status(&end.id))
            .map(|status| status.output_dir().clone());
        let Some(end_output_dir) = end_output_dir else {
            return Ok(Transition::ephemeral(PhaseInfo::failure_with(
                ExecutionErrorKind::System,
                SUBWORKFLOW_EXECUTION_FAILED,
                "no end node found in subworkflow",
            )));
        };

        let source = self.outputs_file(&end_output_dir);
        let metadata = ctx.data_store.head(&source).await?;
        if !metadata.exists() {
            return Ok(Transition::ephemeral(PhaseInfo::failure_with(
                ExecutionErrorKind::System,
                SUBWORKFLOW_EXECUTION_FAILED,
                format!(
                    "subworkflow is expected to produce outputs but no outputs file was written to {}",
                    source
                ),
            )));
        }

        let destination = self.outputs_file(ctx.status.output_dir());
        if let Err(e) = ctx.data_store.copy_raw(&source, &destination).await {
            tracing::warn!("Failed to copy sub-workflow outputs: {}", e);
            return Ok(Transition::ephemeral(PhaseInfo::failure_with(
                ExecutionErrorKind::System,
                SUBWORKFLOW_EXECUTION_FAILED,
                format!(
                    "failed to copy subworkflow outputs from [{}] to [{}]",
                    source, destination
                ),
            )));
        }

        tracing::debug!("Copied sub-workflow outputs to {}", destination);
        Ok(Transition::ephemeral(PhaseInfo::success(Some(ExecutionInfo {
            output_info: Some(OutputInfo {
                output_uri: destination,
            }),
        }))))
    }
}

#[async_trait::async_trait]
impl WorkflowNodeBackend for SubWorkflowHandler {
    async fn start(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError> {
        let sub_workflow = match Self::resolve_sub_workflow(ctx) {
            Ok(sub_workflow) => sub_workflow,
            Err(e) => return Ok(Self::resolution_failure(e)),
        };

        tracing::info!(
            "Starting sub-workflow {} of workflow {} for node {} (attempt {})",
            sub_workflow.id,
            ctx.execution_context.workflow_id(),
            ctx.node.id,
            ctx.current_attempt()
        );

        self.link_children(ctx, &sub_workflow)?;
        self.start_and_handle(ctx, &sub_workflow).await
    }

    async fn check_status(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError> {
        let sub_workflow = match Self::resolve_sub_workflow(ctx) {
            Ok(sub_workflow) => sub_workflow,
            Err(e) => return Ok(Self::resolution_failure(e)),
        };

        self.link_children(ctx, &sub_workflow)?;
        self.handle_sub_workflow(ctx, &sub_workflow).await
    }

    async fn handle_failing(&self, ctx: &mut NodeExecutionContext<'_>) -> Result<Transition, HandlerError> {
        let sub_workflow = match Self::resolve_sub_workflow(ctx) {
            Ok(sub_workflow) => sub_workflow,
            Err(e) => return Ok(Self::resolution_failure(e)),
        };

        let original_error = recorded_error(ctx);
        let Some(failure_node) = sub_workflow.on_failure_node() else {
            tracing::info!("Sub-workflow {} has no failure node, failing immediately", sub_workflow.id);
            return Ok(Transition::ephemeral(PhaseInfo::failure(original_error)));
        };

        let state = {
            let mut lookup = NodeLookup::new(&sub_workflow, &mut *ctx.status);
            self.node_executor
                .recursive_node_handler(ctx.execution_context, &sub_workflow, &mut lookup, &failure_node.id)
                .await
                .map_err(HandlerError::Executor)?
        };

        match state.phase {
            ExecutorPhase::Running => Ok(Transition::ephemeral(PhaseInfo::running())),
            // The failure node's own failure masks the original one.
            ExecutorPhase::Failed => Ok(Transition::ephemeral(PhaseInfo::failure(reported_error(
                state.error,
            )))),
            ExecutorPhase::PartiallyComplete => {
                ctx.enqueue_owner.enqueue().map_err(HandlerError::Enqueue)?;
                Ok(Transition::ephemeral(PhaseInfo::failing(original_error)))
            }
            // A successful failure node only cleans up; the node still fails
            // with the original cause.
            ExecutorPhase::Complete => Ok(Transition::ephemeral(PhaseInfo::failure(original_error))),
        }
    }

    async fn abort(&self, ctx: &mut NodeExecutionContext<'_>, reason: &str) -> Result<(), HandlerError> {
        let sub_workflow = Self::resolve_sub_workflow(ctx)?;
        let start_node = sub_workflow.start_node();

        tracing::info!("Aborting sub-workflow {} of node {}: {}", sub_workflow.id, ctx.node.id, reason);

        let mut lookup = NodeLookup::new(&sub_workflow, &mut *ctx.status);
        self.node_executor
            .abort_handler(ctx.execution_context, &sub_workflow, &mut lookup, &start_node, reason)
            .await
            .map_err(HandlerError::Executor)
    }
}

/// Error reported by the executor for a failed state
fn reported_error(error: Option<ExecutionError>) -> ExecutionError {
    error.unwrap_or_else(|| {
        ExecutionError::system(
            SUBWORKFLOW_EXECUTION_FAILED,
            "subworkflow failed without reporting an error",
        )
    })
}

/// Original failure persisted when the sub-workflow first failed
fn recorded_error(ctx: &NodeExecutionContext<'_>) -> ExecutionError {
    ctx.status
        .workflow_node_state()
        .error
        .clone()
        .unwrap_or_else(|| {
            ExecutionError::system(
                SUBWORKFLOW_EXECUTION_FAILED,
                "subworkflow failed without a recorded error",
            )
        })
}
