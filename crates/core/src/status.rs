use crate::types::{DataReference, ExecutionError, NodeId, UniqueNodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Phase of a single node execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePhase {
    #[default]
    NotYetStarted,
    Queued,
    Running,
    Failing,
    Succeeded,
    Failed,
    Aborted,
    Skipped,
}

impl NodePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodePhase::Succeeded | NodePhase::Failed | NodePhase::Aborted | NodePhase::Skipped
        )
    }
}

/// Phase of a workflow node from the enclosing node's point of view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNodePhase {
    #[default]
    Undefined,
    Executing,
    Failing,
}

/// Persisted record of how far a workflow node got in one attempt. `error`
/// holds the original sub-workflow failure once the node starts failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNodeState {
    pub phase: WorkflowNodePhase,
    pub error: Option<ExecutionError>,
    /// Attempt of the enclosing node this record belongs to
    #[serde(default)]
    pub attempt: u32,
}

impl WorkflowNodeState {
    pub fn new(phase: WorkflowNodePhase, error: Option<ExecutionError>, attempt: u32) -> Self {
        Self {
            phase,
            error,
            attempt,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("cannot place child node {0}: parent status has no data directory")]
    MissingDataDir(NodeId),

    #[error("persisted status of child node {0} is corrupted: no data directory")]
    Corrupted(NodeId),
}

/// Mutable, persisted execution record of a node and, for nodes that contain
/// a graph, of all of its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    phase: NodePhase,
    attempts: u32,
    data_dir: DataReference,
    output_dir: DataReference,
    unique_node_id: Option<UniqueNodeId>,
    unique_parent_node_id: Option<UniqueNodeId>,
    parent_attempts: Option<u32>,
    #[serde(default)]
    workflow_node_state: WorkflowNodeState,
    error: Option<ExecutionError>,
    last_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    sub_node_status: BTreeMap<NodeId, NodeStatus>,
}

impl NodeStatus {
    pub fn new(data_dir: DataReference) -> Self {
        Self {
            output_dir: data_dir.clone(),
            data_dir,
            ..Default::default()
        }
    }

    pub fn with_unique_node_id(mut self, id: UniqueNodeId) -> Self {
        self.unique_node_id = Some(id);
        self
    }

    pub fn with_output_dir(mut self, output_dir: DataReference) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn phase(&self) -> NodePhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: NodePhase) {
        self.phase = phase;
        self.last_updated_at = Some(Utc::now());
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: Option<ExecutionError>) {
        self.error = error;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn increment_attempts(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn data_dir(&self) -> &DataReference {
        &self.data_dir
    }

    pub fn output_dir(&self) -> &DataReference {
        &self.output_dir
    }

    pub fn set_output_dir(&mut self, output_dir: DataReference) {
        self.output_dir = output_dir;
    }

    pub fn unique_node_id(&self) -> Option<&UniqueNodeId> {
        self.unique_node_id.as_ref()
    }

    pub fn unique_parent_node_id(&self) -> Option<&UniqueNodeId> {
        self.unique_parent_node_id.as_ref()
    }

    /// Attempt of the enclosing node this child was last linked to
    pub fn parent_attempts(&self) -> Option<u32> {
        self.parent_attempts
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated_at
    }

    /// Only the node lookup factory links children to their parent.
    pub(crate) fn set_linkage(
        &mut self,
        unique_node_id: UniqueNodeId,
        unique_parent_node_id: UniqueNodeId,
        parent_attempts: u32,
    ) {
        self.unique_node_id = Some(unique_node_id);
        self.unique_parent_node_id = Some(unique_parent_node_id);
        self.parent_attempts = Some(parent_attempts);
    }

    pub fn workflow_node_state(&self) -> &WorkflowNodeState {
        &self.workflow_node_state
    }

    pub fn set_workflow_node_state(&mut self, state: WorkflowNodeState) {
        self.workflow_node_state = state;
        self.last_updated_at = Some(Utc::now());
    }

    pub fn child_status(&self, id: &NodeId) -> Option<&NodeStatus> {
        self.sub_node_status.get(id)
    }

    pub fn children(&self) -> impl Iterator<Item = (&NodeId, &NodeStatus)> {
        self.sub_node_status.iter()
    }

    /// Status of a child node, created on first access under
    /// `<data_dir>/<child id>`
    pub fn child_status_mut(&mut self, id: &NodeId) -> Result<&mut NodeStatus, StatusError> {
        if let Some(existing) = self.sub_node_status.get(id) {
            if existing.data_dir.is_empty() {
                return Err(StatusError::Corrupted(id.clone()));
            }
        } else if self.data_dir.is_empty() {
            return Err(StatusError::MissingDataDir(id.clone()));
        }

        let data_dir = self.data_dir.join(id.as_str());
        Ok(self
            .sub_node_status
            .entry(id.clone())
            .or_insert_with(|| NodeStatus::new(data_dir)))
    }

    /// Insert a child status wholesale, as restored from storage
    pub fn insert_child(&mut self, id: NodeId, status: NodeStatus) {
        self.sub_node_status.insert(id, status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_status_created_lazily_under_parent_dir() {
        let mut status = NodeStatus::new(DataReference::new("runs/r1/n1"));
        assert!(status.child_status(&NodeId::new("a")).is_none());

        let child = status.child_status_mut(&NodeId::new("a")).unwrap();
        assert_eq!(child.data_dir().as_str(), "runs/r1/n1/a");
        assert_eq!(child.output_dir().as_str(), "runs/r1/n1/a");
        assert_eq!(child.phase(), NodePhase::NotYetStarted);

        child.set_phase(NodePhase::Running);
        assert_eq!(
            status.child_status(&NodeId::new("a")).unwrap().phase(),
            NodePhase::Running
        );
    }

    #[test]
    fn test_corrupted_child_status_is_rejected() {
        let mut status = NodeStatus::new(DataReference::new("runs/r1/n1"));
        status.insert_child(NodeId::new("a"), NodeStatus::default());

        let result = status.child_status_mut(&NodeId::new("a"));
        assert!(matches!(result, Err(StatusError::Corrupted(_))));
    }

    #[test]
    fn test_child_status_requires_parent_data_dir() {
        let mut status = NodeStatus::default();
        let result = status.child_status_mut(&NodeId::new("a"));
        assert!(matches!(result, Err(StatusError::MissingDataDir(_))));
    }

    #[test]
    fn test_status_round_trips_through_json() {
        let mut status = NodeStatus::new(DataReference::new("runs/r1/n1"))
            .with_unique_node_id(UniqueNodeId::new("n1"));
        status.increment_attempts();
        status.set_workflow_node_state(WorkflowNodeState::new(
            WorkflowNodePhase::Failing,
            Some(ExecutionError::user("E1", "task a failed")),
            1,
        ));
        status.child_status_mut(&NodeId::new("a")).unwrap();

        let json = serde_json::to_string(&status).unwrap();
        let restored: NodeStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, status);
    }
}
