use crate::config::DEFAULT_MAX_UNIQUE_ID_LENGTH;
use crate::identity::{compute_unique_id, IdError};
use crate::status::{NodeStatus, StatusError};
use crate::types::NodeId;
use crate::workflow::{GraphError, Node, SubWorkflow};

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("enclosing node has no unique ID")]
    MissingUniqueId,

    #[error("node {0} is not declared in sub-workflow {1}")]
    UnknownNode(NodeId, crate::types::SubWorkflowId),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Per-tick view binding a sub-workflow's nodes to the status entries kept
/// under the enclosing node's status. Never persisted.
pub struct NodeLookup<'a> {
    sub_workflow: &'a SubWorkflow,
    status: &'a mut NodeStatus,
}

impl<'a> NodeLookup<'a> {
    /// A plain view; child linkage is left as it is.
    pub fn new(sub_workflow: &'a SubWorkflow, status: &'a mut NodeStatus) -> Self {
        Self {
            sub_workflow,
            status,
        }
    }

    pub fn sub_workflow(&self) -> &SubWorkflow {
        self.sub_workflow
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.sub_workflow.node(id)
    }

    /// Status of the enclosing node
    pub fn enclosing_status(&self) -> &NodeStatus {
        self.status
    }

    /// Existing status of a child node, without creating one
    pub fn node_status(&self, id: &NodeId) -> Option<&NodeStatus> {
        self.status.child_status(id)
    }

    /// Status of a declared child node, created on first access
    pub fn node_status_mut(&mut self, id: &NodeId) -> Result<&mut NodeStatus, LookupError> {
        if self.sub_workflow.node(id).is_none() {
            return Err(LookupError::UnknownNode(
                id.clone(),
                self.sub_workflow.id.clone(),
            ));
        }
        Ok(self.status.child_status_mut(id)?)
    }
}

/// Builds a [`NodeLookup`] after linking every declared child node to the
/// current attempt of the enclosing node.
pub struct NodeLookupBuilder<'a> {
    sub_workflow: &'a SubWorkflow,
    status: &'a mut NodeStatus,
    max_unique_id_length: usize,
}

impl<'a> NodeLookupBuilder<'a> {
    pub fn new(sub_workflow: &'a SubWorkflow, status: &'a mut NodeStatus) -> Self {
        Self {
            sub_workflow,
            status,
            max_unique_id_length: DEFAULT_MAX_UNIQUE_ID_LENGTH,
        }
    }

    pub fn max_unique_id_length(mut self, length: usize) -> Self {
        self.max_unique_id_length = length;
        self
    }

    /// Assign unique IDs for `attempt` to all children and return the view.
    /// Existing child entries keep everything except their linkage.
    pub fn build_for_attempt(self, attempt: u32) -> Result<NodeLookup<'a>, LookupError> {
        let parent_id = self
            .status
            .unique_node_id()
            .cloned()
            .ok_or(LookupError::MissingUniqueId)?;

        let mut linkage = Vec::new();
        for node_id in self.sub_workflow.declared_nodes()? {
            let unique_id =
                compute_unique_id(&node_id, &parent_id, attempt, self.max_unique_id_length)?;
            linkage.push((node_id, unique_id));
        }

        for (node_id, unique_id) in linkage {
            let child = self.status.child_status_mut(&node_id)?;
            child.set_linkage(unique_id, parent_id.clone(), attempt);
        }

        tracing::debug!(
            "Linked nodes of sub-workflow {} to {} (attempt {})",
            self.sub_workflow.id,
            parent_id,
            attempt
        );

        Ok(NodeLookup::new(self.sub_workflow, self.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataReference, SubWorkflowId, UniqueNodeId, END_NODE_ID, START_NODE_ID};
    use std::collections::BTreeMap;

    fn sub_workflow() -> SubWorkflow {
        let deps: BTreeMap<NodeId, Vec<NodeId>> = [
            (NodeId::new("a"), vec![NodeId::start()]),
            (NodeId::end(), vec![NodeId::new("a")]),
        ]
        .into_iter()
        .collect();

        SubWorkflow::new(
            SubWorkflowId::new("sub"),
            vec![Node::start(), Node::task("a", "t"), Node::end()],
            deps,
        )
        .unwrap()
        .with_failure_node(Node::task("fn0", "cleanup"))
        .unwrap()
    }

    fn enclosing_status() -> NodeStatus {
        NodeStatus::new(DataReference::new("runs/r1/n1")).with_unique_node_id(UniqueNodeId::new("n1"))
    }

    fn child_ids(status: &NodeStatus) -> Vec<(NodeId, UniqueNodeId)> {
        status
            .children()
            .map(|(id, s)| (id.clone(), s.unique_node_id().cloned().unwrap()))
            .collect()
    }

    #[test]
    fn test_factory_links_every_declared_node() {
        let sub = sub_workflow();
        let mut status = enclosing_status();

        let lookup = NodeLookupBuilder::new(&sub, &mut status)
            .build_for_attempt(2)
            .unwrap();
        assert!(lookup.node_status(&NodeId::new("fn0")).is_some());

        for id in [START_NODE_ID, "a", END_NODE_ID, "fn0"] {
            let child = status.child_status(&NodeId::new(id)).unwrap();
            assert_eq!(child.unique_parent_node_id().unwrap().as_str(), "n1");
            assert_eq!(child.parent_attempts(), Some(2));
            assert_eq!(child.unique_node_id().unwrap().as_str().len(), 20);
        }
    }

    #[test]
    fn test_factory_is_idempotent_within_attempt() {
        let sub = sub_workflow();
        let mut status = enclosing_status();

        NodeLookupBuilder::new(&sub, &mut status)
            .build_for_attempt(0)
            .unwrap();
        let first = child_ids(&status);

        NodeLookupBuilder::new(&sub, &mut status)
            .build_for_attempt(0)
            .unwrap();
        assert_eq!(child_ids(&status), first);
    }

    #[test]
    fn test_new_attempt_gets_new_ids() {
        let sub = sub_workflow();
        let mut status = enclosing_status();

        NodeLookupBuilder::new(&sub, &mut status)
            .build_for_attempt(0)
            .unwrap();
        let first = child_ids(&status);

        NodeLookupBuilder::new(&sub, &mut status)
            .build_for_attempt(1)
            .unwrap();
        let second = child_ids(&status);

        for ((id_a, uid_a), (id_b, uid_b)) in first.iter().zip(second.iter()) {
            assert_eq!(id_a, id_b);
            assert_ne!(uid_a, uid_b);
        }
    }

    #[test]
    fn test_missing_enclosing_unique_id() {
        let sub = sub_workflow();
        let mut status = NodeStatus::new(DataReference::new("runs/r1/n1"));

        let result = NodeLookupBuilder::new(&sub, &mut status).build_for_attempt(0);
        assert!(matches!(result, Err(LookupError::MissingUniqueId)));
    }

    #[test]
    fn test_corrupted_child_status_fails_lookup() {
        let sub = sub_workflow();
        let mut status = enclosing_status();
        status.insert_child(NodeId::new("a"), NodeStatus::default());

        let result = NodeLookupBuilder::new(&sub, &mut status).build_for_attempt(0);
        assert!(matches!(result, Err(LookupError::Status(StatusError::Corrupted(_)))));
    }

    #[test]
    fn test_invalid_id_length_fails_lookup() {
        let sub = sub_workflow();
        let mut status = enclosing_status();

        let result = NodeLookupBuilder::new(&sub, &mut status)
            .max_unique_id_length(2)
            .build_for_attempt(0);
        assert!(matches!(result, Err(LookupError::Id(IdError::InvalidLength { .. }))));
        // nothing was linked
        assert_eq!(status.children().count(), 0);
    }

    #[test]
    fn test_plain_lookup_rejects_undeclared_nodes() {
        let sub = sub_workflow();
        let mut status = enclosing_status();
        let mut lookup = NodeLookup::new(&sub, &mut status);

        assert!(lookup.node_status_mut(&NodeId::new("a")).is_ok());
        assert!(matches!(
            lookup.node_status_mut(&NodeId::new("zz")),
            Err(LookupError::UnknownNode(..))
        ));
        // a plain view never links
        assert!(status
            .child_status(&NodeId::new("a"))
            .unwrap()
            .unique_node_id()
            .is_none());
    }
}
