use super::dag::{GraphError, WorkflowDag};
use crate::types::{NodeId, SubWorkflowId, END_NODE_ID, START_NODE_ID};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A vertex of a compiled workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: Option<String>,
    pub kind: NodeKind,
}

/// What a node does when it is executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point; receives the workflow inputs
    Start,
    /// Exit point; gathers the workflow outputs
    End,
    /// Leaf task, executed by a task handler
    Task { task_ref: String },
    /// An entire nested workflow
    Workflow { sub_workflow_ref: SubWorkflowId },
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(id),
            name: None,
            kind,
        }
    }

    pub fn start() -> Self {
        Self::new(START_NODE_ID, NodeKind::Start)
    }

    pub fn end() -> Self {
        Self::new(END_NODE_ID, NodeKind::End)
    }

    pub fn task(id: impl Into<String>, task_ref: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeKind::Task {
                task_ref: task_ref.into(),
            },
        )
    }

    pub fn sub_workflow(id: impl Into<String>, sub_workflow_ref: SubWorkflowId) -> Self {
        Self::new(id, NodeKind::Workflow { sub_workflow_ref })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Referenced sub-workflow, if this is a workflow node
    pub fn sub_workflow_ref(&self) -> Option<&SubWorkflowId> {
        match &self.kind {
            NodeKind::Workflow { sub_workflow_ref } => Some(sub_workflow_ref),
            _ => None,
        }
    }
}

/// Binds a workflow output variable to an output of one of its nodes,
/// e.g. `out = A.result`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub var: String,
    pub from_node: NodeId,
    pub from_var: String,
}

impl OutputBinding {
    pub fn new(var: impl Into<String>, from_node: impl Into<String>, from_var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            from_node: NodeId::new(from_node),
            from_var: from_var.into(),
        }
    }
}

/// A nested, independently executable workflow graph. Deserializing one
/// validates it like [`SubWorkflow::new`] does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSubWorkflow")]
pub struct SubWorkflow {
    pub id: SubWorkflowId,
    nodes: Vec<Node>,
    /// node -> the nodes it depends on
    dependencies: BTreeMap<NodeId, Vec<NodeId>>,
    output_bindings: Vec<OutputBinding>,
    on_failure_node: Option<Node>,
}

/// Unvalidated wire form of a [`SubWorkflow`]
#[derive(Deserialize)]
struct RawSubWorkflow {
    id: SubWorkflowId,
    nodes: Vec<Node>,
    #[serde(default)]
    dependencies: BTreeMap<NodeId, Vec<NodeId>>,
    #[serde(default)]
    output_bindings: Vec<OutputBinding>,
    #[serde(default)]
    on_failure_node: Option<Node>,
}

impl TryFrom<RawSubWorkflow> for SubWorkflow {
    type Error = GraphError;

    fn try_from(raw: RawSubWorkflow) -> Result<Self, GraphError> {
        let sub_workflow = Self {
            id: raw.id,
            nodes: raw.nodes,
            dependencies: raw.dependencies,
            output_bindings: raw.output_bindings,
            on_failure_node: raw.on_failure_node,
        };
        sub_workflow.validate()?;
        Ok(sub_workflow)
    }
}

impl SubWorkflow {
    /// Build and validate a sub-workflow graph
    pub fn new(
        id: SubWorkflowId,
        nodes: Vec<Node>,
        dependencies: BTreeMap<NodeId, Vec<NodeId>>,
    ) -> Result<Self, GraphError> {
        Self::try_from(RawSubWorkflow {
            id,
            nodes,
            dependencies,
            output_bindings: Vec::new(),
            on_failure_node: None,
        })
    }

    pub fn with_output_bindings(mut self, bindings: Vec<OutputBinding>) -> Result<Self, GraphError> {
        self.output_bindings = bindings;
        self.validate()?;
        Ok(self)
    }

    pub fn with_failure_node(mut self, node: Node) -> Result<Self, GraphError> {
        self.on_failure_node = Some(node);
        self.validate()?;
        Ok(self)
    }

    /// Check the graph is a well-formed DAG with a start node
    pub fn validate(&self) -> Result<(), GraphError> {
        let dag = WorkflowDag::from_nodes(&self.nodes, &self.dependencies)?;
        if !dag.contains(&self.start_node()) {
            return Err(GraphError::MissingStartNode(self.id.clone()));
        }

        for binding in &self.output_bindings {
            if !dag.contains(&binding.from_node) {
                return Err(GraphError::UnknownNode(binding.from_node.clone()));
            }
        }

        if let Some(failure_node) = &self.on_failure_node {
            if dag.contains(&failure_node.id) {
                return Err(GraphError::DuplicateNode(failure_node.id.clone()));
            }
        }

        Ok(())
    }

    pub fn start_node(&self) -> NodeId {
        NodeId::start()
    }

    pub fn end_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id.as_str() == END_NODE_ID)
    }

    pub fn on_failure_node(&self) -> Option<&Node> {
        self.on_failure_node.as_ref()
    }

    pub fn output_bindings(&self) -> &[OutputBinding] {
        &self.output_bindings
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Look up a node of the graph, including the failure node
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes
            .iter()
            .chain(self.on_failure_node.iter())
            .find(|n| &n.id == id)
    }

    /// Every node that gets a status entry: the graph in dependency order,
    /// followed by the failure node.
    pub fn declared_nodes(&self) -> Result<Vec<NodeId>, GraphError> {
        let dag = WorkflowDag::from_nodes(&self.nodes, &self.dependencies)?;
        let mut ids = dag.topological_order();
        if let Some(failure_node) = &self.on_failure_node {
            ids.push(failure_node.id.clone());
        }
        Ok(ids)
    }
}

/// The compiled top-level workflow as seen by node handlers: resolves
/// sub-workflow references.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    workflow_id: String,
    sub_workflows: HashMap<SubWorkflowId, Arc<SubWorkflow>>,
}

impl ExecutionContext {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            sub_workflows: HashMap::new(),
        }
    }

    pub fn with_sub_workflow(mut self, sub_workflow: SubWorkflow) -> Self {
        self.register(sub_workflow);
        self
    }

    pub fn register(&mut self, sub_workflow: SubWorkflow) {
        self.sub_workflows
            .insert(sub_workflow.id.clone(), Arc::new(sub_workflow));
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn find_sub_workflow(&self, id: &SubWorkflowId) -> Option<Arc<SubWorkflow>> {
        self.sub_workflows.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(edges: &[(&str, &[&str])]) -> BTreeMap<NodeId, Vec<NodeId>> {
        edges
            .iter()
            .map(|(node, upstream)| {
                (
                    NodeId::new(*node),
                    upstream.iter().map(|u| NodeId::new(*u)).collect(),
                )
            })
            .collect()
    }

    fn linear() -> SubWorkflow {
        SubWorkflow::new(
            SubWorkflowId::new("sub"),
            vec![Node::start(), Node::task("a", "t"), Node::end()],
            deps(&[("a", &[START_NODE_ID]), (END_NODE_ID, &["a"])]),
        )
        .unwrap()
    }

    #[test]
    fn test_declared_nodes_include_failure_node_last() {
        let sub = linear().with_failure_node(Node::task("fn0", "cleanup")).unwrap();
        let ids = sub.declared_nodes().unwrap();

        assert_eq!(
            ids,
            vec![
                NodeId::start(),
                NodeId::new("a"),
                NodeId::end(),
                NodeId::new("fn0")
            ]
        );
        assert!(sub.node(&NodeId::new("fn0")).is_some());
    }

    #[test]
    fn test_missing_start_node_rejected() {
        let result = SubWorkflow::new(
            SubWorkflowId::new("sub"),
            vec![Node::task("a", "t")],
            BTreeMap::new(),
        );
        assert!(matches!(result, Err(GraphError::MissingStartNode(_))));
    }

    #[test]
    fn test_failure_node_must_not_shadow_graph_node() {
        let result = linear().with_failure_node(Node::task("a", "cleanup"));
        assert!(matches!(result, Err(GraphError::DuplicateNode(id)) if id.as_str() == "a"));
    }

    #[test]
    fn test_output_binding_to_unknown_node_rejected() {
        let result = linear().with_output_bindings(vec![OutputBinding::new("out", "zz", "result")]);
        assert!(matches!(result, Err(GraphError::UnknownNode(_))));
    }

    #[test]
    fn test_deserialized_sub_workflow_is_validated() {
        let json = r#"{
            "id": "sub",
            "nodes": [
                {"id": "start-node", "kind": {"type": "start"}},
                {"id": "a", "kind": {"type": "task", "task_ref": "t"}},
                {"id": "b", "kind": {"type": "task", "task_ref": "t"}}
            ],
            "dependencies": {"a": ["start-node", "b"], "b": ["a"]}
        }"#;

        let err = serde_json::from_str::<SubWorkflow>(json).unwrap_err();
        assert!(err.to_string().contains("circular dependencies"));
    }

    #[test]
    fn test_sub_workflow_json_round_trip() {
        let sub = linear()
            .with_output_bindings(vec![OutputBinding::new("out", "a", "result")])
            .unwrap()
            .with_failure_node(Node::task("fn0", "cleanup"))
            .unwrap();

        let json = serde_json::to_string(&sub).unwrap();
        let restored: SubWorkflow = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.declared_nodes().unwrap(), sub.declared_nodes().unwrap());
        assert_eq!(restored.output_bindings(), sub.output_bindings());
        assert_eq!(restored.on_failure_node(), sub.on_failure_node());
    }

    #[test]
    fn test_execution_context_resolves_sub_workflows() {
        let ctx = ExecutionContext::new("wf").with_sub_workflow(linear());
        assert!(ctx.find_sub_workflow(&SubWorkflowId::new("sub")).is_some());
        assert!(ctx.find_sub_workflow(&SubWorkflowId::new("other")).is_none());
    }
}
