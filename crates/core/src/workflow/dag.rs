use super::spec::Node;
use crate::types::NodeId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;
use std::collections::{BTreeMap, HashMap};

/// Structural problems in a compiled workflow graph
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("node {0} is defined more than once")]
    DuplicateNode(NodeId),

    #[error("node {0} is referenced but not defined")]
    UnknownNode(NodeId),

    #[error("sub-workflow {0} has no start node")]
    MissingStartNode(crate::types::SubWorkflowId),

    #[error("workflow contains circular dependencies")]
    Cycle,
}

/// DAG representation of a (sub-)workflow
pub struct WorkflowDag {
    graph: DiGraph<NodeId, ()>,
    node_indices: HashMap<NodeId, NodeIndex>,
}

impl WorkflowDag {
    /// Build a DAG from node definitions and their upstream dependencies
    pub fn from_nodes(
        nodes: &[Node],
        dependencies: &BTreeMap<NodeId, Vec<NodeId>>,
    ) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for node in nodes {
            if node_indices.contains_key(&node.id) {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
            let idx = graph.add_node(node.id.clone());
            node_indices.insert(node.id.clone(), idx);
        }

        for (node_id, upstream) in dependencies {
            let node_idx = node_indices
                .get(node_id)
                .ok_or_else(|| GraphError::UnknownNode(node_id.clone()))?;

            for dep_id in upstream {
                let dep_idx = node_indices
                    .get(dep_id)
                    .ok_or_else(|| GraphError::UnknownNode(dep_id.clone()))?;

                // dep -> node
                graph.add_edge(*dep_idx, *node_idx, ());
            }
        }

        if petgraph::algo::is_cyclic_directed(&graph) {
            return Err(GraphError::Cycle);
        }

        Ok(Self {
            graph,
            node_indices,
        })
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.node_indices.contains_key(id)
    }

    /// Node IDs in topological order (dependencies first)
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut topo = Topo::new(&self.graph);
        let mut ids = Vec::with_capacity(self.graph.node_count());

        while let Some(idx) = topo.next(&self.graph) {
            ids.push(self.graph[idx].clone());
        }

        ids
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

    #[test]
    fn test_linear_dag() {
        let nodes = vec![Node::start(), Node::task("a", "t"), Node::end()];
        let dag = WorkflowDag::from_nodes(
            &nodes,
            &deps(&[("a", &["start-node"]), ("end-node", &["a"])]),
        )
        .unwrap();

        let order = dag.topological_order();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0].as_str(), "start-node");
        assert_eq!(order[1].as_str(), "a");
        assert_eq!(order[2].as_str(), "end-node");
        assert!(dag.contains(&NodeId::new("a")));
        assert!(!dag.contains(&NodeId::new("b")));
    }

    #[test]
    fn test_cyclic_dag_rejected() {
        let nodes = vec![Node::task("a", "t"), Node::task("b", "t")];
        let result = WorkflowDag::from_nodes(&nodes, &deps(&[("a", &["b"]), ("b", &["a"])]));

        assert!(result.is_err());
        assert!(result
            .err()
            .unwrap()
            .to_string()
            .contains("circular dependencies"));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let nodes = vec![Node::start()];
        let result = WorkflowDag::from_nodes(&nodes, &deps(&[("start-node", &["ghost"])]));
        assert!(matches!(result, Err(GraphError::UnknownNode(id)) if id.as_str() == "ghost"));
    }
}
