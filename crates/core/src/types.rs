use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved ID of the node every workflow starts from
pub const START_NODE_ID: &str = "start-node";

/// Reserved ID of the node that collects a workflow's outputs
pub const END_NODE_ID: &str = "end-node";

/// Identifier of a node, unique within its (sub-)workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn start() -> Self {
        Self::new(START_NODE_ID)
    }

    pub fn end() -> Self {
        Self::new(END_NODE_ID)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a sub-workflow within the compiled parent workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubWorkflowId(pub String);

impl SubWorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SubWorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution-wide identity of a node. Unlike [`NodeId`], this stays unique across
/// nesting levels and across attempts of the enclosing node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueNodeId(pub String);

impl UniqueNodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UniqueNodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location of data in the artifact store, as a `/`-separated key
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataReference(pub String);

impl DataReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a path segment
    pub fn join(&self, segment: impl AsRef<str>) -> Self {
        let segment = segment.as_ref().trim_matches('/');
        if self.0.is_empty() {
            return Self(segment.to_string());
        }
        Self(format!("{}/{}", self.0.trim_end_matches('/'), segment))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DataReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named literal values passed into or out of a node
pub type LiteralMap = BTreeMap<String, serde_json::Value>;

/// Who is to blame for a failed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    Unknown,
    User,
    System,
}

/// Error codes produced by the workflow node handlers
pub mod codes {
    pub const RUNTIME_EXECUTION_ERROR: &str = "RuntimeExecutionError";
    pub const SUBWORKFLOW_EXECUTION_FAILED: &str = "SubWorkflowExecutionFailed";
}

/// Failure recorded against a node execution. This is a value carried on
/// transitions and statuses, not a Rust error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
    pub kind: ExecutionErrorKind,
}

impl ExecutionError {
    pub fn new(kind: ExecutionErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn user(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::User, code, message)
    }

    pub fn system(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::System, code, message)
    }
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_reference_join() {
        let base = DataReference::new("runs/abc/");
        assert_eq!(base.join("n1").as_str(), "runs/abc/n1");
        assert_eq!(base.join("/n1/").join("outputs.json").as_str(), "runs/abc/n1/outputs.json");
        assert_eq!(DataReference::default().join("n1").as_str(), "n1");
    }
}
