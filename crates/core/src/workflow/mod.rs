pub mod dag;
pub mod spec;

pub use dag::{GraphError, WorkflowDag};
pub use spec::{ExecutionContext, Node, NodeKind, OutputBinding, SubWorkflow};
