// Sub-workflow execution core for the Nestflow workflow controller

pub mod types;
pub mod config;
pub mod error;
pub mod identity;
pub mod status;
pub mod lookup;
pub mod storage;
pub mod input;
pub mod executor;
pub mod workflow;
pub mod handler;

pub use config::HandlerConfig;
pub use error::HandlerError;
pub use handler::{NodeHandler, SubWorkflowHandler, WorkflowNodeHandler};
pub use types::*;
