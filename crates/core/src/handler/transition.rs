use crate::types::{DataReference, ExecutionError, ExecutionErrorKind};
use chrono::{DateTime, Utc};

/// Phase a node handler asks the enclosing node to move to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Failing,
    Failed,
    Succeeded,
}

/// Where a node's outputs were written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    pub output_uri: DataReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionInfo {
    pub output_info: Option<OutputInfo>,
}

#[derive(Debug, Clone)]
pub struct PhaseInfo {
    phase: Phase,
    error: Option<ExecutionError>,
    info: Option<ExecutionInfo>,
    occurred_at: DateTime<Utc>,
}

impl PhaseInfo {
    fn new(phase: Phase, error: Option<ExecutionError>, info: Option<ExecutionInfo>) -> Self {
        Self {
            phase,
            error,
            info,
            occurred_at: Utc::now(),
        }
    }

    pub fn running() -> Self {
        Self::new(Phase::Running, None, None)
    }

    pub fn failing(error: ExecutionError) -> Self {
        Self::new(Phase::Failing, Some(error), None)
    }

    pub fn failure(error: ExecutionError) -> Self {
        Self::new(Phase::Failed, Some(error), None)
    }

    pub fn failure_with(kind: ExecutionErrorKind, code: &str, message: impl Into<String>) -> Self {
        Self::failure(ExecutionError::new(kind, code, message))
    }

    pub fn success(info: Option<ExecutionInfo>) -> Self {
        Self::new(Phase::Succeeded, None, info)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    pub fn info(&self) -> Option<&ExecutionInfo> {
        self.info.as_ref()
    }

    pub fn output_info(&self) -> Option<&OutputInfo> {
        self.info.as_ref().and_then(|i| i.output_info.as_ref())
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// Ephemeral phase change produced by one reconciliation tick. Persisting it
/// is up to the enclosing node's state machine.
#[derive(Debug, Clone)]
pub struct Transition {
    info: PhaseInfo,
}

impl Transition {
    pub fn ephemeral(info: PhaseInfo) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &PhaseInfo {
        &self.info
    }

    pub fn phase(&self) -> Phase {
        self.info.phase
    }
}
