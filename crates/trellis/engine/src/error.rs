//! Engine-level error types

use trellis_store::StoreError;
use trellis_types::{TaskFailure, WorkflowError};

/// Convenience alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by run resolution, instance binding, and test execution
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Domain-level failure from the core workflow types
    #[error("{0}")]
    Workflow(#[from] WorkflowError),

    /// Failure reported by the platform store
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The task body itself failed; carried opaquely and never converted
    #[error("task execution failed: {0}")]
    Task(#[from] TaskFailure),

    /// No debugger from the configured preference list could be resolved
    #[error("no usable debugger: {0}")]
    DebuggerUnavailable(String),
}

impl EngineError {
    /// Whether this error came from the task body rather than the engine
    pub fn is_task_failure(&self) -> bool {
        matches!(self, EngineError::Task(_))
    }
}
