use crate::{RunId, TaskId, WorkflowId};
use thiserror::Error;

/// Result type for workflow domain operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Domain errors shared across the trellis crates.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no run found for workflow '{workflow_id}' matching '{identifier}'")]
    RunNotFound {
        workflow_id: WorkflowId,
        identifier: String,
    },

    #[error("no task instance found for task '{task_id}' in run '{run_id}'")]
    TaskInstanceNotFound { task_id: TaskId, run_id: RunId },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("runtime fault: {0}")]
    RuntimeFault(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
