//! Task definitions and the task body seam.
//!
//! A task definition is declarative metadata plus a handle to the body
//! that does the actual work. Bodies never survive the canonical wire
//! form; a definition decoded from it carries an unbound handle, and
//! callers re-bind the concrete definition before executing.

use crate::{Param, ParamSet, RunId, TaskId, WorkflowId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pool tasks run in when none is assigned
pub const DEFAULT_POOL: &str = "default_pool";

// ── Task Execution Seam ──────────────────────────────────────────────

/// Input handed to a task body when it runs
#[derive(Clone, Debug)]
pub struct TaskContext {
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub task_id: TaskId,
    pub map_index: i32,
    /// Merged and validated parameters for this invocation
    pub params: ParamSet,
    output: Vec<String>,
}

impl TaskContext {
    pub fn new(
        workflow_id: WorkflowId,
        run_id: RunId,
        task_id: TaskId,
        map_index: i32,
        params: ParamSet,
    ) -> Self {
        Self {
            workflow_id,
            run_id,
            task_id,
            map_index,
            params,
            output: Vec::new(),
        }
    }

    /// Record a line of task output. Lines are captured here and
    /// relayed by the caller after redaction.
    pub fn print(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }
}

/// Opaque failure raised by a task body
#[derive(Clone, Debug, thiserror::Error)]
#[error("{message}")]
pub struct TaskFailure {
    pub message: String,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A task body. Implementations carry the actual work a task performs.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskFailure>;
}

/// Shared handle to a task body.
///
/// Handles are excluded from serialization. A handle decoded from the
/// canonical form is unbound and fails if executed; see
/// [`crate::TaskInstanceRecord::refresh_from_task`] for re-binding.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<dyn TaskHandler>,
    bound: bool,
}

impl TaskHandle {
    pub fn new(handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            inner: handler,
            bound: true,
        }
    }

    /// Handle standing in for a body that did not survive serialization
    pub fn unbound() -> Self {
        Self {
            inner: Arc::new(UnboundTaskBody),
            bound: false,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskFailure> {
        self.inner.execute(ctx).await
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("bound", &self.bound)
            .finish()
    }
}

struct UnboundTaskBody;

#[async_trait]
impl TaskHandler for UnboundTaskBody {
    async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskFailure> {
        Err(TaskFailure::new(
            "task body is not bound to this definition",
        ))
    }
}

// ── Task Definition ──────────────────────────────────────────────────

/// Declared task within a workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_id: TaskId,
    /// Owning workflow, assigned when the task is added to a definition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    /// Pool the task runs in
    pub pool: String,
    /// Whether the task fans out into mapped instances at runtime
    pub fan_out: bool,
    /// Declared parameters with defaults
    #[serde(default, skip_serializing_if = "ParamSet::is_empty")]
    pub params: ParamSet,
    /// The task body; not serialized
    #[serde(skip, default = "TaskHandle::unbound")]
    pub handler: TaskHandle,
}

impl TaskDefinition {
    /// Create a task with the given body
    pub fn new(task_id: impl Into<String>, handler: impl TaskHandler + 'static) -> Self {
        Self {
            task_id: TaskId::new(task_id),
            workflow_id: None,
            pool: DEFAULT_POOL.to_string(),
            fan_out: false,
            params: ParamSet::new(),
            handler: TaskHandle::new(Arc::new(handler)),
        }
    }

    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = pool.into();
        self
    }

    pub fn with_fan_out(mut self) -> Self {
        self.fan_out = true;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, param: Param) -> Self {
        self.params.insert(name, param);
        self
    }

    /// Whether this task has been attached to a workflow definition
    pub fn is_assigned(&self) -> bool {
        self.workflow_id.is_some()
    }
}
