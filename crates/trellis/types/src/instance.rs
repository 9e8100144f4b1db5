//! Task instance records: one (run, task, map index) execution slot.
//!
//! A record is storage-facing state. The concrete task definition it
//! executes against is re-bound onto the record at resolution time and
//! never serialized with it.

use crate::{RunId, TaskDefinition, TaskId, WorkflowId, WorkflowVersionId, DEFAULT_POOL};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Map index of an instance that is not part of a fan-out expansion
pub const NOT_MAPPED: i32 = -1;

// ── Instance State ───────────────────────────────────────────────────

/// Lifecycle state of a task instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskInstanceState {
    Queued,
    Running,
    Success,
    Failed,
    Skipped,
}

impl TaskInstanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

// ── Owning-Workflow Metadata ─────────────────────────────────────────

/// Owning-workflow metadata materialized onto an instance before it is
/// handed out, so consumers never reach back into the store for it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub workflow_id: WorkflowId,
    pub name: String,
    pub version_id: WorkflowVersionId,
}

// ── Task Instance Record ─────────────────────────────────────────────

/// One execution slot for a task within a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskInstanceRecord {
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub task_id: TaskId,
    /// `NOT_MAPPED` for plain tasks; the fan-out position otherwise
    pub map_index: i32,
    /// None until the instance is first scheduled or run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskInstanceState>,
    pub pool: String,
    /// Workflow version the instance was created against
    pub version_id: WorkflowVersionId,
    /// Filled before the record leaves the binder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_info: Option<WorkflowInfo>,
    /// Concrete task definition bound for execution; never serialized
    #[serde(skip)]
    pub task: Option<TaskDefinition>,
    pub created_at: DateTime<Utc>,
}

impl TaskInstanceRecord {
    /// Create a fresh, unscheduled instance slot
    pub fn new(
        workflow_id: WorkflowId,
        run_id: RunId,
        task_id: TaskId,
        map_index: i32,
        version_id: WorkflowVersionId,
    ) -> Self {
        Self {
            workflow_id,
            run_id,
            task_id,
            map_index,
            state: None,
            pool: DEFAULT_POOL.to_string(),
            version_id,
            workflow_info: None,
            task: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this instance belongs to a fan-out expansion
    pub fn is_mapped(&self) -> bool {
        self.map_index >= 0
    }

    /// Bind the concrete task definition onto this record and re-apply
    /// the pool assignment. Safe to call repeatedly.
    pub fn refresh_from_task(&mut self, task: &TaskDefinition, pool_override: Option<&str>) {
        self.pool = match pool_override {
            Some(pool) => pool.to_string(),
            None => task.pool.clone(),
        };
        self.task = Some(task.clone());
    }

    pub fn set_state(&mut self, state: TaskInstanceState) {
        self.state = Some(state);
    }
}
