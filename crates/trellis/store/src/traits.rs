use crate::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trellis_types::{
    DataInterval, RunId, RunRecord, TaskId, TaskInstanceRecord, TaskInstanceState, TriggerMeta,
    WorkflowId, WorkflowVersionRecord,
};

/// Selector for locating an existing run.
#[derive(Clone, Debug, PartialEq)]
pub enum RunSelector {
    /// Match the run identifier exactly
    ById(RunId),
    /// Match the logical instant the run is anchored at
    ByLogicalInstant(DateTime<Utc>),
}

/// Store interface for run records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Find one run matching the selector.
    async fn find_run(
        &self,
        workflow_id: &WorkflowId,
        selector: &RunSelector,
    ) -> StoreResult<Option<RunRecord>>;

    /// Atomically fetch or create a run.
    ///
    /// If a run with `run_id` already exists it is returned unchanged,
    /// so repeated calls with the same identifier are idempotent.
    async fn get_or_create_run(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        logical_instant: Option<DateTime<Utc>>,
        data_interval: Option<DataInterval>,
        run_after: DateTime<Utc>,
        trigger: TriggerMeta,
    ) -> StoreResult<RunRecord>;

    /// Delete a run and every task instance attached to it.
    async fn delete_run(&self, workflow_id: &WorkflowId, run_id: &RunId) -> StoreResult<()>;
}

/// Store interface for task instance records.
#[async_trait]
pub trait TaskInstanceStore: Send + Sync {
    /// Find the instance for one (run, task, map index) slot.
    async fn find_task_instance(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        task_id: &TaskId,
        map_index: i32,
    ) -> StoreResult<Option<TaskInstanceRecord>>;

    /// Insert a new instance record. Duplicates of the
    /// (run, task, map index) key are rejected.
    async fn insert_task_instance(&self, instance: TaskInstanceRecord) -> StoreResult<()>;

    /// Persist a state transition for one instance.
    async fn update_task_instance_state(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        task_id: &TaskId,
        map_index: i32,
        state: TaskInstanceState,
    ) -> StoreResult<()>;

    /// All instances of one run, ordered by task id then map index.
    async fn list_task_instances(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
    ) -> StoreResult<Vec<TaskInstanceRecord>>;
}

/// Store interface for published workflow versions.
#[async_trait]
pub trait WorkflowVersionStore: Send + Sync {
    /// Publish a canonical document as a new version.
    async fn publish_workflow_version(
        &self,
        workflow_id: &WorkflowId,
        version_number: u32,
        canonical: &str,
    ) -> StoreResult<WorkflowVersionRecord>;

    /// Latest published version, if any.
    async fn latest_workflow_version(
        &self,
        workflow_id: &WorkflowId,
    ) -> StoreResult<Option<WorkflowVersionRecord>>;
}

/// Unified store bundle consumed by the engine.
pub trait PlatformStore: RunStore + TaskInstanceStore + WorkflowVersionStore + Send + Sync {}

impl<T> PlatformStore for T where T: RunStore + TaskInstanceStore + WorkflowVersionStore + Send + Sync
{}
