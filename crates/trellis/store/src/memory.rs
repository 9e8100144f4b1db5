//! In-memory reference implementation of the trellis store traits.
//!
//! This adapter is deterministic and test-friendly. Production
//! deployments should use a transactional backend for source-of-truth
//! data.

use crate::traits::{RunSelector, RunStore, TaskInstanceStore, WorkflowVersionStore};
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use trellis_types::{
    DataInterval, RunId, RunRecord, TaskId, TaskInstanceRecord, TaskInstanceState, TriggerMeta,
    WorkflowId, WorkflowVersionRecord,
};

type RunKey = (WorkflowId, RunId);
type InstanceKey = (WorkflowId, RunId, TaskId, i32);

/// In-memory trellis store adapter.
#[derive(Default)]
pub struct InMemoryStore {
    runs: RwLock<HashMap<RunKey, RunRecord>>,
    instances: RwLock<HashMap<InstanceKey, TaskInstanceRecord>>,
    versions: RwLock<HashMap<WorkflowId, Vec<WorkflowVersionRecord>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs currently held, across all workflows.
    pub fn run_count(&self) -> usize {
        self.runs.read().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Number of task instances currently held, across all workflows.
    pub fn instance_count(&self) -> usize {
        self.instances.read().map(|guard| guard.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn find_run(
        &self,
        workflow_id: &WorkflowId,
        selector: &RunSelector,
    ) -> StoreResult<Option<RunRecord>> {
        let guard = self
            .runs
            .read()
            .map_err(|_| StoreError::Backend("runs lock poisoned".to_string()))?;
        match selector {
            RunSelector::ById(run_id) => {
                Ok(guard.get(&(workflow_id.clone(), run_id.clone())).cloned())
            }
            RunSelector::ByLogicalInstant(instant) => Ok(guard
                .values()
                .find(|run| {
                    run.workflow_id == *workflow_id && run.logical_instant == Some(*instant)
                })
                .cloned()),
        }
    }

    async fn get_or_create_run(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        logical_instant: Option<DateTime<Utc>>,
        data_interval: Option<DataInterval>,
        run_after: DateTime<Utc>,
        trigger: TriggerMeta,
    ) -> StoreResult<RunRecord> {
        // Single write-lock critical section: concurrent callers with the
        // same run id serialize here, one creating and the rest observing.
        let mut guard = self
            .runs
            .write()
            .map_err(|_| StoreError::Backend("runs lock poisoned".to_string()))?;

        let key = (workflow_id.clone(), run_id.clone());
        if let Some(existing) = guard.get(&key) {
            return Ok(existing.clone());
        }

        let record = RunRecord::new(
            workflow_id.clone(),
            run_id.clone(),
            trigger,
            logical_instant,
            data_interval,
            run_after,
        );
        guard.insert(key, record.clone());
        Ok(record)
    }

    async fn delete_run(&self, workflow_id: &WorkflowId, run_id: &RunId) -> StoreResult<()> {
        {
            let mut guard = self
                .runs
                .write()
                .map_err(|_| StoreError::Backend("runs lock poisoned".to_string()))?;
            guard
                .remove(&(workflow_id.clone(), run_id.clone()))
                .ok_or_else(|| {
                    StoreError::NotFound(format!(
                        "run '{}' not found for workflow '{}'",
                        run_id, workflow_id
                    ))
                })?;
        }

        let mut guard = self
            .instances
            .write()
            .map_err(|_| StoreError::Backend("instances lock poisoned".to_string()))?;
        guard.retain(|key, _| !(key.0 == *workflow_id && key.1 == *run_id));
        Ok(())
    }
}

#[async_trait]
impl TaskInstanceStore for InMemoryStore {
    async fn find_task_instance(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        task_id: &TaskId,
        map_index: i32,
    ) -> StoreResult<Option<TaskInstanceRecord>> {
        let guard = self
            .instances
            .read()
            .map_err(|_| StoreError::Backend("instances lock poisoned".to_string()))?;
        Ok(guard
            .get(&(
                workflow_id.clone(),
                run_id.clone(),
                task_id.clone(),
                map_index,
            ))
            .cloned())
    }

    async fn insert_task_instance(&self, instance: TaskInstanceRecord) -> StoreResult<()> {
        let mut guard = self
            .instances
            .write()
            .map_err(|_| StoreError::Backend("instances lock poisoned".to_string()))?;

        let key = (
            instance.workflow_id.clone(),
            instance.run_id.clone(),
            instance.task_id.clone(),
            instance.map_index,
        );
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "task instance '{}' (map index {}) already exists in run '{}'",
                instance.task_id, instance.map_index, instance.run_id
            )));
        }

        // The bound task is resolution-time state; a record at rest never
        // carries it.
        let mut stored = instance;
        stored.task = None;
        guard.insert(key, stored);
        Ok(())
    }

    async fn update_task_instance_state(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
        task_id: &TaskId,
        map_index: i32,
        state: TaskInstanceState,
    ) -> StoreResult<()> {
        let mut guard = self
            .instances
            .write()
            .map_err(|_| StoreError::Backend("instances lock poisoned".to_string()))?;
        let record = guard
            .get_mut(&(
                workflow_id.clone(),
                run_id.clone(),
                task_id.clone(),
                map_index,
            ))
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "task instance '{}' (map index {}) not found in run '{}'",
                    task_id, map_index, run_id
                ))
            })?;
        record.set_state(state);
        Ok(())
    }

    async fn list_task_instances(
        &self,
        workflow_id: &WorkflowId,
        run_id: &RunId,
    ) -> StoreResult<Vec<TaskInstanceRecord>> {
        let guard = self
            .instances
            .read()
            .map_err(|_| StoreError::Backend("instances lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|item| item.workflow_id == *workflow_id && item.run_id == *run_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| {
            a.task_id
                .cmp(&b.task_id)
                .then(a.map_index.cmp(&b.map_index))
        });
        Ok(values)
    }
}

#[async_trait]
impl WorkflowVersionStore for InMemoryStore {
    async fn publish_workflow_version(
        &self,
        workflow_id: &WorkflowId,
        version_number: u32,
        canonical: &str,
    ) -> StoreResult<WorkflowVersionRecord> {
        let mut guard = self
            .versions
            .write()
            .map_err(|_| StoreError::Backend("versions lock poisoned".to_string()))?;

        let entries = guard.entry(workflow_id.clone()).or_default();
        if let Some(last) = entries.last() {
            if last.version_number >= version_number {
                return Err(StoreError::Conflict(format!(
                    "workflow '{}' already has version {}, cannot publish {}",
                    workflow_id, last.version_number, version_number
                )));
            }
        }

        let record = WorkflowVersionRecord::new(workflow_id.clone(), version_number, canonical);
        entries.push(record.clone());
        Ok(record)
    }

    async fn latest_workflow_version(
        &self,
        workflow_id: &WorkflowId,
    ) -> StoreResult<Option<WorkflowVersionRecord>> {
        let guard = self
            .versions
            .read()
            .map_err(|_| StoreError::Backend("versions lock poisoned".to_string()))?;
        Ok(guard
            .get(workflow_id)
            .and_then(|entries| entries.last())
            .cloned())
    }
}
