//! Task-instance binding: find or create the record for one (run, task,
//! map index) and re-bind it to the concrete task definition.

use std::sync::Arc;

use trellis_store::PlatformStore;
use trellis_types::{
    TaskDefinition, TaskInstanceRecord, TriggerChannel, WorkflowDefinition, WorkflowError,
    WorkflowInfo,
};

use crate::error::EngineResult;
use crate::resolver::{CreationMode, ResolvedRun, RunResolver};

/// Outcome of instance binding
#[derive(Clone, Debug)]
pub struct BoundInstance {
    /// The bound instance, carrying the live task definition
    pub instance: TaskInstanceRecord,
    /// Whether run resolution created the run
    pub run_created: bool,
    /// Whether the run and instance exist in the store
    pub stored: bool,
}

/// Finds or creates task-instance records against resolved runs
pub struct InstanceBinder {
    store: Arc<dyn PlatformStore>,
    resolver: RunResolver,
}

impl InstanceBinder {
    pub fn new(store: Arc<dyn PlatformStore>) -> Self {
        Self {
            resolver: RunResolver::new(store.clone()),
            store,
        }
    }

    /// Resolve the run for `identifier`, then find or create the task
    /// instance for (run, task, map index).
    ///
    /// The returned instance always carries the supplied `task` as its
    /// live definition, even when the record came back from the store.
    #[allow(clippy::too_many_arguments)]
    pub async fn bind(
        &self,
        workflow: &WorkflowDefinition,
        task: &TaskDefinition,
        map_index: i32,
        identifier: Option<&str>,
        mode: CreationMode,
        pool_override: Option<&str>,
        channel: TriggerChannel,
    ) -> EngineResult<BoundInstance> {
        self.check_task(workflow, task, map_index)?;
        let resolved = self
            .resolver
            .resolve_or_create(workflow, identifier, mode, channel)
            .await?;
        self.find_or_create_instance(workflow, task, map_index, &resolved, mode, pool_override)
            .await
    }

    /// Find or create the task instance against a run the caller already
    /// resolved.
    ///
    /// Resolution stays under the caller's control: a caller that creates
    /// a run it must later delete records the run id before binding.
    pub async fn bind_to_run(
        &self,
        workflow: &WorkflowDefinition,
        task: &TaskDefinition,
        map_index: i32,
        resolved: &ResolvedRun,
        mode: CreationMode,
        pool_override: Option<&str>,
    ) -> EngineResult<BoundInstance> {
        self.check_task(workflow, task, map_index)?;
        self.find_or_create_instance(workflow, task, map_index, resolved, mode, pool_override)
            .await
    }

    fn check_task(
        &self,
        workflow: &WorkflowDefinition,
        task: &TaskDefinition,
        map_index: i32,
    ) -> EngineResult<()> {
        match &task.workflow_id {
            None => {
                return Err(WorkflowError::InvalidArgument(format!(
                    "task '{}' is not assigned to a workflow",
                    task.task_id
                ))
                .into());
            }
            Some(owner) if *owner != workflow.id => {
                return Err(WorkflowError::InvalidArgument(format!(
                    "task '{}' belongs to workflow '{owner}', not '{}'",
                    task.task_id, workflow.id
                ))
                .into());
            }
            Some(_) => {}
        }
        // Two workflows can share a task name; membership in this
        // workflow's task mapping is the real check.
        if !workflow.has_task(&task.task_id) {
            return Err(WorkflowError::InvalidArgument(format!(
                "task '{}' is not in workflow '{}'",
                task.task_id, workflow.id
            ))
            .into());
        }

        if task.fan_out {
            if map_index < 0 {
                return Err(WorkflowError::RuntimeFault(format!(
                    "no map index supplied for fan-out task '{}'",
                    task.task_id
                ))
                .into());
            }
            // TODO: validate map_index against the task's actual fan-out width
        } else if map_index >= 0 {
            return Err(WorkflowError::RuntimeFault(format!(
                "map index {map_index} supplied for non-fan-out task '{}'",
                task.task_id
            ))
            .into());
        }
        Ok(())
    }

    async fn find_or_create_instance(
        &self,
        workflow: &WorkflowDefinition,
        task: &TaskDefinition,
        map_index: i32,
        resolved: &ResolvedRun,
        mode: CreationMode,
        pool_override: Option<&str>,
    ) -> EngineResult<BoundInstance> {
        let run = &resolved.record;

        let existing = self
            .store
            .find_task_instance(&workflow.id, &run.run_id, &task.task_id, map_index)
            .await?;

        let mut instance = match existing {
            Some(instance) => instance,
            None => {
                if mode == CreationMode::Disabled {
                    return Err(WorkflowError::TaskInstanceNotFound {
                        task_id: task.task_id.clone(),
                        run_id: run.run_id.clone(),
                    }
                    .into());
                }
                let version = self
                    .store
                    .latest_workflow_version(&workflow.id)
                    .await?
                    .ok_or_else(|| {
                        WorkflowError::InvalidState(format!(
                            "workflow '{}' has no published version to bind an instance against",
                            workflow.id
                        ))
                    })?;
                let instance = TaskInstanceRecord::new(
                    workflow.id.clone(),
                    run.run_id.clone(),
                    task.task_id.clone(),
                    map_index,
                    version.version_id.clone(),
                );
                // A run the store never saw cannot anchor a stored
                // instance; keep the record in memory alongside it.
                if resolved.stored {
                    self.store.insert_task_instance(instance.clone()).await?;
                }
                tracing::debug!(
                    workflow_id = %workflow.id,
                    run_id = %run.run_id,
                    task_id = %task.task_id,
                    map_index,
                    stored = resolved.stored,
                    "Created task instance"
                );
                instance
            }
        };

        // Always re-bind to the supplied definition: a record fetched from
        // the store carries no live task body.
        instance.refresh_from_task(task, pool_override);

        // Materialize workflow metadata now; the record may outlive the
        // data-access scope that produced it.
        instance.workflow_info = Some(WorkflowInfo {
            workflow_id: workflow.id.clone(),
            name: workflow.name.clone(),
            version_id: instance.version_id.clone(),
        });

        Ok(BoundInstance {
            instance,
            run_created: resolved.created,
            stored: resolved.stored,
        })
    }
}
