//! Command-level entry points
//!
//! Thin facade the CLI layer calls with plain values: a workflow id, a
//! task id, a raw identifier string, flags. Each function looks the
//! definition up in the registry, delegates to the matching component,
//! and returns either a result value or a typed failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use trellis_store::PlatformStore;
use trellis_types::{
    canonical, RunRecord, TaskId, TaskInstanceRecord, TaskInstanceState, TriggerChannel,
    WorkflowDefinition, WorkflowError, WorkflowId, WorkflowVersionRecord,
};

use crate::binder::InstanceBinder;
use crate::context::HarnessContext;
use crate::coordinator::{TestRunCoordinator, TestRunOptions, TestRunReport};
use crate::error::EngineResult;
use crate::identifier;
use crate::registry::WorkflowRegistry;
use crate::resolver::{CreationMode, RunResolver};

/// Resolve `identifier` to a run for `workflow_id`, creating one per
/// `mode` and attributing it to `channel`. Returns the run and whether
/// it was created.
pub async fn resolve_run(
    store: Arc<dyn PlatformStore>,
    registry: &WorkflowRegistry,
    workflow_id: &WorkflowId,
    identifier: Option<&str>,
    mode: CreationMode,
    channel: TriggerChannel,
) -> EngineResult<(RunRecord, bool)> {
    let workflow = registry.get(workflow_id)?;
    let resolver = RunResolver::new(store);
    let resolved = resolver
        .resolve_or_create(workflow, identifier, mode, channel)
        .await?;
    Ok((resolved.record, resolved.created))
}

/// Find or create the task instance for (run, task, map index).
/// Returns the bound instance and whether run resolution created the run.
#[allow(clippy::too_many_arguments)]
pub async fn bind_instance(
    store: Arc<dyn PlatformStore>,
    registry: &WorkflowRegistry,
    workflow_id: &WorkflowId,
    task_id: &TaskId,
    map_index: i32,
    identifier: Option<&str>,
    mode: CreationMode,
    pool_override: Option<&str>,
) -> EngineResult<(TaskInstanceRecord, bool)> {
    let workflow = registry.get(workflow_id)?;
    let task = workflow.task(task_id).ok_or_else(|| {
        WorkflowError::InvalidArgument(format!(
            "workflow '{workflow_id}' has no task '{task_id}'"
        ))
    })?;
    let binder = InstanceBinder::new(store);
    let bound = binder
        .bind(
            workflow,
            task,
            map_index,
            identifier,
            mode,
            pool_override,
            TriggerChannel::Cli,
        )
        .await?;
    Ok((bound.instance, bound.run_created))
}

/// Execute one task against a transient run and clean up afterwards
pub async fn test_execute(
    ctx: &mut HarnessContext,
    store: Arc<dyn PlatformStore>,
    registry: &WorkflowRegistry,
    workflow_id: &WorkflowId,
    task_id: &TaskId,
    options: TestRunOptions,
) -> EngineResult<TestRunReport> {
    let workflow = registry.get(workflow_id)?;
    let coordinator = TestRunCoordinator::new(store);
    coordinator.test_execute(ctx, workflow, task_id, options).await
}

/// State of one existing task instance, without creating anything
pub async fn instance_state(
    store: Arc<dyn PlatformStore>,
    registry: &WorkflowRegistry,
    workflow_id: &WorkflowId,
    task_id: &TaskId,
    map_index: i32,
    identifier: &str,
) -> EngineResult<Option<TaskInstanceState>> {
    let (instance, _) = bind_instance(
        store,
        registry,
        workflow_id,
        task_id,
        map_index,
        Some(identifier),
        CreationMode::Disabled,
        None,
    )
    .await?;
    Ok(instance.state)
}

/// Per-instance state summary for one run
#[derive(Clone, Debug, Serialize)]
pub struct InstanceStateSummary {
    pub workflow_id: WorkflowId,
    pub task_id: TaskId,
    pub logical_instant: Option<DateTime<Utc>>,
    pub state: Option<TaskInstanceState>,
    /// Present only when the run contains mapped instances and this
    /// instance is one of them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_index: Option<i32>,
}

/// Summaries for every task instance in the run `identifier` names.
///
/// Fails with `RunNotFound` when nothing matches; an existing run with no
/// instances yields an empty list.
pub async fn instance_summaries_for_run(
    store: Arc<dyn PlatformStore>,
    workflow_id: &WorkflowId,
    identifier: &str,
) -> EngineResult<Vec<InstanceStateSummary>> {
    let (found, _) =
        identifier::find_run_by_identifier(store.as_ref(), workflow_id, identifier).await?;
    let run = found.ok_or_else(|| WorkflowError::RunNotFound {
        workflow_id: workflow_id.clone(),
        identifier: identifier.to_string(),
    })?;

    let instances = store.list_task_instances(workflow_id, &run.run_id).await?;
    let has_mapped = instances.iter().any(|instance| instance.is_mapped());
    let summaries = instances
        .into_iter()
        .map(|instance| {
            let mapped = instance.is_mapped();
            InstanceStateSummary {
                workflow_id: instance.workflow_id,
                task_id: instance.task_id,
                logical_instant: run.logical_instant,
                state: instance.state,
                map_index: if has_mapped && mapped {
                    Some(instance.map_index)
                } else {
                    None
                },
            }
        })
        .collect();
    Ok(summaries)
}

/// Publish the workflow's canonical form as a new stored version
pub async fn publish_workflow(
    store: Arc<dyn PlatformStore>,
    workflow: &WorkflowDefinition,
) -> EngineResult<WorkflowVersionRecord> {
    workflow.validate()?;
    let encoded = canonical::encode_workflow(workflow)?;
    let version = store
        .publish_workflow_version(&workflow.id, workflow.version, &encoded)
        .await?;
    tracing::info!(
        workflow_id = %workflow.id,
        version = version.version_number,
        "Workflow version published"
    );
    Ok(version)
}

/// Sorted task ids of a registered workflow
pub fn list_tasks(
    registry: &WorkflowRegistry,
    workflow_id: &WorkflowId,
) -> EngineResult<Vec<TaskId>> {
    let workflow = registry.get(workflow_id)?;
    Ok(workflow.task_ids())
}
