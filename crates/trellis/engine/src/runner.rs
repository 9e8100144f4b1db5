//! Drives a bound task instance through its body once

use trellis_store::PlatformStore;
use trellis_types::{
    ParamSet, TaskContext, TaskFailure, TaskInstanceRecord, TaskInstanceState, WorkflowError,
};

use crate::error::EngineResult;

/// What one execution attempt produced
#[derive(Debug)]
pub struct RunOutcome {
    /// Final instance state, `Success` or `Failed`
    pub state: TaskInstanceState,
    /// The task's failure, when it failed
    pub failure: Option<TaskFailure>,
    /// Raw output lines captured from the task body, unmasked
    pub output: Vec<String>,
}

/// Execute the instance's bound task body and record the state
/// transitions, persisting them when the instance lives in the store.
///
/// A task failure is not an error here; it is part of the outcome so the
/// caller can finish post-mortem and cleanup work before surfacing it.
pub async fn run_task_instance(
    store: &dyn PlatformStore,
    instance: &mut TaskInstanceRecord,
    params: &ParamSet,
    stored: bool,
) -> EngineResult<RunOutcome> {
    let task = instance.task.clone().ok_or_else(|| {
        WorkflowError::RuntimeFault(format!(
            "task instance '{}' has no bound task definition",
            instance.task_id
        ))
    })?;
    if !task.handler.is_bound() {
        return Err(WorkflowError::RuntimeFault(format!(
            "task '{}' has no executable body",
            task.task_id
        ))
        .into());
    }

    instance.set_state(TaskInstanceState::Running);
    if stored {
        store
            .update_task_instance_state(
                &instance.workflow_id,
                &instance.run_id,
                &instance.task_id,
                instance.map_index,
                TaskInstanceState::Running,
            )
            .await?;
    }

    let mut ctx = TaskContext::new(
        instance.workflow_id.clone(),
        instance.run_id.clone(),
        instance.task_id.clone(),
        instance.map_index,
        params.clone(),
    );
    let result = task.handler.execute(&mut ctx).await;

    let state = if result.is_ok() {
        TaskInstanceState::Success
    } else {
        TaskInstanceState::Failed
    };
    instance.set_state(state);
    if stored {
        store
            .update_task_instance_state(
                &instance.workflow_id,
                &instance.run_id,
                &instance.task_id,
                instance.map_index,
                state,
            )
            .await?;
    }
    tracing::info!(
        run_id = %instance.run_id,
        task_id = %instance.task_id,
        state = ?state,
        "Task body finished"
    );

    Ok(RunOutcome {
        state,
        failure: result.err(),
        output: ctx.take_output(),
    })
}
