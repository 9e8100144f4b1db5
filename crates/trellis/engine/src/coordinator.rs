//! One-shot ephemeral execution of a single task instance
//!
//! The coordinator resolves a run (creating a transient durable one if
//! needed), binds the task instance, executes the body with masked
//! output, optionally drops into a post-mortem debugger, and deletes the
//! transient run afterwards. Cleanup runs whether execution succeeded,
//! failed, or never started past binding.

use std::sync::Arc;

use trellis_store::PlatformStore;
use trellis_types::{
    RunId, TaskId, TaskInstanceState, TriggerChannel, WorkflowDefinition, WorkflowError,
    WorkflowId, NOT_MAPPED,
};

use crate::binder::{BoundInstance, InstanceBinder};
use crate::context::HarnessContext;
use crate::error::{EngineError, EngineResult};
use crate::resolver::{CreationMode, RunResolver};
use crate::runner;

/// Caller-supplied knobs for one test execution
#[derive(Clone, Debug)]
pub struct TestRunOptions {
    /// Run id or logical instant; `None` always creates a transient run
    pub identifier: Option<String>,
    /// Map index for fan-out tasks; leave as `NOT_MAPPED` otherwise
    pub map_index: i32,
    /// Pool to record on the instance instead of the task's own
    pub pool_override: Option<String>,
    /// Extra environment variables applied alongside the test-mode marker
    pub env_overrides: std::collections::BTreeMap<String, String>,
    /// Parameter values merged over the task's declared parameters
    pub param_overrides: std::collections::BTreeMap<String, serde_json::Value>,
    /// Drop into a debugger when the task ends up `Failed`
    pub post_mortem: bool,
}

impl Default for TestRunOptions {
    fn default() -> Self {
        Self {
            identifier: None,
            map_index: NOT_MAPPED,
            pool_override: None,
            env_overrides: std::collections::BTreeMap::new(),
            param_overrides: std::collections::BTreeMap::new(),
            post_mortem: false,
        }
    }
}

/// Summary of a completed test execution
#[derive(Clone, Debug)]
pub struct TestRunReport {
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub task_id: TaskId,
    pub map_index: i32,
    /// Final instance state
    pub state: Option<TaskInstanceState>,
    /// Masked output lines, in print order
    pub output: Vec<String>,
    /// Whether a transient run was created (and deleted again) for this
    /// execution
    pub run_created: bool,
}

/// Orchestrates ephemeral test executions
pub struct TestRunCoordinator {
    store: Arc<dyn PlatformStore>,
    resolver: RunResolver,
    binder: InstanceBinder,
}

impl TestRunCoordinator {
    pub fn new(store: Arc<dyn PlatformStore>) -> Self {
        Self {
            resolver: RunResolver::new(store.clone()),
            binder: InstanceBinder::new(store.clone()),
            store,
        }
    }

    /// Execute `task_id` once against a transient (or caller-named) run.
    ///
    /// A failing task body surfaces as [`EngineError::Task`] after
    /// cleanup has run; the transient run never outlives this call.
    pub async fn test_execute(
        &self,
        ctx: &mut HarnessContext,
        workflow: &WorkflowDefinition,
        task_id: &TaskId,
        options: TestRunOptions,
    ) -> EngineResult<TestRunReport> {
        // Process-level toggles come first so even resolution failures
        // run with masking and propagation in place.
        ctx.enable_secret_masking();
        let relay_flipped = ctx.begin_log_relay();
        ctx.apply_env(&options.env_overrides);

        let mut transient: Option<RunId> = None;
        let result = self
            .execute_inner(ctx, workflow, task_id, &options, &mut transient)
            .await;

        ctx.end_log_relay(relay_flipped);
        if let Some(run_id) = transient {
            // Deletion uses its own store call, decoupled from the scope
            // used during resolution, so an execution failure cannot
            // block cleanup.
            match self.store.delete_run(&workflow.id, &run_id).await {
                Ok(()) => {
                    tracing::info!(run_id = %run_id, "Deleted transient run");
                }
                Err(error) => {
                    tracing::warn!(
                        run_id = %run_id,
                        error = %error,
                        "Failed to delete transient run"
                    );
                }
            }
        }

        result
    }

    async fn execute_inner(
        &self,
        ctx: &mut HarnessContext,
        workflow: &WorkflowDefinition,
        task_id: &TaskId,
        options: &TestRunOptions,
        transient: &mut Option<RunId>,
    ) -> EngineResult<TestRunReport> {
        let task = workflow.task(task_id).ok_or_else(|| {
            WorkflowError::InvalidArgument(format!(
                "workflow '{}' has no task '{task_id}'",
                workflow.id
            ))
        })?;

        // Overrides merge onto a copy; the definition itself stays
        // pristine across executions.
        let mut params = task.params.clone();
        params.merge(options.param_overrides.clone());
        params.validate()?;

        // Resolve first and record any created run immediately: cleanup
        // must see it even when binding itself fails.
        let resolved = self
            .resolver
            .resolve_or_create(
                workflow,
                options.identifier.as_deref(),
                CreationMode::Durable,
                TriggerChannel::Cli,
            )
            .await?;
        if resolved.created {
            *transient = Some(resolved.record.run_id.clone());
        }

        let BoundInstance {
            mut instance,
            run_created,
            stored,
        } = self
            .binder
            .bind_to_run(
                workflow,
                task,
                options.map_index,
                &resolved,
                CreationMode::Durable,
                options.pool_override.as_deref(),
            )
            .await?;

        let outcome =
            runner::run_task_instance(self.store.as_ref(), &mut instance, &params, stored).await?;
        let mut output = Vec::with_capacity(outcome.output.len());
        for line in &outcome.output {
            output.push(ctx.relay(line));
        }

        if outcome.state == TaskInstanceState::Failed && options.post_mortem {
            let debugger = ctx.debuggers().resolve()?;
            tracing::info!(
                debugger = debugger.name(),
                task_id = %instance.task_id,
                "Entering post-mortem debugger"
            );
            debugger.enter()?;
        }

        if let Some(failure) = outcome.failure {
            return Err(EngineError::Task(failure));
        }

        Ok(TestRunReport {
            workflow_id: instance.workflow_id.clone(),
            run_id: instance.run_id.clone(),
            task_id: instance.task_id.clone(),
            map_index: instance.map_index,
            state: instance.state,
            output,
            run_created,
        })
    }
}
