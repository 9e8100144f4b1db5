//! Run resolution: find an existing run or create one per policy

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use trellis_store::PlatformStore;
use trellis_types::{
    canonical, DataInterval, RunId, RunRecord, RunState, TriggerChannel, TriggerMeta,
    WorkflowDefinition, WorkflowError,
};

use crate::error::{EngineError, EngineResult};
use crate::identifier;

/// How `resolve_or_create` may materialize a missing run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreationMode {
    /// Never create; a missing run is an error
    Disabled,
    /// Construct the run in memory only, never touching the store
    Memory,
    /// Atomically get-or-create a durable run in the store
    Durable,
}

/// Outcome of run resolution
#[derive(Clone, Debug)]
pub struct ResolvedRun {
    /// The resolved or newly created run
    pub record: RunRecord,
    /// Whether this call created the run
    pub created: bool,
    /// Whether the run exists in the store; memory-mode runs do not
    pub stored: bool,
}

/// Generate a run id for a run that exists only for one invocation.
///
/// The embedded instant carries microsecond precision, so two invocations
/// at least a microsecond apart never collide.
pub fn generate_temporary_run_id() -> String {
    format!(
        "__trellis_temporary_run_{}__",
        Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
    )
}

/// Resolves raw run identifiers against the store, creating runs on demand
pub struct RunResolver {
    store: Arc<dyn PlatformStore>,
}

impl RunResolver {
    pub fn new(store: Arc<dyn PlatformStore>) -> Self {
        Self { store }
    }

    /// Resolve `identifier` to a run, or create one per `mode`.
    ///
    /// An identifier that matches an existing run always wins, regardless
    /// of mode. When creating, an identifier that parsed as an instant
    /// seeds the new run's logical instant and data interval.
    pub async fn resolve_or_create(
        &self,
        workflow: &WorkflowDefinition,
        identifier: Option<&str>,
        mode: CreationMode,
        channel: TriggerChannel,
    ) -> EngineResult<ResolvedRun> {
        let identifier = identifier.filter(|value| !value.is_empty());
        if identifier.is_none() && mode == CreationMode::Disabled {
            return Err(WorkflowError::InvalidArgument(
                "a run id or logical instant is required when run creation is disabled"
                    .to_string(),
            )
            .into());
        }

        let mut logical_instant = None;
        if let Some(value) = identifier {
            let (found, parsed) =
                identifier::find_run_by_identifier(self.store.as_ref(), &workflow.id, value)
                    .await?;
            if let Some(record) = found {
                return Ok(ResolvedRun {
                    record,
                    created: false,
                    stored: true,
                });
            }
            if mode == CreationMode::Disabled {
                return Err(WorkflowError::RunNotFound {
                    workflow_id: workflow.id.clone(),
                    identifier: value.to_string(),
                }
                .into());
            }
            logical_instant = parsed;
        }

        let data_interval =
            logical_instant.and_then(|instant| workflow.timetable.infer_interval(instant));
        let run_after = data_interval
            .map(|interval| interval.end)
            .unwrap_or_else(Utc::now);
        let trigger = TriggerMeta::manual(channel, resolve_os_actor());

        match mode {
            CreationMode::Disabled => Err(EngineError::Workflow(WorkflowError::InvalidArgument(
                "run creation is disabled".to_string(),
            ))),
            CreationMode::Memory => Ok(self.create_in_memory(
                workflow,
                identifier,
                logical_instant,
                data_interval,
                run_after,
                trigger,
            )),
            CreationMode::Durable => {
                self.create_durable(workflow, logical_instant, data_interval, run_after, trigger)
                    .await
            }
        }
    }

    fn create_in_memory(
        &self,
        workflow: &WorkflowDefinition,
        identifier: Option<&str>,
        logical_instant: Option<DateTime<Utc>>,
        data_interval: Option<DataInterval>,
        run_after: DateTime<Utc>,
        trigger: TriggerMeta,
    ) -> ResolvedRun {
        let run_id = identifier
            .map(RunId::new)
            .unwrap_or_else(|| RunId::new(generate_temporary_run_id()));
        let record = RunRecord::new(
            workflow.id.clone(),
            run_id,
            trigger,
            logical_instant,
            data_interval,
            run_after,
        )
        .with_state(RunState::Running);
        tracing::debug!(
            workflow_id = %workflow.id,
            run_id = %record.run_id,
            "Constructed in-memory run"
        );
        ResolvedRun {
            record,
            created: true,
            stored: false,
        }
    }

    async fn create_durable(
        &self,
        workflow: &WorkflowDefinition,
        logical_instant: Option<DateTime<Utc>>,
        data_interval: Option<DataInterval>,
        run_after: DateTime<Utc>,
        trigger: TriggerMeta,
    ) -> EngineResult<ResolvedRun> {
        // Round-trip the definition through its canonical form first, so
        // creation fails loudly if the in-process definition has drifted
        // from what the store understands.
        let round_tripped = canonical::round_trip(workflow)?;

        let run_id = RunId::new(generate_temporary_run_id());
        let record = self
            .store
            .get_or_create_run(
                &round_tripped.id,
                &run_id,
                logical_instant,
                data_interval,
                run_after,
                trigger,
            )
            .await?;
        tracing::info!(
            workflow_id = %workflow.id,
            run_id = %record.run_id,
            "Created transient durable run"
        );
        Ok(ResolvedRun {
            record,
            created: true,
            stored: true,
        })
    }
}

/// Resolve the operating-system user for trigger attribution.
///
/// Resolution failure is never fatal; the run is simply recorded without
/// a triggering actor.
fn resolve_os_actor() -> Option<String> {
    for key in ["USER", "LOGNAME", "USERNAME"] {
        if let Ok(name) = std::env::var(key) {
            if !name.is_empty() {
                return Some(name);
            }
        }
    }
    tracing::warn!("Failed to resolve an OS user name, leaving the triggering actor unset");
    None
}
