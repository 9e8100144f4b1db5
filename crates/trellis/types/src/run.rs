//! Run records: one execution of a workflow, anchored at an instant.

use crate::{DataInterval, RunId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Trigger Provenance ───────────────────────────────────────────────

/// How a run came to exist
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    #[default]
    Manual,
    Scheduled,
    Backfill,
}

/// Which surface requested the run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerChannel {
    #[default]
    Cli,
    Api,
    Timetable,
}

/// Trigger provenance attached to a run at creation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerMeta {
    pub kind: RunKind,
    pub channel: TriggerChannel,
    /// OS-level actor that requested the run, when resolvable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggering_actor: Option<String>,
}

impl TriggerMeta {
    pub fn new(kind: RunKind, channel: TriggerChannel, triggering_actor: Option<String>) -> Self {
        Self {
            kind,
            channel,
            triggering_actor,
        }
    }

    /// Manual trigger from the given surface
    pub fn manual(channel: TriggerChannel, triggering_actor: Option<String>) -> Self {
        Self::new(RunKind::Manual, channel, triggering_actor)
    }
}

// ── Run State ────────────────────────────────────────────────────────

/// Lifecycle state of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Queued,
    Running,
    Success,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

// ── Run Record ───────────────────────────────────────────────────────

/// One execution of a workflow
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub workflow_id: WorkflowId,
    /// Unique within the workflow
    pub run_id: RunId,
    pub trigger: TriggerMeta,
    /// Logical instant the run is anchored at, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_instant: Option<DateTime<Utc>>,
    /// Data window derived from the workflow timetable; never set
    /// independently of the timetable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_interval: Option<DataInterval>,
    /// Earliest instant the run may execute
    pub run_after: DateTime<Utc>,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(
        workflow_id: WorkflowId,
        run_id: RunId,
        trigger: TriggerMeta,
        logical_instant: Option<DateTime<Utc>>,
        data_interval: Option<DataInterval>,
        run_after: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_id,
            run_id,
            trigger,
            logical_instant,
            data_interval,
            run_after,
            state: RunState::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_state(mut self, state: RunState) -> Self {
        self.state = state;
        self
    }
}
