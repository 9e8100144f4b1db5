//! Workflow definitions: the static description a run executes against.
//!
//! Definitions are immutable once published. To modify one, publish a
//! new version; the store keeps the canonical document per version.

use crate::{TaskDefinition, TaskId, Timetable, WorkflowError, WorkflowId, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Description of a workflow: identity, schedule shape, and tasks
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    /// Human-readable name
    pub name: String,
    /// Definition version, bumped on re-publication
    pub version: u32,
    pub timetable: Timetable,
    tasks: BTreeMap<TaskId, TaskDefinition>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(id),
            name: name.into(),
            version: 1,
            timetable: Timetable::default(),
            tasks: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_timetable(mut self, timetable: Timetable) -> Self {
        self.timetable = timetable;
        self
    }

    /// Add a task, assigning it to this workflow.
    ///
    /// Duplicate task identifiers are rejected.
    pub fn add_task(&mut self, mut task: TaskDefinition) -> WorkflowResult<()> {
        if self.tasks.contains_key(&task.task_id) {
            return Err(WorkflowError::InvalidArgument(format!(
                "task '{}' already exists in workflow '{}'",
                task.task_id, self.id
            )));
        }
        task.workflow_id = Some(self.id.clone());
        self.tasks.insert(task.task_id.clone(), task);
        Ok(())
    }

    /// Look up a task by identifier
    pub fn task(&self, task_id: &TaskId) -> Option<&TaskDefinition> {
        self.tasks.get(task_id)
    }

    pub fn has_task(&self, task_id: &TaskId) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Task identifiers in lexicographic order
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.keys().cloned().collect()
    }

    /// All tasks, ordered by identifier
    pub fn tasks(&self) -> Vec<&TaskDefinition> {
        self.tasks.values().collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Validate internal consistency
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.id.0.is_empty() {
            return Err(WorkflowError::InvalidArgument(
                "workflow id must not be empty".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(WorkflowError::InvalidArgument(
                "workflow name must not be empty".to_string(),
            ));
        }
        for task in self.tasks.values() {
            if task.workflow_id.as_ref() != Some(&self.id) {
                return Err(WorkflowError::InvalidArgument(format!(
                    "task '{}' is not assigned to workflow '{}'",
                    task.task_id, self.id
                )));
            }
        }
        Ok(())
    }
}
