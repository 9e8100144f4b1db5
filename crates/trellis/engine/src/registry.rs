//! In-process registry of workflow definitions

use std::collections::HashMap;

use trellis_types::{WorkflowDefinition, WorkflowError, WorkflowId, WorkflowResult};

/// Holds the workflow definitions known to this process.
///
/// Definitions are registered read-only per invocation; the command
/// facade looks them up by id before resolving runs against them.
#[derive(Clone, Debug, Default)]
pub struct WorkflowRegistry {
    definitions: HashMap<WorkflowId, WorkflowDefinition>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition after validating it
    pub fn register(&mut self, definition: WorkflowDefinition) -> WorkflowResult<WorkflowId> {
        definition.validate()?;
        let id = definition.id.clone();
        if self.definitions.contains_key(&id) {
            return Err(WorkflowError::InvalidArgument(format!(
                "workflow '{id}' is already registered"
            )));
        }
        tracing::info!(
            workflow_id = %id,
            task_count = definition.task_count(),
            "Workflow definition registered"
        );
        self.definitions.insert(id.clone(), definition);
        Ok(id)
    }

    /// Get a definition by id
    pub fn get(&self, id: &WorkflowId) -> WorkflowResult<&WorkflowDefinition> {
        self.definitions.get(id).ok_or_else(|| {
            WorkflowError::InvalidArgument(format!("unknown workflow '{id}'"))
        })
    }

    pub fn contains(&self, id: &WorkflowId) -> bool {
        self.definitions.contains_key(id)
    }

    /// All definitions, ordered by id
    pub fn list(&self) -> Vec<&WorkflowDefinition> {
        let mut definitions: Vec<_> = self.definitions.values().collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        definitions
    }

    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    /// Remove a definition, returning it if present
    pub fn remove(&mut self, id: &WorkflowId) -> Option<WorkflowDefinition> {
        self.definitions.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trellis_types::{TaskContext, TaskDefinition, TaskFailure, TaskHandler};

    struct NoopBody;

    #[async_trait]
    impl TaskHandler for NoopBody {
        async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskFailure> {
            Ok(())
        }
    }

    fn make_definition(id: &str) -> WorkflowDefinition {
        let mut workflow = WorkflowDefinition::new(id, format!("Workflow {id}"));
        workflow
            .add_task(TaskDefinition::new("extract", NoopBody))
            .unwrap();
        workflow
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = WorkflowRegistry::new();
        let id = registry.register(make_definition("billing")).unwrap();

        assert!(registry.contains(&id));
        assert_eq!(registry.get(&id).unwrap().name, "Workflow billing");
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = WorkflowRegistry::new();
        registry.register(make_definition("billing")).unwrap();

        let result = registry.register(make_definition("billing"));
        assert!(matches!(result, Err(WorkflowError::InvalidArgument(_))));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_get_unknown_workflow() {
        let registry = WorkflowRegistry::new();
        let result = registry.get(&WorkflowId::new("missing"));
        assert!(matches!(result, Err(WorkflowError::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let mut registry = WorkflowRegistry::new();
        let invalid = WorkflowDefinition::new("", "Unnamed");
        assert!(registry.register(invalid).is_err());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_list_is_ordered_by_id() {
        let mut registry = WorkflowRegistry::new();
        registry.register(make_definition("zeta")).unwrap();
        registry.register(make_definition("alpha")).unwrap();

        let ids: Vec<_> = registry.list().iter().map(|w| w.id.clone()).collect();
        assert_eq!(ids, vec![WorkflowId::new("alpha"), WorkflowId::new("zeta")]);
    }

    #[test]
    fn test_remove() {
        let mut registry = WorkflowRegistry::new();
        let id = registry.register(make_definition("billing")).unwrap();

        assert!(registry.remove(&id).is_some());
        assert!(!registry.contains(&id));
        assert!(registry.remove(&id).is_none());
    }
}
