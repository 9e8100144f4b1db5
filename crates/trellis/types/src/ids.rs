//! Identifier newtypes shared across the trellis crates.

use serde::{Deserialize, Serialize};

// ── Workflow Identifier ──────────────────────────────────────────────

/// Unique identifier for a workflow definition
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Task Identifier ──────────────────────────────────────────────────

/// Unique identifier for a task within a workflow
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Run Identifier ───────────────────────────────────────────────────

/// Unique identifier for a run within a workflow
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow Version Identifier ──────────────────────────────────────

/// Unique identifier for a published workflow version
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowVersionId(pub String);

impl WorkflowVersionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Short display form (first 8 chars)
    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl std::fmt::Display for WorkflowVersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", WorkflowId::new("etl")), "etl");
        assert_eq!(format!("{}", TaskId::new("extract")), "extract");
        assert_eq!(format!("{}", RunId::new("manual__2024")), "manual__2024");
    }

    #[test]
    fn test_version_id_generate() {
        let id = WorkflowVersionId::generate();
        assert!(!id.0.is_empty());
        assert!(id.short().len() <= 8);
        assert_ne!(id, WorkflowVersionId::generate());
    }

    #[test]
    fn test_version_id_short_with_multibyte_chars() {
        let id = WorkflowVersionId::new("版本編號測試版本九十");
        assert_eq!(id.short(), "版本編號測試版本");
        assert_eq!(WorkflowVersionId::new("v1").short(), "v1");
    }
}
