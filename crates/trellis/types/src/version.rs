//! Published workflow versions.

use crate::{WorkflowId, WorkflowVersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published, canonically serialized workflow version
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowVersionRecord {
    pub workflow_id: WorkflowId,
    pub version_id: WorkflowVersionId,
    /// Monotonically increasing per workflow
    pub version_number: u32,
    /// Canonical document for this version
    pub canonical: String,
    pub created_at: DateTime<Utc>,
}

impl WorkflowVersionRecord {
    pub fn new(
        workflow_id: WorkflowId,
        version_number: u32,
        canonical: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id,
            version_id: WorkflowVersionId::generate(),
            version_number,
            canonical: canonical.into(),
            created_at: Utc::now(),
        }
    }
}
