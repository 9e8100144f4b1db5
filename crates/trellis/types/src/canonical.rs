//! Canonical wire form for workflow definitions.
//!
//! The canonical form is a versioned JSON envelope. It is what gets
//! published to the store and what downstream consumers decode. Task
//! bodies are not part of it; decoded definitions carry unbound handles
//! until refreshed against the concrete objects.

use crate::{WorkflowDefinition, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};

/// Envelope schema version written by this crate
pub const CANONICAL_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema_version: u32,
    workflow: &'a WorkflowDefinition,
}

#[derive(Deserialize)]
struct Envelope {
    schema_version: u32,
    workflow: WorkflowDefinition,
}

/// Encode a definition into its canonical JSON document
pub fn encode_workflow(workflow: &WorkflowDefinition) -> WorkflowResult<String> {
    serde_json::to_string(&EnvelopeRef {
        schema_version: CANONICAL_SCHEMA_VERSION,
        workflow,
    })
    .map_err(|e| WorkflowError::Serialization(e.to_string()))
}

/// Decode a canonical JSON document back into a definition
pub fn decode_workflow(document: &str) -> WorkflowResult<WorkflowDefinition> {
    let envelope: Envelope =
        serde_json::from_str(document).map_err(|e| WorkflowError::Serialization(e.to_string()))?;
    if envelope.schema_version != CANONICAL_SCHEMA_VERSION {
        return Err(WorkflowError::Serialization(format!(
            "unsupported canonical schema version {}",
            envelope.schema_version
        )));
    }
    Ok(envelope.workflow)
}

/// Encode then decode, yielding the definition as a consumer sees it
pub fn round_trip(workflow: &WorkflowDefinition) -> WorkflowResult<WorkflowDefinition> {
    decode_workflow(&encode_workflow(workflow)?)
}
