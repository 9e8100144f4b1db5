//! Run Resolution & Ephemeral Execution for Trellis
//!
//! This crate turns raw user input into concrete run and task-instance
//! records, and drives one-shot test executions against them. It:
//!
//! 1. Parses a run identifier or logical instant from a raw string
//! 2. Resolves the string to an existing run, or creates one per policy
//! 3. Finds or creates the task instance for a (run, task, map index)
//! 4. Executes a single task body with secret-masked console output
//! 5. Cleans up transient run state regardless of outcome
//!
//! # Key Principle
//!
//! **Nothing here touches ambient global state implicitly.**
//!
//! Every process-level toggle the harness needs (secret masking, log
//! propagation, environment overrides, debugger preference) lives on an
//! explicit [`HarnessContext`] passed through the call, so concurrent
//! executions and tests stay isolated.
//!
//! # Architecture
//!
//! The command facade composes specialized components:
//!
//! - [`WorkflowRegistry`]: Holds workflow definitions known to this process
//! - [`RunResolver`]: Resolves identifiers to runs, creating them on demand
//! - [`InstanceBinder`]: Finds or creates the task-instance record and
//!   re-binds it to the concrete task definition
//! - [`TestRunCoordinator`]: Orchestrates an ephemeral execution end to end
//! - [`DebuggerRegistry`]: Ordered post-mortem debugger preference list
//! - [`SecretsMasker`]: Redacts secrets from relayed task output
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use trellis_engine::{CreationMode, RunResolver};
//! use trellis_store::InMemoryStore;
//! use trellis_types::{RunState, TriggerChannel, WorkflowDefinition};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> trellis_engine::EngineResult<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let resolver = RunResolver::new(store.clone());
//!
//! let workflow = WorkflowDefinition::new("nightly-report", "Nightly Report");
//!
//! // No run exists yet, so memory mode constructs one without touching
//! // the store.
//! let resolved = resolver
//!     .resolve_or_create(
//!         &workflow,
//!         Some("2026-03-01T00:00:00"),
//!         CreationMode::Memory,
//!         TriggerChannel::Cli,
//!     )
//!     .await?;
//!
//! assert!(resolved.created);
//! assert!(!resolved.stored);
//! assert_eq!(resolved.record.state, RunState::Running);
//! assert_eq!(store.run_count(), 0);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod binder;
pub mod commands;
pub mod context;
pub mod coordinator;
pub mod debugger;
pub mod error;
pub mod identifier;
pub mod redact;
pub mod registry;
pub mod resolver;
pub mod runner;

// Re-export main types
pub use binder::{BoundInstance, InstanceBinder};
pub use commands::{
    bind_instance, instance_state, instance_summaries_for_run, list_tasks, publish_workflow,
    resolve_run, test_execute, InstanceStateSummary,
};
pub use context::{CaptureSink, ConsoleSink, HarnessContext, HarnessSettings, StdoutSink};
pub use coordinator::{TestRunCoordinator, TestRunOptions, TestRunReport};
pub use debugger::{DebuggerHook, DebuggerRegistry, ExternalDebugger};
pub use error::{EngineError, EngineResult};
pub use identifier::{find_run_by_identifier, parse_instant};
pub use redact::SecretsMasker;
pub use registry::WorkflowRegistry;
pub use resolver::{generate_temporary_run_id, CreationMode, ResolvedRun, RunResolver};
pub use runner::{run_task_instance, RunOutcome};
