//! Core domain types for the Trellis workflow platform.
//!
//! This crate defines the data model shared by the store and engine crates:
//! - workflow definitions and their tasks
//! - run records and trigger provenance
//! - task instance records (one per run, task, and map index)
//! - published workflow versions and the canonical wire form
//! - run parameters with lightweight declared schemas
//!
//! Task bodies live behind the [`TaskHandler`] seam and are never part of
//! the canonical wire form; definitions decoded from it carry unbound
//! handles until refreshed against the concrete objects.

#![deny(unsafe_code)]

pub mod canonical;
mod definition;
mod error;
mod ids;
mod instance;
mod params;
mod run;
mod task;
mod timetable;
mod version;

pub use definition::WorkflowDefinition;
pub use error::{WorkflowError, WorkflowResult};
pub use ids::{RunId, TaskId, WorkflowId, WorkflowVersionId};
pub use instance::{TaskInstanceRecord, TaskInstanceState, WorkflowInfo, NOT_MAPPED};
pub use params::{Param, ParamKind, ParamSet};
pub use run::{RunKind, RunRecord, RunState, TriggerChannel, TriggerMeta};
pub use task::{TaskContext, TaskDefinition, TaskFailure, TaskHandle, TaskHandler, DEFAULT_POOL};
pub use timetable::{DataInterval, Timetable};
pub use version::WorkflowVersionRecord;
